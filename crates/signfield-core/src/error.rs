use thiserror::Error;

/// A normalized value fell outside `[0, 1]`, or the viewport used for the
/// conversion had no usable extent.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Coordinate out of range: {0}")]
pub struct CoordinateRangeError(pub String);

/// The bytes handed to `load_document` are not a readable PDF.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to parse document: {0}")]
pub struct DocumentParseError(pub String);

/// A field-layout config could not be applied. The session is left as it was.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to parse config: {0}")]
pub struct ConfigParseError(pub String);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error(transparent)]
    CoordinateRange(#[from] CoordinateRangeError),

    #[error(transparent)]
    DocumentParse(#[from] DocumentParseError),

    #[error(transparent)]
    ConfigParse(#[from] ConfigParseError),
}
