use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlattenError {
    #[error("Failed to parse source document: {0}")]
    SourceDocument(String),

    #[error("Failed to embed field {field}: {reason}")]
    FieldEmbed { field: String, reason: String },

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Why an image value could not become an XObject
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("invalid PNG: {0}")]
    Png(#[from] png::DecodingError),

    #[error("palette PNG was not expanded")]
    UnexpandedPalette,

    #[error("invalid JPEG: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

impl FlattenError {
    pub(crate) fn embed(field: &str, reason: impl std::fmt::Display) -> Self {
        FlattenError::FieldEmbed {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}
