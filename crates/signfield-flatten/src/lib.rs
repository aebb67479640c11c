//! Flattening of signfield layouts onto PDF documents
//!
//! `export` turns normalized fields into page-space draw operations and paints
//! them into the page content with lopdf. Images are embedded as XObjects,
//! text uses the standard Helvetica font.

pub mod apply_operations;
pub mod error;
pub mod export;
pub mod operations;
pub mod xobject;

pub use apply_operations::{apply_to_document, ApplyReport, FailedOperation};
pub use error::{FlattenError, ImageError};
pub use export::{export, export_with_options, ExportOptions, ExportOutput, SkippedField};
pub use operations::{DrawOperation, OperationLog, PdfRect, TextStyle};
