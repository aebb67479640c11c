//! Field layout core
//!
//! Normalized coordinates, the field model, the JSON layout config and the
//! session store that owns the authoritative field list for one document.

pub mod config;
pub mod coords;
pub mod document;
pub mod error;
pub mod field;
pub mod naming;
pub mod session;
pub mod value;

pub use config::ConfigDocument;
pub use coords::{
    NormalizedCoordinate, NormalizedRect, PixelPoint, PixelRect, ViewportExtent,
};
pub use document::{page_media_box, DocumentHandle, PageSize};
pub use error::{ConfigParseError, CoordinateRangeError, CoreError, DocumentParseError};
pub use field::{Field, FieldId, FieldPatch, FieldType};
pub use session::{AppMode, DocumentSession, DocumentStore};
pub use value::{DataUrl, DataUrlError, ImageFormat};
