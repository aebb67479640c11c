//! Flatten fields onto the original document
//!
//! Field geometry is normalized with a top-left origin; page space is in
//! points with a bottom-left origin. For a page of size `W x H`:
//!
//! ```text
//! px = x * W
//! py = (1 - y) * H - height * H
//! ```
//!
//! offset by the MediaBox origin when the box does not start at `(0, 0)`.

use lopdf::Document;
use serde::Serialize;
use signfield_core::{page_media_box, Field, FieldType};
use tracing::{debug, info, warn};

use crate::apply_operations::{apply_to_document, save_document};
use crate::error::FlattenError;
use crate::operations::{DrawOperation, OperationLog, PdfRect, TextStyle};

/// Offset from a text field's vertical centre to its baseline, in points
const BASELINE_OFFSET: f64 = 6.0;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub text_style: TextStyle,
    /// Label drawn inside unfilled signature and stamp placeholders
    pub placeholder_labels: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            text_style: TextStyle::default(),
            placeholder_labels: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedField {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    /// Ids of fields painted onto the page, in field order
    pub drawn: Vec<String>,
    pub skipped: Vec<SkippedField>,
}

/// Flatten `fields` onto a copy of `original` with default options
pub fn export(original: &[u8], fields: &[Field]) -> Result<ExportOutput, FlattenError> {
    export_with_options(original, fields, &ExportOptions::default())
}

pub fn export_with_options(
    original: &[u8],
    fields: &[Field],
    options: &ExportOptions,
) -> Result<ExportOutput, FlattenError> {
    let mut doc =
        Document::load_mem(original).map_err(|e| FlattenError::SourceDocument(e.to_string()))?;
    let pages = doc.get_pages();

    let mut log = OperationLog::new();
    let mut skipped = Vec::new();

    for field in fields {
        let Some(page_id) = pages.get(&field.page) else {
            warn!(
                field = %field.id,
                page = field.page,
                pages = pages.len(),
                "field page out of range, skipping"
            );
            skipped.push(SkippedField {
                id: field.id.to_string(),
                reason: format!("page {} out of range", field.page),
            });
            continue;
        };

        let rect = PdfRect::from_array(field.rect().to_pdf(page_media_box(&doc, *page_id)));
        match draw_operation(field, rect, options) {
            Ok(Some(op)) => {
                log.add(op);
            }
            Ok(None) => debug!(field = %field.id, "empty field, nothing to draw"),
            Err(e) => {
                warn!(field = %field.id, "skipping field: {}", e);
                skipped.push(SkippedField {
                    id: field.id.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let report = apply_to_document(&mut doc, &log);
    skipped.extend(report.failed.into_iter().map(|failed| SkippedField {
        id: failed.field_id,
        reason: failed.reason,
    }));
    let drawn: Vec<String> = log
        .operations()
        .iter()
        .filter(|op| report.applied.contains(&op.id()))
        .map(|op| op.field_id().to_string())
        .collect();

    let bytes = save_document(&mut doc)?;

    info!(
        drawn = drawn.len(),
        skipped = skipped.len(),
        "document flattened"
    );
    Ok(ExportOutput {
        bytes,
        drawn,
        skipped,
    })
}

/// The draw operation for one field, `None` when there is nothing to paint
fn draw_operation(
    field: &Field,
    rect: PdfRect,
    options: &ExportOptions,
) -> Result<Option<DrawOperation>, FlattenError> {
    let field_id = field.id.to_string();
    let op = match field.field_type {
        FieldType::Signature | FieldType::Stamp => match field.filled_value() {
            Some(value) => {
                let url = signfield_core::DataUrl::parse(value)
                    .map_err(|e| FlattenError::embed(&field_id, e))?;
                let format = url.image_format().ok_or_else(|| {
                    FlattenError::embed(&field_id, format!("unsupported image type {}", url.mime()))
                })?;
                DrawOperation::DrawImage {
                    id: 0,
                    page: field.page,
                    field_id,
                    rect,
                    format,
                    data: url.into_data(),
                }
            }
            None => DrawOperation::DrawPlaceholder {
                id: 0,
                page: field.page,
                field_id,
                label: if options.placeholder_labels {
                    field.field_type.label().to_string()
                } else {
                    String::new()
                },
                rect,
            },
        },
        FieldType::Text | FieldType::Date => match field.filled_value() {
            Some(value) => DrawOperation::DrawText {
                id: 0,
                page: field.page,
                field_id,
                x: rect.x,
                baseline: rect.y + rect.height / 2.0 - BASELINE_OFFSET,
                text: value.to_string(),
                style: options.text_style.clone(),
            },
            None => return Ok(None),
        },
    };
    Ok(Some(op))
}
