//! Apply draw operations to PDF documents
//!
//! Everything is painted into the page content stream, so the result is flat:
//! no annotations or form fields remain to be edited by a viewer. The page's
//! existing content is wrapped in `q`/`Q` first so a dangling graphics state in
//! the source cannot leak into the appended drawing.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::{debug, warn};

use crate::error::FlattenError;
use crate::xobject::{add_image_xobject, decode_image};
use crate::operations::{DrawOperation, OpId, OperationLog, PdfRect, TextStyle, TEXT_FONT};

/// Placeholder outline and label colour
const PLACEHOLDER_GRAY: f32 = 0.55;
const PLACEHOLDER_LABEL_SIZE: f64 = 9.0;

/// Parse hex color string (e.g., "#FF0000" or "FF0000") to RGB floats (0-1 range)
fn parse_hex_color(color: &str) -> (f32, f32, f32) {
    let hex = color.trim_start_matches('#');
    if hex.len() >= 6 {
        let r = u8::from_str_radix(&hex[0..2], 16).unwrap_or(0) as f32 / 255.0;
        let g = u8::from_str_radix(&hex[2..4], 16).unwrap_or(0) as f32 / 255.0;
        let b = u8::from_str_radix(&hex[4..6], 16).unwrap_or(0) as f32 / 255.0;
        (r, g, b)
    } else {
        (0.0, 0.0, 0.0)
    }
}

/// Standard-14 Helvetica only covers ASCII without an embedded font
fn sanitize_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            c if c.is_ascii_control() => b' ',
            c if c.is_ascii() => c as u8,
            _ => b'?',
        })
        .collect()
}

/// An operation that could not be drawn
#[derive(Debug, Clone, PartialEq)]
pub struct FailedOperation {
    pub op_id: OpId,
    pub field_id: String,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ApplyReport {
    pub applied: Vec<OpId>,
    pub failed: Vec<FailedOperation>,
}

/// Apply all operations from the log to serialized PDF bytes
#[cfg(test)]
pub(crate) fn apply_operations(
    pdf_bytes: &[u8],
    log: &OperationLog,
) -> Result<Vec<u8>, FlattenError> {
    if log.is_empty() {
        return Ok(pdf_bytes.to_vec());
    }

    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| FlattenError::SourceDocument(e.to_string()))?;
    apply_to_document(&mut doc, log);
    save_document(&mut doc)
}

pub(crate) fn save_document(doc: &mut Document) -> Result<Vec<u8>, FlattenError> {
    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| FlattenError::SerializationError(e.to_string()))?;
    Ok(output)
}

/// Draw every operation onto its page. Operations that fail are logged,
/// reported and skipped; the others still land.
pub fn apply_to_document(doc: &mut Document, log: &OperationLog) -> ApplyReport {
    let mut report = ApplyReport::default();
    let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();

    for op in log.operations() {
        if !pages.iter().any(|(num, _)| *num == op.page()) {
            report.failed.push(failure(
                op,
                FlattenError::OperationError(format!("page {} does not exist", op.page())),
            ));
        }
    }

    for (page_num, page_id) in &pages {
        let page_ops = log.operations_for_page(*page_num);
        if page_ops.is_empty() {
            continue;
        }

        let mut painter = PagePainter::new(doc, *page_id);
        let mut drawn = Vec::new();
        for op in page_ops {
            match painter.draw(doc, op) {
                Ok(()) => drawn.push(op),
                Err(e) => {
                    warn!(field = op.field_id(), page = page_num, "skipping field: {}", e);
                    report.failed.push(failure(op, e));
                }
            }
        }

        if drawn.is_empty() {
            continue;
        }
        match painter.finish(doc) {
            Ok(()) => {
                debug!(page = page_num, operations = drawn.len(), "page flattened");
                report.applied.extend(drawn.iter().map(|op| op.id()));
            }
            Err(e) => {
                warn!(page = page_num, "page could not be updated: {}", e);
                let reason = e.to_string();
                report.failed.extend(drawn.iter().map(|op| FailedOperation {
                    op_id: op.id(),
                    field_id: op.field_id().to_string(),
                    reason: reason.clone(),
                }));
            }
        }
    }

    report
}

fn failure(op: &DrawOperation, error: FlattenError) -> FailedOperation {
    FailedOperation {
        op_id: op.id(),
        field_id: op.field_id().to_string(),
        reason: error.to_string(),
    }
}

/// Collects content and resources for one page, then writes them in a single
/// step so a failing operation never leaves the page half-modified.
struct PagePainter {
    page_id: ObjectId,
    resources: Dictionary,
    xobjects: Dictionary,
    fonts: Dictionary,
    font_name: Option<Vec<u8>>,
    operations: Vec<Operation>,
}

impl PagePainter {
    fn new(doc: &Document, page_id: ObjectId) -> Self {
        let resources = effective_resources(doc, page_id);
        let xobjects = resolve_dict(doc, resources.get(b"XObject").ok());
        let fonts = resolve_dict(doc, resources.get(b"Font").ok());
        Self {
            page_id,
            resources,
            xobjects,
            fonts,
            font_name: None,
            operations: Vec::new(),
        }
    }

    fn draw(&mut self, doc: &mut Document, op: &DrawOperation) -> Result<(), FlattenError> {
        match op {
            DrawOperation::DrawImage {
                field_id,
                rect,
                format,
                data,
                ..
            } => {
                let image = decode_image(data, *format)
                    .map_err(|reason| FlattenError::embed(field_id, reason))?;
                let image_id = add_image_xobject(doc, image);
                let name = unique_name(&self.xobjects, "SfIm");
                self.xobjects.set(name.clone(), Object::Reference(image_id));
                self.push_image(rect, name);
            }
            DrawOperation::DrawText {
                x,
                baseline,
                text,
                style,
                ..
            } => {
                let font = self.font(doc);
                self.push_text(&font, *x, *baseline, text, style);
            }
            DrawOperation::DrawPlaceholder { rect, label, .. } => {
                let font = self.font(doc);
                self.push_placeholder(&font, rect, label);
            }
        }
        Ok(())
    }

    /// Resource name of the Helvetica font, registered on first use
    fn font(&mut self, doc: &mut Document) -> Vec<u8> {
        if let Some(name) = &self.font_name {
            return name.clone();
        }
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => TEXT_FONT,
            "Encoding" => "WinAnsiEncoding",
        });
        let name = unique_name(&self.fonts, "SfF");
        self.fonts.set(name.clone(), Object::Reference(font_id));
        self.font_name = Some(name.clone());
        name
    }

    fn push_image(&mut self, rect: &PdfRect, name: Vec<u8>) {
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(rect.width),
                    Object::Integer(0),
                    Object::Integer(0),
                    real(rect.height),
                    real(rect.x),
                    real(rect.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name)]),
            Operation::new("Q", vec![]),
        ]);
    }

    fn push_text(&mut self, font: &[u8], x: f64, baseline: f64, text: &str, style: &TextStyle) {
        let (r, g, b) = parse_hex_color(&style.color);
        self.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font.to_vec()), real(style.font_size)],
            ),
            Operation::new("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
            Operation::new("Td", vec![real(x), real(baseline)]),
            Operation::new(
                "Tj",
                vec![Object::String(sanitize_text(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
    }

    fn push_placeholder(&mut self, font: &[u8], rect: &PdfRect, label: &str) {
        let gray = PLACEHOLDER_GRAY;
        self.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "RG",
                vec![Object::Real(gray), Object::Real(gray), Object::Real(gray)],
            ),
            Operation::new("w", vec![real(1.0)]),
            Operation::new(
                "d",
                vec![
                    Object::Array(vec![Object::Integer(3), Object::Integer(2)]),
                    Object::Integer(0),
                ],
            ),
            Operation::new(
                "re",
                vec![
                    real(rect.x),
                    real(rect.y),
                    real(rect.width),
                    real(rect.height),
                ],
            ),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
        if label.is_empty() {
            return;
        }
        let style = TextStyle {
            font_size: PLACEHOLDER_LABEL_SIZE.min(rect.height.max(1.0)),
            color: "#8C8C8C".to_string(),
        };
        let baseline = rect.y + rect.height / 2.0 - style.font_size / 3.0;
        self.push_text(font, rect.x + 4.0, baseline, label, &style);
    }

    /// Install resources and append the collected content to the page
    fn finish(mut self, doc: &mut Document) -> Result<(), FlattenError> {
        let content = Content {
            operations: std::mem::take(&mut self.operations),
        }
        .encode()
        .map_err(|e| FlattenError::OperationError(e.to_string()))?;

        if !self.xobjects.is_empty() {
            self.resources.set("XObject", Object::Dictionary(self.xobjects));
        }
        if !self.fonts.is_empty() {
            self.resources.set("Font", Object::Dictionary(self.fonts));
        }

        let existing = existing_contents(doc, self.page_id);
        let mut contents = Vec::with_capacity(existing.len() + 2);
        if existing.is_empty() {
            contents.push(Object::Reference(doc.add_object(Stream::new(dictionary! {}, content))));
        } else {
            let open = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
            let mut body = b"\nQ\n".to_vec();
            body.extend_from_slice(&content);
            let close = doc.add_object(Stream::new(dictionary! {}, body));
            contents.push(Object::Reference(open));
            contents.extend(existing);
            contents.push(Object::Reference(close));
        }

        let page = doc
            .get_object_mut(self.page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| FlattenError::OperationError(e.to_string()))?;
        page.set("Resources", Object::Dictionary(self.resources));
        page.set("Contents", Object::Array(contents));
        Ok(())
    }
}

fn real(value: f64) -> Object {
    Object::Real(value as f32)
}

fn unique_name(dict: &Dictionary, prefix: &str) -> Vec<u8> {
    (0u32..)
        .map(|n| format!("{}{}", prefix, n).into_bytes())
        .find(|name| !dict.has(name))
        .unwrap_or_else(|| prefix.as_bytes().to_vec())
}

/// Copy of the page's resources, following references and inheritance.
/// Shared resource objects are never modified in place.
fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = doc.get_dictionary(page_id).ok();
    for _ in 0..32 {
        let Some(dict) = current else {
            break;
        };
        if let Ok(resources) = dict.get(b"Resources") {
            return resolve_dict(doc, Some(resources));
        }
        current = dict
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .ok();
    }
    Dictionary::new()
}

fn resolve_dict(doc: &Document, obj: Option<&Object>) -> Dictionary {
    match obj {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(Object::Reference(id)) => doc.get_dictionary(*id).cloned().unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

/// The page's content stream references, in drawing order
fn existing_contents(doc: &Document, page_id: ObjectId) -> Vec<Object> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            Ok(_) => vec![Object::Reference(*id)],
            Err(_) => Vec::new(),
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}
