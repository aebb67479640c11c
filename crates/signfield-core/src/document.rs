//! Loaded document handle: original bytes plus page geometry read with lopdf

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::sync::Arc;

use crate::error::DocumentParseError;

/// US Letter, used when a page carries no MediaBox anywhere up its tree
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page size in PDF points, `[x, y, width, height]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub media_box: [f64; 4],
}

impl PageSize {
    pub fn width(&self) -> f64 {
        self.media_box[2]
    }

    pub fn height(&self) -> f64 {
        self.media_box[3]
    }
}

/// A parsed document. The original bytes are shared and never modified.
#[derive(Debug, Clone)]
pub struct DocumentHandle {
    name: String,
    bytes: Arc<[u8]>,
    pages: Vec<PageSize>,
}

impl PartialEq for DocumentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.bytes, &other.bytes)
    }
}

impl DocumentHandle {
    /// Parse `bytes` as a PDF and collect per-page sizes
    pub fn load(name: impl Into<String>, bytes: &[u8]) -> Result<Self, DocumentParseError> {
        let doc = Document::load_mem(bytes).map_err(|e| DocumentParseError(e.to_string()))?;

        let page_ids = doc.get_pages();
        if page_ids.is_empty() {
            return Err(DocumentParseError("document has no pages".to_string()));
        }

        let pages = page_ids
            .values()
            .map(|page_id| PageSize {
                media_box: page_media_box(&doc, *page_id),
            })
            .collect();

        Ok(Self {
            name: name.into(),
            bytes: Arc::from(bytes),
            pages,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Size of a 1-indexed page
    pub fn page_size(&self, page: u32) -> Option<PageSize> {
        page.checked_sub(1)
            .and_then(|idx| self.pages.get(idx as usize))
            .copied()
    }

    pub fn pages(&self) -> &[PageSize] {
        &self.pages
    }
}

/// `[x, y, width, height]` of a page, inherited through the page tree,
/// falling back to US Letter
pub fn page_media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    doc.get_dictionary(page_id)
        .ok()
        .and_then(|dict| find_media_box(doc, dict))
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

/// MediaBox from the page dictionary, walking up `Parent` links for inherited boxes
fn find_media_box(doc: &Document, page: &Dictionary) -> Option<[f64; 4]> {
    let mut current = page;
    // Page trees are shallow; the bound stops reference cycles in malformed files
    for _ in 0..32 {
        if let Ok(media_box) = current.get(b"MediaBox") {
            return parse_rect(doc, media_box);
        }
        let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent_id).ok()?;
    }
    None
}

/// Parse a PDF rectangle array into [x, y, width, height]
fn parse_rect(doc: &Document, obj: &Object) -> Option<[f64; 4]> {
    let arr = match obj {
        Object::Array(a) => a,
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
        _ => return None,
    };
    if arr.len() != 4 {
        return None;
    }

    let mut values = [0.0f64; 4];
    for (i, obj) in arr.iter().enumerate() {
        values[i] = extract_number(doc, obj)?;
    }

    let x = values[0].min(values[2]);
    let y = values[1].min(values[3]);
    Some([
        x,
        y,
        (values[2] - values[0]).abs(),
        (values[3] - values[1]).abs(),
    ])
}

fn extract_number(doc: &Document, obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        Object::Reference(id) => doc.get_object(*id).ok().and_then(|o| match o {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r as f64),
            _ => None,
        }),
        _ => None,
    }
}
