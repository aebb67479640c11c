//! Draw operations burned into page content
//!
//! All geometry here is already in PDF page space: points, bottom-left origin.

use serde::{Deserialize, Serialize};

pub use signfield_core::ImageFormat;

pub type OpId = u64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PdfRect {
    /// From `[x, y, width, height]`
    pub fn from_array([x, y, width, height]: [f64; 4]) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextStyle {
    pub font_size: f64,
    pub color: String,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            color: "#000000".to_string(),
        }
    }
}

/// Standard font used for every drawn string
pub const TEXT_FONT: &str = "Helvetica";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum DrawOperation {
    /// Raw PNG or JPEG bytes scaled into `rect`
    DrawImage {
        id: OpId,
        page: u32,
        field_id: String,
        rect: PdfRect,
        format: ImageFormat,
        data: Vec<u8>,
    },
    /// Single-line text; `baseline` is the absolute y of the first glyph row
    DrawText {
        id: OpId,
        page: u32,
        field_id: String,
        x: f64,
        baseline: f64,
        text: String,
        style: TextStyle,
    },
    /// Outlined box with a short label, marking an unfilled field
    DrawPlaceholder {
        id: OpId,
        page: u32,
        field_id: String,
        rect: PdfRect,
        label: String,
    },
}

impl DrawOperation {
    pub fn id(&self) -> OpId {
        match self {
            DrawOperation::DrawImage { id, .. } => *id,
            DrawOperation::DrawText { id, .. } => *id,
            DrawOperation::DrawPlaceholder { id, .. } => *id,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            DrawOperation::DrawImage { page, .. } => *page,
            DrawOperation::DrawText { page, .. } => *page,
            DrawOperation::DrawPlaceholder { page, .. } => *page,
        }
    }

    pub fn field_id(&self) -> &str {
        match self {
            DrawOperation::DrawImage { field_id, .. } => field_id,
            DrawOperation::DrawText { field_id, .. } => field_id,
            DrawOperation::DrawPlaceholder { field_id, .. } => field_id,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationLog {
    next_id: OpId,
    operations: Vec<DrawOperation>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut op: DrawOperation) -> OpId {
        let id = self.next_id;
        self.next_id += 1;

        match &mut op {
            DrawOperation::DrawImage { id: op_id, .. } => *op_id = id,
            DrawOperation::DrawText { id: op_id, .. } => *op_id = id,
            DrawOperation::DrawPlaceholder { id: op_id, .. } => *op_id = id,
        }

        self.operations.push(op);
        id
    }

    pub fn operations(&self) -> &[DrawOperation] {
        &self.operations
    }

    pub fn operations_for_page(&self, page: u32) -> Vec<&DrawOperation> {
        self.operations
            .iter()
            .filter(|op| op.page() == page)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }
}
