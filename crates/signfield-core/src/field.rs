use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::coords::NormalizedRect;
use crate::value::DataUrl;

/// Default field width as a fraction of the page width
pub const DEFAULT_FIELD_WIDTH: f64 = 0.2;
/// Default field height as a fraction of the page height
pub const DEFAULT_FIELD_HEIGHT: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Signature,
    Text,
    Date,
    Stamp,
}

impl FieldType {
    /// Parse field type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "signature" => Some(FieldType::Signature),
            "text" => Some(FieldType::Text),
            "date" => Some(FieldType::Date),
            "stamp" => Some(FieldType::Stamp),
            _ => None,
        }
    }

    /// Signature and stamp fields carry a data-URL image as their value
    pub fn is_image(&self) -> bool {
        matches!(self, FieldType::Signature | FieldType::Stamp)
    }

    pub fn label(&self) -> &'static str {
        match self {
            FieldType::Signature => "Signature",
            FieldType::Text => "Text",
            FieldType::Date => "Date",
            FieldType::Stamp => "Stamp",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque field identity, stable for the field's lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FieldId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for FieldId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FieldId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A placed field. Geometry is normalized against the page's extent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: FieldId,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// 1-based page index
    pub page: u32,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub value: Option<String>,
    pub required: bool,
}

impl Field {
    /// Create a field at `(x, y)` with the default size, marked required
    pub fn create(field_type: FieldType, page: u32, x: f64, y: f64) -> Self {
        Self {
            id: FieldId::new(),
            field_type,
            page,
            x,
            y,
            width: DEFAULT_FIELD_WIDTH,
            height: DEFAULT_FIELD_HEIGHT,
            value: None,
            required: true,
        }
    }

    pub fn rect(&self) -> NormalizedRect {
        NormalizedRect {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    /// Value with empty strings treated as absent
    pub fn filled_value(&self) -> Option<&str> {
        self.value.as_deref().filter(|v| !v.is_empty())
    }

    /// Parsed image value, if this is an image field holding a decodable data URL
    pub fn image_value(&self) -> Option<DataUrl> {
        if !self.field_type.is_image() {
            return None;
        }
        self.filled_value()
            .and_then(|v| DataUrl::parse(v).ok())
            .filter(|url| url.image_format().is_some())
    }

    /// Page ≥ 1 and every geometry component inside `[0, 1]`
    pub fn is_well_formed(&self) -> bool {
        self.page >= 1
            && NormalizedRect::new(self.x, self.y, self.width, self.height).is_ok()
    }
}

/// Partial update applied by `DocumentStore::update_field`.
/// Absent attributes are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldPatch {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// `Some(None)` clears the value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

impl FieldPatch {
    pub fn geometry(rect: NormalizedRect) -> Self {
        Self {
            x: Some(rect.x),
            y: Some(rect.y),
            width: Some(rect.width),
            height: Some(rect.height),
            ..Default::default()
        }
    }

    pub fn value(value: impl Into<String>) -> Self {
        Self {
            value: Some(Some(value.into())),
            ..Default::default()
        }
    }

    pub fn required(required: bool) -> Self {
        Self {
            required: Some(required),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == FieldPatch::default()
    }

    /// Merge this patch over `field`, returning the updated copy
    pub fn apply(&self, field: &Field) -> Field {
        let mut next = field.clone();
        if let Some(t) = self.field_type {
            next.field_type = t;
        }
        if let Some(page) = self.page {
            next.page = page;
        }
        if let Some(x) = self.x {
            next.x = x;
        }
        if let Some(y) = self.y {
            next.y = y;
        }
        if let Some(width) = self.width {
            next.width = width;
        }
        if let Some(height) = self.height {
            next.height = height;
        }
        if let Some(value) = &self.value {
            next.value = value.clone();
        }
        if let Some(required) = self.required {
            next.required = required;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_URL: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[test]
    fn test_factory_defaults() {
        let field = Field::create(FieldType::Signature, 2, 0.1, 0.3);
        assert_eq!(field.page, 2);
        assert_eq!(field.width, 0.2);
        assert_eq!(field.height, 0.05);
        assert!(field.required);
        assert!(field.value.is_none());
    }

    #[test]
    fn test_factory_ids_are_unique() {
        let a = Field::create(FieldType::Text, 1, 0.0, 0.0);
        let b = Field::create(FieldType::Text, 1, 0.0, 0.0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_field_type_serializes_lowercase() {
        let field = Field::create(FieldType::Stamp, 1, 0.5, 0.5);
        let json = serde_json::to_string(&field).unwrap();
        assert!(json.contains("\"type\":\"stamp\""), "{}", json);
    }

    #[test]
    fn test_field_deserializes_config_shape() {
        let json = r#"{"id":"f1","type":"date","page":1,"x":0.1,"y":0.2,
            "width":0.2,"height":0.05,"required":false,"value":null}"#;
        let field: Field = serde_json::from_str(json).unwrap();
        assert_eq!(field.id.as_str(), "f1");
        assert_eq!(field.field_type, FieldType::Date);
        assert!(!field.required);
        assert!(field.value.is_none());
    }

    #[test]
    fn test_patch_preserves_unspecified_attributes() {
        let field = Field::create(FieldType::Text, 1, 0.1, 0.1);
        let patched = FieldPatch::value("Jane Doe").apply(&field);
        assert_eq!(patched.value.as_deref(), Some("Jane Doe"));
        assert_eq!(patched.x, field.x);
        assert_eq!(patched.required, field.required);
        assert_eq!(patched.id, field.id);
    }

    #[test]
    fn test_patch_can_clear_value() {
        let mut field = Field::create(FieldType::Text, 1, 0.1, 0.1);
        field.value = Some("x".into());
        let patch = FieldPatch {
            value: Some(None),
            ..Default::default()
        };
        assert!(patch.apply(&field).value.is_none());
    }

    #[test]
    fn test_image_value_only_for_image_fields() {
        let mut sig = Field::create(FieldType::Signature, 1, 0.0, 0.0);
        sig.value = Some(PNG_URL.into());
        assert!(sig.image_value().is_some());

        let mut text = Field::create(FieldType::Text, 1, 0.0, 0.0);
        text.value = Some(PNG_URL.into());
        assert!(text.image_value().is_none());

        sig.value = Some("not a data url".into());
        assert!(sig.image_value().is_none());
    }

    #[test]
    fn test_well_formed() {
        let mut field = Field::create(FieldType::Text, 1, 0.5, 0.5);
        assert!(field.is_well_formed());
        field.page = 0;
        assert!(!field.is_well_formed());
        field.page = 1;
        field.x = 1.2;
        assert!(!field.is_well_formed());
    }
}
