//! Interactive scene objects, one per field on a page

use serde::Serialize;
use signfield_core::{Field, FieldId, FieldType, PixelRect, ViewportExtent};

/// Visual representation of a field; a change of kind means a new object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneKind {
    PlaceholderRect,
    Image,
    EditableText,
}

impl SceneKind {
    /// Signature/stamp show their image once it decodes, text/date show their
    /// text once present; anything else is an outlined placeholder
    pub fn for_field(field: &Field) -> Self {
        match field.field_type {
            FieldType::Signature | FieldType::Stamp if field.image_value().is_some() => {
                SceneKind::Image
            }
            FieldType::Text | FieldType::Date if field.filled_value().is_some() => {
                SceneKind::EditableText
            }
            _ => SceneKind::PlaceholderRect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SceneObject {
    PlaceholderRect {
        field_id: FieldId,
        rect: PixelRect,
        label: String,
    },
    Image {
        field_id: FieldId,
        rect: PixelRect,
        data_url: String,
    },
    EditableText {
        field_id: FieldId,
        rect: PixelRect,
        text: String,
    },
}

impl SceneObject {
    /// Build the object a field should currently be shown as
    pub fn for_field(field: &Field, extent: ViewportExtent) -> Self {
        let field_id = field.id.clone();
        let rect = field.rect().to_viewport(extent);
        let content = field.value.clone().unwrap_or_default();
        match SceneKind::for_field(field) {
            SceneKind::Image => SceneObject::Image {
                field_id,
                rect,
                data_url: content,
            },
            SceneKind::EditableText => SceneObject::EditableText {
                field_id,
                rect,
                text: content,
            },
            SceneKind::PlaceholderRect => SceneObject::PlaceholderRect {
                field_id,
                rect,
                label: field.field_type.label().to_string(),
            },
        }
    }

    pub fn kind(&self) -> SceneKind {
        match self {
            SceneObject::PlaceholderRect { .. } => SceneKind::PlaceholderRect,
            SceneObject::Image { .. } => SceneKind::Image,
            SceneObject::EditableText { .. } => SceneKind::EditableText,
        }
    }

    pub fn field_id(&self) -> &FieldId {
        match self {
            SceneObject::PlaceholderRect { field_id, .. }
            | SceneObject::Image { field_id, .. }
            | SceneObject::EditableText { field_id, .. } => field_id,
        }
    }

    pub fn rect(&self) -> PixelRect {
        match self {
            SceneObject::PlaceholderRect { rect, .. }
            | SceneObject::Image { rect, .. }
            | SceneObject::EditableText { rect, .. } => *rect,
        }
    }

    pub fn set_rect(&mut self, new_rect: PixelRect) {
        match self {
            SceneObject::PlaceholderRect { rect, .. }
            | SceneObject::Image { rect, .. }
            | SceneObject::EditableText { rect, .. } => *rect = new_rect,
        }
    }

    /// Same kind, same content, and geometry within `epsilon` pixels
    pub fn matches(&self, other: &SceneObject, epsilon: f64) -> bool {
        let same_content = match (self, other) {
            (
                SceneObject::PlaceholderRect { label: a, .. },
                SceneObject::PlaceholderRect { label: b, .. },
            ) => a == b,
            (SceneObject::Image { data_url: a, .. }, SceneObject::Image { data_url: b, .. }) => {
                a == b
            }
            (
                SceneObject::EditableText { text: a, .. },
                SceneObject::EditableText { text: b, .. },
            ) => a == b,
            _ => false,
        };
        same_content && self.rect().approx_eq(&other.rect(), epsilon)
    }
}

/// Scene objects of one page, in creation order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scene {
    objects: Vec<SceneObject>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &FieldId) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.field_id() == id)
    }

    pub fn get_mut(&mut self, id: &FieldId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.field_id() == id)
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Add an object, replacing any existing object for the same field
    pub fn insert(&mut self, object: SceneObject) {
        match self.get_mut(object.field_id()) {
            Some(slot) => *slot = object,
            None => self.objects.push(object),
        }
    }

    pub fn remove(&mut self, id: &FieldId) -> Option<SceneObject> {
        let pos = self.objects.iter().position(|o| o.field_id() == id)?;
        Some(self.objects.remove(pos))
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signfield_core::DataUrl;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn extent() -> ViewportExtent {
        ViewportExtent::new(1000.0, 500.0)
    }

    #[test]
    fn test_kind_follows_type_and_value() {
        let mut sig = Field::create(FieldType::Signature, 1, 0.1, 0.1);
        assert_eq!(SceneKind::for_field(&sig), SceneKind::PlaceholderRect);
        sig.value = Some(DataUrl::encode("image/png", PNG_HEADER));
        assert_eq!(SceneKind::for_field(&sig), SceneKind::Image);
        sig.value = Some("data:text/plain,hello".to_string());
        assert_eq!(SceneKind::for_field(&sig), SceneKind::PlaceholderRect);

        let mut date = Field::create(FieldType::Date, 1, 0.1, 0.1);
        assert_eq!(SceneKind::for_field(&date), SceneKind::PlaceholderRect);
        date.value = Some("2024-01-31".to_string());
        assert_eq!(SceneKind::for_field(&date), SceneKind::EditableText);
    }

    #[test]
    fn test_object_denormalizes_geometry() {
        let field = Field::create(FieldType::Text, 1, 0.5, 0.5);
        let object = SceneObject::for_field(&field, extent());
        assert_eq!(object.rect(), PixelRect::new(500.0, 250.0, 200.0, 25.0));
        assert_eq!(
            object,
            SceneObject::PlaceholderRect {
                field_id: field.id.clone(),
                rect: PixelRect::new(500.0, 250.0, 200.0, 25.0),
                label: "Text".to_string(),
            }
        );
    }

    #[test]
    fn test_matches_ignores_tiny_drift() {
        let field = Field::create(FieldType::Stamp, 1, 0.2, 0.2);
        let a = SceneObject::for_field(&field, extent());
        let mut b = a.clone();
        let r = b.rect();
        b.set_rect(PixelRect::new(r.left + 1e-9, r.top, r.width, r.height));
        assert!(a.matches(&b, 1e-6));
        b.set_rect(PixelRect::new(r.left + 1.0, r.top, r.width, r.height));
        assert!(!a.matches(&b, 1e-6));
    }

    #[test]
    fn test_scene_insert_replaces_same_field() {
        let field = Field::create(FieldType::Text, 1, 0.2, 0.2);
        let mut scene = Scene::new();
        scene.insert(SceneObject::for_field(&field, extent()));
        scene.insert(SceneObject::for_field(&field, ViewportExtent::new(10.0, 10.0)));
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.get(&field.id).unwrap().rect().width, 2.0);
        assert!(scene.remove(&field.id).is_some());
        assert!(scene.is_empty());
    }
}
