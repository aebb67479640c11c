//! Field list to scene reconciliation
//!
//! `reconcile` compares the fields of one page with the current scene and
//! returns the operations that bring the scene in line. It never touches the
//! scene itself, so a pass can be inspected, logged or dropped.

use signfield_core::{Field, FieldId, ViewportExtent};
use std::collections::HashSet;

use crate::scene::{Scene, SceneObject};

/// Geometry differences below this many pixels are not worth an update
pub const GEOMETRY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub enum SceneOp {
    /// The field is gone from this page
    Remove(FieldId),
    /// No object exists for the field yet
    Create(SceneObject),
    /// The field's visual kind changed; destroy and rebuild
    Recreate(SceneObject),
    /// Same kind, new geometry or content
    Update(SceneObject),
}

impl SceneOp {
    pub fn field_id(&self) -> &FieldId {
        match self {
            SceneOp::Remove(id) => id,
            SceneOp::Create(o) | SceneOp::Recreate(o) | SceneOp::Update(o) => o.field_id(),
        }
    }
}

/// Operations turning `scene` into the picture of `page_fields`.
///
/// Removals come first, then one op per field in list order. The object named
/// by `active` is mid-gesture and never receives an `Update`.
pub fn reconcile(
    page_fields: &[&Field],
    scene: &Scene,
    viewport: ViewportExtent,
    active: Option<&FieldId>,
) -> Vec<SceneOp> {
    let wanted: HashSet<&FieldId> = page_fields.iter().map(|f| &f.id).collect();

    let mut ops: Vec<SceneOp> = scene
        .objects()
        .iter()
        .filter(|o| !wanted.contains(o.field_id()))
        .map(|o| SceneOp::Remove(o.field_id().clone()))
        .collect();

    let mut seen = HashSet::new();
    for field in page_fields {
        if !seen.insert(&field.id) {
            continue;
        }
        let desired = SceneObject::for_field(field, viewport);
        match scene.get(&field.id) {
            None => ops.push(SceneOp::Create(desired)),
            Some(existing) if existing.kind() != desired.kind() => {
                ops.push(SceneOp::Recreate(desired))
            }
            Some(_) if active == Some(&field.id) => {}
            Some(existing) if !existing.matches(&desired, GEOMETRY_EPSILON) => {
                ops.push(SceneOp::Update(desired))
            }
            Some(_) => {}
        }
    }

    ops
}

/// Apply ops in order
pub fn apply_ops(scene: &mut Scene, ops: &[SceneOp]) {
    for op in ops {
        match op {
            SceneOp::Remove(id) => {
                scene.remove(id);
            }
            SceneOp::Create(object) | SceneOp::Recreate(object) | SceneOp::Update(object) => {
                scene.insert(object.clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneKind;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use signfield_core::{DataUrl, FieldType};

    fn viewport() -> ViewportExtent {
        ViewportExtent::new(734.4, 950.4)
    }

    fn field_at(field_type: FieldType, x: f64, y: f64) -> Field {
        Field::create(field_type, 1, x, y)
    }

    fn synced(fields: &[&Field]) -> Scene {
        let mut scene = Scene::new();
        let ops = reconcile(fields, &scene, viewport(), None);
        apply_ops(&mut scene, &ops);
        scene
    }

    #[test]
    fn test_empty_scene_creates_every_field() {
        let a = field_at(FieldType::Text, 0.1, 0.1);
        let b = field_at(FieldType::Signature, 0.3, 0.6);
        let ops = reconcile(&[&a, &b], &Scene::new(), viewport(), None);
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], SceneOp::Create(o) if o.field_id() == &a.id));
        assert!(matches!(&ops[1], SceneOp::Create(o) if o.field_id() == &b.id));
    }

    #[test]
    fn test_removals_come_first() {
        let a = field_at(FieldType::Text, 0.1, 0.1);
        let b = field_at(FieldType::Text, 0.2, 0.2);
        let scene = synced(&[&a]);
        let ops = reconcile(&[&b], &scene, viewport(), None);
        assert_eq!(ops[0], SceneOp::Remove(a.id.clone()));
        assert!(matches!(&ops[1], SceneOp::Create(_)));
    }

    #[test]
    fn test_kind_change_recreates() {
        let mut sig = field_at(FieldType::Signature, 0.1, 0.1);
        let scene = synced(&[&sig]);
        sig.value = Some(DataUrl::encode("image/png", b"\x89PNG\r\n\x1a\n"));

        let ops = reconcile(&[&sig], &scene, viewport(), None);
        assert_eq!(ops.len(), 1);
        match &ops[0] {
            SceneOp::Recreate(o) => assert_eq!(o.kind(), SceneKind::Image),
            other => panic!("expected recreate, got {:?}", other),
        }
    }

    #[test]
    fn test_moved_field_updates() {
        let mut text = field_at(FieldType::Text, 0.1, 0.1);
        let scene = synced(&[&text]);
        text.x = 0.4;
        let ops = reconcile(&[&text], &scene, viewport(), None);
        assert!(matches!(&ops[..], [SceneOp::Update(_)]));
    }

    #[test]
    fn test_active_object_not_clobbered() {
        let mut text = field_at(FieldType::Text, 0.1, 0.1);
        let scene = synced(&[&text]);
        text.x = 0.4;
        let ops = reconcile(&[&text], &scene, viewport(), Some(&text.id));
        assert!(ops.is_empty());
    }

    #[test]
    fn test_duplicate_ids_reconcile_once() {
        let a = field_at(FieldType::Text, 0.1, 0.1);
        let ops = reconcile(&[&a, &a], &Scene::new(), viewport(), None);
        assert_eq!(ops.len(), 1);
    }

    fn arb_field() -> impl Strategy<Value = Field> {
        (0usize..4, 0.0f64..0.8, 0.0f64..0.95, proptest::option::of("[a-z]{1,8}")).prop_map(
            |(kind, x, y, value)| {
                let field_type = [
                    FieldType::Signature,
                    FieldType::Text,
                    FieldType::Date,
                    FieldType::Stamp,
                ][kind];
                let mut field = Field::create(field_type, 1, x, y);
                field.value = value;
                field
            },
        )
    }

    proptest! {
        #[test]
        fn prop_reconcile_is_idempotent(fields in proptest::collection::vec(arb_field(), 0..12)) {
            let refs: Vec<&Field> = fields.iter().collect();
            let mut scene = Scene::new();
            let first = reconcile(&refs, &scene, viewport(), None);
            apply_ops(&mut scene, &first);

            prop_assert_eq!(scene.len(), fields.len());
            prop_assert!(reconcile(&refs, &scene, viewport(), None).is_empty());
        }

        #[test]
        fn prop_scene_tracks_any_field_subset(
            fields in proptest::collection::vec(arb_field(), 1..10),
            keep in proptest::collection::vec(any::<bool>(), 10),
        ) {
            let all: Vec<&Field> = fields.iter().collect();
            let mut scene = Scene::new();
            let ops = reconcile(&all, &scene, viewport(), None);
            apply_ops(&mut scene, &ops);

            let kept: Vec<&Field> = fields
                .iter()
                .zip(&keep)
                .filter(|(_, k)| **k)
                .map(|(f, _)| f)
                .collect();
            let ops = reconcile(&kept, &scene, viewport(), None);
            apply_ops(&mut scene, &ops);

            prop_assert_eq!(scene.len(), kept.len());
            for field in &kept {
                prop_assert!(scene.get(&field.id).is_some());
            }
        }
    }
}
