//! Events reported by the interactive surface

use signfield_core::{FieldId, PixelRect};

/// Queued on a `PageScene` and consumed between reconciliation passes
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// A drag or resize began on the field's object
    GestureStarted { field_id: FieldId },
    /// Intermediate frame; moves the scene object only
    GestureMoved { field_id: FieldId, rect: PixelRect },
    /// Drag or resize finished with the object at `rect`
    GestureCompleted { field_id: FieldId, rect: PixelRect },
    /// Objects now selected, first one wins
    SelectionChanged(Vec<FieldId>),
    SelectionCleared,
}

impl SceneEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SceneEvent::GestureStarted { .. } => "gesture-started",
            SceneEvent::GestureMoved { .. } => "gesture-moved",
            SceneEvent::GestureCompleted { .. } => "gesture-completed",
            SceneEvent::SelectionChanged(_) => "selection-changed",
            SceneEvent::SelectionCleared => "selection-cleared",
        }
    }
}
