//! Per-page scene synchronization
//!
//! A `PageScene` keeps the interactive objects of one page in step with the
//! store. Store to scene goes through `sync`, which reconciles and applies.
//! Scene to store only happens in `process_events`, and only for completed
//! gestures and selection changes; intermediate drag frames stay local.

use signfield_core::{
    CoordinateRangeError, DocumentSession, DocumentStore, FieldId, FieldPatch, NormalizedRect,
    ViewportExtent,
};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::events::SceneEvent;
use crate::raster::{PageRasterizer, RasterCancel, RasterScheduler, RasterTicket};
use crate::reconcile::{apply_ops, reconcile};
use crate::scene::Scene;

#[derive(Debug)]
pub struct PageScene {
    page: u32,
    viewport: Option<ViewportExtent>,
    scene: Scene,
    /// Object currently being dragged or resized
    gesture: Option<FieldId>,
    events: VecDeque<SceneEvent>,
    render_count: u64,
    pending_raster: Option<RasterCancel>,
}

impl PageScene {
    /// Scene for a 1-indexed page, inert until a viewport is attached
    pub fn new(page: u32) -> Self {
        Self {
            page,
            viewport: None,
            scene: Scene::new(),
            gesture: None,
            events: VecDeque::new(),
            render_count: 0,
            pending_raster: None,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn viewport(&self) -> Option<ViewportExtent> {
        self.viewport
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn active_gesture(&self) -> Option<&FieldId> {
        self.gesture.as_ref()
    }

    /// Number of passes that changed the scene
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Ask for this page's raster, superseding any earlier request
    pub fn request_raster<R: PageRasterizer>(
        &mut self,
        scheduler: &mut RasterScheduler<R>,
    ) -> RasterTicket {
        let ticket = scheduler.request(self.page);
        self.pending_raster = Some(ticket.canceller());
        ticket
    }

    /// Install a new viewport extent. The old scene is thrown away and rebuilt
    /// from the session in one full pass; objects are never rescaled in place.
    /// Queued events were measured against the old extent and are dropped.
    /// A raster in flight stays pending so `dispose` can still cancel it.
    pub fn attach_viewport(
        &mut self,
        extent: ViewportExtent,
        session: &DocumentSession,
    ) -> Result<usize, CoordinateRangeError> {
        if !extent.is_usable() {
            return Err(CoordinateRangeError(format!(
                "viewport extent {}x{} must be positive",
                extent.width, extent.height
            )));
        }
        let dropped = self.events.len();
        if dropped > 0 {
            debug!(page = self.page, dropped, "discarding events from previous viewport");
        }
        self.scene.clear();
        self.gesture = None;
        self.events.clear();
        self.viewport = Some(extent);
        debug!(page = self.page, width = extent.width, height = extent.height, "viewport attached");
        Ok(self.sync(session))
    }

    /// Drop the scene, queued events and any raster still in flight
    pub fn dispose(&mut self) {
        if let Some(pending) = self.pending_raster.take() {
            pending.cancel();
        }
        self.scene.clear();
        self.gesture = None;
        self.events.clear();
        self.viewport = None;
    }

    /// Reconcile against the session's fields for this page. Returns the
    /// number of ops applied.
    pub fn sync(&mut self, session: &DocumentSession) -> usize {
        let Some(viewport) = self.viewport else {
            return 0;
        };
        let page_fields = session.fields_on_page(self.page);
        let ops = reconcile(&page_fields, &self.scene, viewport, self.gesture.as_ref());
        if ops.is_empty() {
            return 0;
        }

        apply_ops(&mut self.scene, &ops);
        if let Some(id) = &self.gesture {
            if self.scene.get(id).is_none() {
                self.gesture = None;
            }
        }
        self.render_count += 1;
        debug!(
            page = self.page,
            ops = ops.len(),
            objects = self.scene.len(),
            revision = session.revision,
            "scene reconciled"
        );
        ops.len()
    }

    pub fn push_event(&mut self, event: SceneEvent) {
        self.events.push_back(event);
    }

    /// Drain the event queue in arrival order, writing completed geometry and
    /// selection into the store. Returns the number of events handled.
    pub fn process_events(&mut self, store: &mut DocumentStore) -> usize {
        let mut handled = 0;
        while let Some(event) = self.events.pop_front() {
            debug!(page = self.page, event = event.name(), "scene event");
            self.handle_event(event, store);
            handled += 1;
        }
        handled
    }

    fn handle_event(&mut self, event: SceneEvent, store: &mut DocumentStore) {
        match event {
            SceneEvent::GestureStarted { field_id } => {
                if self.scene.get(&field_id).is_some() {
                    self.gesture = Some(field_id);
                }
            }
            SceneEvent::GestureMoved { field_id, rect } => {
                if let Some(object) = self.scene.get_mut(&field_id) {
                    object.set_rect(rect);
                }
            }
            SceneEvent::GestureCompleted { field_id, rect } => {
                if self.gesture.as_ref() == Some(&field_id) {
                    self.gesture = None;
                }
                let Some(viewport) = self.viewport else {
                    return;
                };
                let Some(object) = self.scene.get_mut(&field_id) else {
                    debug!(field = %field_id, "gesture for unknown object ignored");
                    return;
                };

                let clamped = rect.clamp_to(viewport);
                object.set_rect(clamped);
                match NormalizedRect::from_viewport(clamped, viewport) {
                    Ok(geometry) => store.update_field(&field_id, &FieldPatch::geometry(geometry)),
                    Err(e) => warn!(field = %field_id, "gesture geometry rejected: {}", e),
                }
            }
            SceneEvent::SelectionChanged(ids) => store.set_active_field(ids.first()),
            SceneEvent::SelectionCleared => store.set_active_field(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::fakes::FakeRasterizer;
    use crate::raster::RasterOutcome;
    use crate::scene::SceneKind;
    use pretty_assertions::assert_eq;
    use signfield_core::{DataUrl, Field, FieldType, PixelRect};

    fn viewport() -> ViewportExtent {
        ViewportExtent::new(1000.0, 1000.0)
    }

    fn store_with(fields: Vec<Field>) -> DocumentStore {
        let mut store = DocumentStore::new();
        for field in fields {
            store.add_field(field);
        }
        store
    }

    fn attached(store: &DocumentStore) -> PageScene {
        let mut page = PageScene::new(1);
        page.attach_viewport(viewport(), &store.snapshot()).unwrap();
        page
    }

    #[test]
    fn test_attach_builds_page_objects_only() {
        let store = store_with(vec![
            Field::create(FieldType::Text, 1, 0.1, 0.1),
            Field::create(FieldType::Text, 2, 0.1, 0.1),
            Field::create(FieldType::Signature, 1, 0.5, 0.5),
        ]);
        let page = attached(&store);
        assert_eq!(page.scene().len(), 2);
        assert_eq!(page.render_count(), 1);
    }

    #[test]
    fn test_sync_without_viewport_does_nothing() {
        let store = store_with(vec![Field::create(FieldType::Text, 1, 0.1, 0.1)]);
        let mut page = PageScene::new(1);
        assert_eq!(page.sync(&store.snapshot()), 0);
        assert!(page.scene().is_empty());
    }

    #[test]
    fn test_unusable_viewport_rejected() {
        let store = DocumentStore::new();
        let mut page = PageScene::new(1);
        assert!(page
            .attach_viewport(ViewportExtent::new(0.0, 100.0), &store.snapshot())
            .is_err());
        assert!(page.viewport().is_none());
    }

    #[test]
    fn test_repeated_sync_is_quiet() {
        let store = store_with(vec![Field::create(FieldType::Date, 1, 0.3, 0.3)]);
        let mut page = attached(&store);
        assert_eq!(page.sync(&store.snapshot()), 0);
        assert_eq!(page.render_count(), 1);
    }

    #[test]
    fn test_gesture_completion_writes_normalized_geometry() {
        let field = Field::create(FieldType::Signature, 1, 0.1, 0.1);
        let id = field.id.clone();
        let mut store = store_with(vec![field]);
        let mut page = attached(&store);

        page.push_event(SceneEvent::GestureStarted {
            field_id: id.clone(),
        });
        page.push_event(SceneEvent::GestureCompleted {
            field_id: id.clone(),
            rect: PixelRect::new(250.0, 500.0, 300.0, 100.0),
        });
        assert_eq!(page.process_events(&mut store), 2);

        let snap = store.snapshot();
        let updated = snap.field(&id).unwrap();
        assert_eq!(
            (updated.x, updated.y, updated.width, updated.height),
            (0.25, 0.5, 0.3, 0.1)
        );
        assert!(page.active_gesture().is_none());
        // the scene already shows the committed geometry
        assert_eq!(page.sync(&snap), 0);
    }

    #[test]
    fn test_intermediate_moves_stay_in_scene() {
        let field = Field::create(FieldType::Text, 1, 0.1, 0.1);
        let id = field.id.clone();
        let mut store = store_with(vec![field]);
        let mut page = attached(&store);
        let revision = store.revision();

        page.push_event(SceneEvent::GestureStarted {
            field_id: id.clone(),
        });
        page.push_event(SceneEvent::GestureMoved {
            field_id: id.clone(),
            rect: PixelRect::new(400.0, 400.0, 200.0, 50.0),
        });
        page.process_events(&mut store);

        assert_eq!(store.revision(), revision);
        assert_eq!(page.scene().get(&id).unwrap().rect().left, 400.0);
    }

    #[test]
    fn test_store_update_does_not_clobber_live_drag() {
        let field = Field::create(FieldType::Text, 1, 0.1, 0.1);
        let id = field.id.clone();
        let mut store = store_with(vec![field]);
        let mut page = attached(&store);

        page.push_event(SceneEvent::GestureStarted {
            field_id: id.clone(),
        });
        page.push_event(SceneEvent::GestureMoved {
            field_id: id.clone(),
            rect: PixelRect::new(400.0, 400.0, 200.0, 50.0),
        });
        page.process_events(&mut store);

        // a concurrent store edit moves the same field elsewhere
        store.update_field(&id, &FieldPatch::value("typed"));
        store.update_field(
            &id,
            &FieldPatch::geometry(NormalizedRect::new(0.7, 0.7, 0.2, 0.05).unwrap()),
        );
        page.sync(&store.snapshot());

        // kind changed to editable text, so the object is rebuilt
        let object = page.scene().get(&id).unwrap();
        assert_eq!(object.kind(), SceneKind::EditableText);

        // a geometry-only change while dragging leaves the live object alone
        page.push_event(SceneEvent::GestureStarted {
            field_id: id.clone(),
        });
        page.push_event(SceneEvent::GestureMoved {
            field_id: id.clone(),
            rect: PixelRect::new(10.0, 10.0, 200.0, 50.0),
        });
        page.process_events(&mut store);
        store.update_field(
            &id,
            &FieldPatch::geometry(NormalizedRect::new(0.5, 0.5, 0.2, 0.05).unwrap()),
        );
        assert_eq!(page.sync(&store.snapshot()), 0);
        assert_eq!(page.scene().get(&id).unwrap().rect().left, 10.0);
    }

    #[test]
    fn test_out_of_bounds_drop_is_clamped() {
        let field = Field::create(FieldType::Stamp, 1, 0.1, 0.1);
        let id = field.id.clone();
        let mut store = store_with(vec![field]);
        let mut page = attached(&store);

        page.push_event(SceneEvent::GestureCompleted {
            field_id: id.clone(),
            rect: PixelRect::new(900.0, -40.0, 200.0, 50.0),
        });
        page.process_events(&mut store);

        let snap = store.snapshot();
        let updated = snap.field(&id).unwrap();
        assert_eq!((updated.x, updated.y), (0.8, 0.0));
        assert!(updated.x + updated.width <= 1.0);
    }

    #[test]
    fn test_selection_events() {
        let a = Field::create(FieldType::Text, 1, 0.1, 0.1);
        let b = Field::create(FieldType::Text, 1, 0.4, 0.4);
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        let mut store = store_with(vec![a, b]);
        let mut page = attached(&store);

        page.push_event(SceneEvent::SelectionChanged(vec![a_id.clone(), b_id.clone()]));
        page.process_events(&mut store);
        assert_eq!(store.snapshot().active_field_id, Some(a_id));

        page.push_event(SceneEvent::SelectionCleared);
        page.process_events(&mut store);
        assert!(store.snapshot().active_field_id.is_none());

        page.push_event(SceneEvent::SelectionChanged(vec![FieldId::from("stale")]));
        page.process_events(&mut store);
        assert!(store.snapshot().active_field_id.is_none());
    }

    #[test]
    fn test_removed_field_leaves_scene() {
        let field = Field::create(FieldType::Text, 1, 0.1, 0.1);
        let id = field.id.clone();
        let mut store = store_with(vec![field]);
        let mut page = attached(&store);

        store.remove_field(&id);
        assert_eq!(page.sync(&store.snapshot()), 1);
        assert!(page.scene().is_empty());
        assert_eq!(page.render_count(), 2);
    }

    #[test]
    fn test_signature_value_swaps_representation() {
        let field = Field::create(FieldType::Signature, 1, 0.1, 0.1);
        let id = field.id.clone();
        let mut store = store_with(vec![field]);
        let mut page = attached(&store);
        assert_eq!(
            page.scene().get(&id).unwrap().kind(),
            SceneKind::PlaceholderRect
        );

        let png = DataUrl::encode("image/png", b"\x89PNG\r\n\x1a\n");
        store.update_field(&id, &FieldPatch::value(png));
        page.sync(&store.snapshot());
        assert_eq!(page.scene().get(&id).unwrap().kind(), SceneKind::Image);
    }

    #[test]
    fn test_reattach_rebuilds_at_new_scale() {
        let store = store_with(vec![Field::create(FieldType::Text, 1, 0.5, 0.5)]);
        let mut page = attached(&store);
        page.attach_viewport(ViewportExtent::new(500.0, 500.0), &store.snapshot())
            .unwrap();
        let object = &page.scene().objects()[0];
        assert_eq!(object.rect(), PixelRect::new(250.0, 250.0, 100.0, 25.0));
    }

    #[tokio::test]
    async fn test_dispose_cancels_pending_raster() {
        let store = DocumentStore::new();
        let mut scheduler = RasterScheduler::new(FakeRasterizer { slow_page: Some(1) }, 1.0);
        let mut page = PageScene::new(1);
        page.attach_viewport(viewport(), &store.snapshot()).unwrap();

        let ticket = page.request_raster(&mut scheduler);
        page.dispose();
        assert_eq!(ticket.outcome().await.unwrap(), RasterOutcome::Canceled);
        assert!(page.viewport().is_none());
    }

    #[test]
    fn test_reattach_drops_events_from_old_viewport() {
        let field = Field::create(FieldType::Text, 1, 0.1, 0.1);
        let id = field.id.clone();
        let mut store = store_with(vec![field]);
        let mut page = attached(&store);

        page.push_event(SceneEvent::GestureCompleted {
            field_id: id.clone(),
            rect: PixelRect::new(250.0, 250.0, 200.0, 50.0),
        });
        page.attach_viewport(ViewportExtent::new(500.0, 500.0), &store.snapshot())
            .unwrap();
        assert_eq!(page.pending_events(), 0);
        assert_eq!(page.process_events(&mut store), 0);

        let snap = store.snapshot();
        let unchanged = snap.field(&id).unwrap();
        assert_eq!((unchanged.x, unchanged.y), (0.1, 0.1));
    }

    #[tokio::test]
    async fn test_dispose_after_reattach_still_cancels_raster() {
        let store = DocumentStore::new();
        let mut scheduler = RasterScheduler::new(FakeRasterizer { slow_page: Some(1) }, 1.0);
        let mut page = PageScene::new(1);

        let ticket = page.request_raster(&mut scheduler);
        page.attach_viewport(ViewportExtent::new(100.0, 100.0), &store.snapshot())
            .unwrap();
        page.dispose();
        assert_eq!(ticket.outcome().await.unwrap(), RasterOutcome::Canceled);
    }
}
