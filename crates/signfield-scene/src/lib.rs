//! Interactive page scenes kept in step with the document store
//!
//! Each page owns a `PageScene`: a set of draggable objects, one per field on
//! that page. `reconcile` computes what has to change, the engine applies it
//! and feeds finished gestures back to the store. Page rasters are produced
//! asynchronously and can be superseded at any time.

pub mod engine;
pub mod events;
pub mod raster;
pub mod reconcile;
pub mod scene;

pub use engine::PageScene;
pub use events::SceneEvent;
pub use raster::{
    PageRasterizer, Raster, RasterCancel, RasterError, RasterOutcome, RasterScheduler,
    RasterTicket, DEFAULT_RENDER_SCALE,
};
pub use reconcile::{apply_ops, reconcile, SceneOp, GEOMETRY_EPSILON};
pub use scene::{Scene, SceneKind, SceneObject};
