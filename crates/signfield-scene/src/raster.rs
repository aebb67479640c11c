//! Cancelable page rasterization
//!
//! At most one rasterization runs per page. Requesting a page again aborts the
//! task in flight and bumps the page's generation; any result that comes back
//! for an older generation is reported as `RasterOutcome::Canceled`.

use async_trait::async_trait;
use signfield_core::ViewportExtent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

/// Scale used by the interactive view when none is configured
pub const DEFAULT_RENDER_SCALE: f64 = 1.2;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RasterError {
    #[error("Rasterization failed: {0}")]
    Failed(String),
}

/// A rendered page: RGBA8 pixels, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub extent: ViewportExtent,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RasterOutcome {
    Ready(Raster),
    /// Superseded or disposed before the result was taken
    Canceled,
}

#[async_trait]
pub trait PageRasterizer: Send + Sync + 'static {
    /// Render a 1-indexed page at `scale` pixels per point
    async fn rasterize(&self, page: u32, scale: f64) -> Result<Raster, RasterError>;
}

/// Cancels one outstanding rasterization, whether or not it has finished
#[derive(Debug, Clone)]
pub struct RasterCancel {
    generation: u64,
    latest: Arc<AtomicU64>,
    abort: AbortHandle,
}

impl RasterCancel {
    pub fn cancel(&self) {
        // Only move the page forward if nothing newer was requested since
        let _ = self.latest.compare_exchange(
            self.generation,
            self.generation + 1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.abort.abort();
    }
}

/// Pending rasterization of one page
#[derive(Debug)]
pub struct RasterTicket {
    page: u32,
    generation: u64,
    latest: Arc<AtomicU64>,
    handle: JoinHandle<Result<Raster, RasterError>>,
}

impl RasterTicket {
    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn canceller(&self) -> RasterCancel {
        RasterCancel {
            generation: self.generation,
            latest: Arc::clone(&self.latest),
            abort: self.handle.abort_handle(),
        }
    }

    /// Wait for the task. Stale and aborted results come back as `Canceled`.
    pub async fn outcome(self) -> Result<RasterOutcome, RasterError> {
        let page = self.page;
        let generation = self.generation;
        let latest = Arc::clone(&self.latest);
        let joined = self.handle.await;
        let current = latest.load(Ordering::SeqCst) == generation;

        match joined {
            Ok(Ok(raster)) if current => Ok(RasterOutcome::Ready(raster)),
            Ok(Err(e)) if current => Err(e),
            Ok(_) => {
                warn!(page, generation, "discarding stale raster result");
                Ok(RasterOutcome::Canceled)
            }
            Err(e) if e.is_cancelled() => {
                debug!(page, generation, "rasterization canceled");
                Ok(RasterOutcome::Canceled)
            }
            Err(e) => Err(RasterError::Failed(e.to_string())),
        }
    }
}

pub struct RasterScheduler<R: PageRasterizer> {
    rasterizer: Arc<R>,
    scale: f64,
    pages: HashMap<u32, RasterCancel>,
    generations: HashMap<u32, Arc<AtomicU64>>,
}

impl<R: PageRasterizer> RasterScheduler<R> {
    pub fn new(rasterizer: R, scale: f64) -> Self {
        Self {
            rasterizer: Arc::new(rasterizer),
            scale,
            pages: HashMap::new(),
            generations: HashMap::new(),
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Start rendering `page`, aborting the previous request for it.
    /// Must be called from within a tokio runtime.
    pub fn request(&mut self, page: u32) -> RasterTicket {
        let latest = Arc::clone(self.generations.entry(page).or_default());
        let generation = latest.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(previous) = self.pages.remove(&page) {
            debug!(page, "aborting superseded rasterization");
            previous.abort.abort();
        }

        let rasterizer = Arc::clone(&self.rasterizer);
        let scale = self.scale;
        let handle = tokio::spawn(async move { rasterizer.rasterize(page, scale).await });

        let ticket = RasterTicket {
            page,
            generation,
            latest,
            handle,
        };
        self.pages.insert(page, ticket.canceller());
        ticket
    }

    /// Cancel whatever is outstanding for `page`
    pub fn cancel(&mut self, page: u32) {
        if let Some(pending) = self.pages.remove(&page) {
            pending.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, pending) in self.pages.drain() {
            pending.cancel();
        }
    }
}

impl<R: PageRasterizer> Drop for RasterScheduler<R> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::time::Duration;

    /// Page extent is `600 x 800` points times scale; page 1 renders slowly
    pub struct FakeRasterizer {
        pub slow_page: Option<u32>,
    }

    #[async_trait]
    impl PageRasterizer for FakeRasterizer {
        async fn rasterize(&self, page: u32, scale: f64) -> Result<Raster, RasterError> {
            if self.slow_page == Some(page) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if page == 0 {
                return Err(RasterError::Failed("no page 0".to_string()));
            }
            Ok(Raster {
                extent: ViewportExtent::new(600.0 * scale, 800.0 * scale),
                pixels: Vec::new(),
            })
        }
    }
}
