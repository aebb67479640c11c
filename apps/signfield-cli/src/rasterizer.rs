//! Page "rasterizer" that only measures pages and paints them white

use async_trait::async_trait;
use signfield_core::{PageSize, ViewportExtent};
use signfield_scene::{PageRasterizer, Raster, RasterError};

pub struct BlankPageRasterizer {
    pages: Vec<PageSize>,
}

impl BlankPageRasterizer {
    pub fn new(pages: Vec<PageSize>) -> Self {
        Self { pages }
    }
}

/// Largest raster this measuring rasterizer will allocate
const MAX_RASTER_BYTES: usize = 256 * 1024 * 1024;

/// RGBA byte length of a raster covering `extent`
fn pixel_len(extent: ViewportExtent) -> Option<usize> {
    let width = extent.width.ceil();
    let height = extent.height.ceil();
    if width > u32::MAX as f64 || height > u32::MAX as f64 {
        return None;
    }
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(4)
        .filter(|len| *len <= MAX_RASTER_BYTES)
}

#[async_trait]
impl PageRasterizer for BlankPageRasterizer {
    async fn rasterize(&self, page: u32, scale: f64) -> Result<Raster, RasterError> {
        let size = page
            .checked_sub(1)
            .and_then(|idx| self.pages.get(idx as usize))
            .ok_or_else(|| RasterError::Failed(format!("page {} does not exist", page)))?;
        if !(scale.is_finite() && scale > 0.0) {
            return Err(RasterError::Failed(format!("invalid scale {}", scale)));
        }

        let extent = ViewportExtent::new(size.width() * scale, size.height() * scale);
        let len = pixel_len(extent).ok_or_else(|| {
            RasterError::Failed(format!(
                "raster of {}x{} at scale {} is too large",
                extent.width, extent.height, scale
            ))
        })?;
        Ok(Raster {
            extent,
            pixels: vec![255; len],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter() -> PageSize {
        PageSize {
            media_box: [0.0, 0.0, 612.0, 792.0],
        }
    }

    #[tokio::test]
    async fn test_extent_scales_page_size() {
        let rasterizer = BlankPageRasterizer::new(vec![letter()]);
        let raster = rasterizer.rasterize(1, 0.5).await.unwrap();
        assert_eq!(raster.extent, ViewportExtent::new(306.0, 396.0));
        assert_eq!(raster.pixels.len(), 306 * 396 * 4);
    }

    #[tokio::test]
    async fn test_missing_page_fails() {
        let rasterizer = BlankPageRasterizer::new(vec![letter()]);
        assert!(rasterizer.rasterize(2, 1.0).await.is_err());
        assert!(rasterizer.rasterize(0, 1.0).await.is_err());
        assert!(rasterizer.rasterize(1, 0.0).await.is_err());
    }

    #[tokio::test]
    async fn test_huge_scale_fails_instead_of_allocating() {
        let rasterizer = BlankPageRasterizer::new(vec![letter()]);
        assert!(matches!(
            rasterizer.rasterize(1, 1e9).await,
            Err(RasterError::Failed(_))
        ));
        assert!(rasterizer.rasterize(1, 100.0).await.is_err());
    }
}
