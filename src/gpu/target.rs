// ============================================================================
// RENDER TARGET — pooled alpha raster with an optional GPU mirror
// ============================================================================

use image::GrayImage;

use super::context::GpuContext;
use super::texture::MaskTexture;

/// An 8-bit alpha render target sized in CSS pixels at a resolution.
///
/// `pixels` holds `round(width · resolution) × round(height · resolution)`
/// texels; `gpu` is populated by [`RenderTarget::sync_gpu`].
pub struct RenderTarget {
    pub id: u64,
    /// CSS width.
    pub width: u32,
    /// CSS height.
    pub height: u32,
    pub resolution: f32,
    pub pixels: GrayImage,
    pub gpu: Option<MaskTexture>,
}

impl RenderTarget {
    pub fn new(id: u64, width: u32, height: u32, resolution: f32) -> Self {
        let (pw, ph) = Self::pixel_size(width, height, resolution);
        Self {
            id,
            width,
            height,
            resolution,
            pixels: GrayImage::new(pw, ph),
            gpu: None,
        }
    }

    pub fn pixel_size(width: u32, height: u32, resolution: f32) -> (u32, u32) {
        let px = |css: u32| ((css as f32 * resolution).round().max(1.0)) as u32;
        (px(width), px(height))
    }

    pub fn pixel_width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn pixel_height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn clear(&mut self) {
        crate::raster::clear(&mut self.pixels);
    }

    /// Copy another target's texels.  Sizes must match.
    pub fn copy_from(&mut self, other: &RenderTarget) -> bool {
        if self.pixels.dimensions() != other.pixels.dimensions() {
            return false;
        }
        self.pixels.copy_from_slice(other.pixels.as_raw());
        true
    }

    /// Alpha at a texel, 0 outside the target.
    pub fn alpha(&self, x: u32, y: u32) -> u8 {
        if x < self.pixels.width() && y < self.pixels.height() {
            self.pixels.get_pixel(x, y).0[0]
        } else {
            0
        }
    }

    /// Mirror the CPU texels onto the GPU.
    pub fn sync_gpu(&mut self, ctx: &GpuContext) {
        MaskTexture::sync(&mut self.gpu, &ctx.device, &ctx.queue, "region mask target", &self.pixels);
    }
}

impl std::fmt::Debug for RenderTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTarget")
            .field("id", &self.id)
            .field("css", &(self.width, self.height))
            .field("resolution", &self.resolution)
            .field("pixels", &self.pixels.dimensions())
            .field("gpu", &self.gpu.is_some())
            .finish()
    }
}
