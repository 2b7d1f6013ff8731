// ============================================================================
// REGION MASK RENDERER — camera-aligned alpha masks for one region
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::MaskError;
use crate::geometry::shape::{Shape, Tessellation};
use crate::gpu::pool::RenderTargetPool;
use crate::gpu::target::RenderTarget;
use crate::math::Affine2;
use crate::raster;

/// Camera state supplied by the host every frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// World → CSS pixel stage matrix.
    pub transform: Affine2,
    #[serde(default = "default_dpr")]
    pub device_pixel_ratio: f32,
    pub css_width: u32,
    pub css_height: u32,
}

fn default_dpr() -> f32 {
    1.0
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            transform: Affine2::IDENTITY,
            device_pixel_ratio: 1.0,
            css_width: 800,
            css_height: 600,
        }
    }
}

/// Identity of a view for the stable-view watcher: device size, mask
/// resolution and the snapped matrix, compared bit for bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ViewKey([u32; 9]);

/// A view with its translation snapped to the device pixel grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlignedView {
    pub snapped: Affine2,
    pub css_to_world: Affine2,
    pub world_per_css: f32,
    /// Sub-device-pixel remainder of the camera translation, in 0..1.
    pub cam_frac: [f32; 2],
    pub dpr: f32,
    pub css_width: u32,
    pub css_height: u32,
    pub device_width: u32,
    pub device_height: u32,
}

impl AlignedView {
    pub fn new(view: &ViewState) -> Result<Self, MaskError> {
        let t = view.transform;
        if !t.is_finite() {
            return Err(MaskError::InvalidBounds("non-finite view transform".to_string()));
        }
        let dpr = if view.device_pixel_ratio.is_finite() && view.device_pixel_ratio > 0.0 {
            view.device_pixel_ratio
        } else {
            1.0
        };
        let snapped = Affine2 {
            tx: (t.tx * dpr).round() / dpr,
            ty: (t.ty * dpr).round() / dpr,
            ..t
        };
        let css_to_world = snapped
            .invert()
            .ok_or_else(|| MaskError::InvalidBounds("view transform is not invertible".to_string()))?;
        let css_width = view.css_width.max(1);
        let css_height = view.css_height.max(1);
        Ok(Self {
            snapped,
            css_to_world,
            world_per_css: css_to_world.mean_scale(),
            cam_frac: [(t.tx * dpr).rem_euclid(1.0), (t.ty * dpr).rem_euclid(1.0)],
            dpr,
            css_width,
            css_height,
            device_width: ((css_width as f32 * dpr).round() as u32).max(1),
            device_height: ((css_height as f32 * dpr).round() as u32).max(1),
        })
    }

    pub fn view_key(&self, resolution: f32) -> ViewKey {
        let s = &self.snapped;
        ViewKey([
            self.device_width,
            self.device_height,
            resolution.to_bits(),
            s.a.to_bits(),
            s.b.to_bits(),
            s.c.to_bits(),
            s.d.to_bits(),
            s.tx.to_bits(),
            s.ty.to_bits(),
        ])
    }

    /// World → texel transform for a target covering this view.
    pub fn world_to_pixel(&self, rt: &RenderTarget) -> Affine2 {
        self.snapped.then(&Affine2::scale(
            rt.pixel_width() as f32 / self.css_width as f32,
            rt.pixel_height() as f32 / self.css_height as f32,
        ))
    }
}

/// Texels per CSS pixel for region masks: the device pixel ratio, capped
/// by `cap` and by the texture limit, never below 0.5 unless the texture
/// limit forces it.
pub fn mask_resolution(view: &AlignedView, max_texture: u32, cap: f32) -> f32 {
    let span = view.css_width.max(view.css_height) as f32;
    let max_tex = max_texture.max(1) as f32;
    let mut res = cap.min(view.dpr).min(max_tex / span).max(0.5);
    if (span * res).round() > max_tex {
        res = max_tex / span;
    }
    res
}

/// Output resolution for the effect filters themselves.
pub fn filter_resolution(view: &AlignedView, max_texture: u32) -> f32 {
    let span = view.device_width.max(view.device_height) as f32;
    view.dpr * (max_texture.max(1) as f32 / span).min(1.0)
}

/// Rasterize a region into a pooled target.  The caller owns the result
/// and must hand it back to `pool`.
pub fn build_region_mask(
    shapes: &[Shape],
    view: &AlignedView,
    resolution: f32,
    pool: &mut RenderTargetPool,
) -> RenderTarget {
    let mut rt = pool.acquire(view.css_width, view.css_height, resolution);
    let to_pixel = view.world_to_pixel(&rt);
    raster::rasterize_region(&mut rt.pixels, shapes, &to_pixel, Tessellation::for_view(&to_pixel));
    rt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::shape::ShapeKind;

    fn view(tx: f32, dpr: f32) -> ViewState {
        ViewState {
            transform: Affine2::camera(1.0, tx, 0.0),
            device_pixel_ratio: dpr,
            css_width: 100,
            css_height: 80,
        }
    }

    #[test]
    fn translation_snaps_to_device_pixels() {
        let v = AlignedView::new(&view(10.3, 2.0)).unwrap();
        assert_eq!(v.snapped.tx, 10.5);
        assert!((v.cam_frac[0] - 0.6).abs() < 1e-4);
        assert_eq!((v.device_width, v.device_height), (200, 160));
    }

    #[test]
    fn sub_pixel_pan_keeps_the_key() {
        let a = AlignedView::new(&view(10.01, 1.0)).unwrap();
        let b = AlignedView::new(&view(10.02, 1.0)).unwrap();
        assert_eq!(a.view_key(1.0), b.view_key(1.0));
        assert_ne!(a.cam_frac, b.cam_frac);
    }

    #[test]
    fn resolution_respects_texture_limit() {
        let v = AlignedView::new(&view(0.0, 3.0)).unwrap();
        assert_eq!(mask_resolution(&v, 8192, 4.0), 3.0);
        assert_eq!(mask_resolution(&v, 150, 4.0), 1.5);
        // The texture limit wins over the 0.5 floor.
        assert_eq!(mask_resolution(&v, 20, 4.0), 0.2);
        assert_eq!(filter_resolution(&v, 150), 3.0 * 150.0 / 300.0);
    }

    #[test]
    fn mask_matches_shape_in_view() {
        let mut pool = RenderTargetPool::new(2);
        let v = AlignedView::new(&view(0.0, 2.0)).unwrap();
        let shapes = [Shape::solid(ShapeKind::Rectangle { x: 10.0, y: 10.0, width: 20.0, height: 20.0, rotation: 0.0 })];
        let rt = build_region_mask(&shapes, &v, 2.0, &mut pool);
        assert_eq!(rt.pixel_width(), 200);
        assert_eq!(rt.alpha(40, 40), 255);
        assert_eq!(rt.alpha(19, 40), 0);
        assert_eq!(rt.alpha(60, 40), 0);
        pool.release(rt);
    }

    #[test]
    fn singular_view_is_an_error() {
        let mut v = view(0.0, 1.0);
        v.transform = Affine2::scale(0.0, 0.0);
        assert!(AlignedView::new(&v).is_err());
    }
}
