// ============================================================================
// TOKEN CUTOUT COMPOSER — base mask minus foreground silhouettes
// ============================================================================

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::renderer::{AlignedView, ViewKey};
use crate::geometry::shape::{ShapeKind, Tessellation};
use crate::gpu::pool::RenderTargetPool;
use crate::gpu::target::RenderTarget;
use crate::math::Affine2;
use crate::raster::{self, Composite};

/// Camera offsets closer than this count as unchanged.
const CAM_FRAC_EPS: f32 = 1e-6;
/// Transforms with any component beyond this are treated as garbage.
const MAX_TRANSFORM_COMPONENT: f32 = 1e7;

/// Shape of a foreground object in its own local space.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Silhouette {
    Outline(ShapeKind),
    /// Alpha sprite in texel units; supplied at runtime only.
    #[serde(skip)]
    Sprite(GrayImage),
}

/// A dynamic object (token) that can cut holes in below-token masks.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForegroundObject {
    pub id: String,
    #[serde(default = "visible_default")]
    pub visible: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub occluded: bool,
    /// Silhouette local space → world.
    #[serde(default)]
    pub transform: Affine2,
    pub silhouette: Silhouette,
}

fn visible_default() -> bool {
    true
}

impl ForegroundObject {
    /// Visible, not hidden, not occluded and with a sane transform.
    pub fn contributes(&self) -> bool {
        if !self.visible || self.hidden || self.occluded {
            return false;
        }
        let t = &self.transform;
        [t.a, t.b, t.c, t.d, t.tx, t.ty]
            .iter()
            .all(|v| v.is_finite() && v.abs() <= MAX_TRANSFORM_COMPONENT)
    }

    fn draw(&self, img: &mut GrayImage, world_to_pixel: &Affine2, mode: Composite) {
        let m = self.transform.then(world_to_pixel);
        match &self.silhouette {
            Silhouette::Outline(kind) => {
                raster::fill_loops(img, &kind.loops(Tessellation::for_view(&m)), &m, mode);
            }
            Silhouette::Sprite(sprite) => raster::composite_sprite(img, sprite, &m, mode),
        }
    }
}

/// Maintains the tokens-only silhouette target shared by every region and
/// derives per-region cutout masks from it.
#[derive(Debug, Default)]
pub struct CutoutComposer {
    tokens_rt: Option<RenderTarget>,
    tokens_key: Option<ViewKey>,
    tokens_dirty: bool,
    /// Bumped by every `mark_dirty`; the tokens target is repainted at most
    /// once per generation.
    dirty_gen: u64,
    painted_gen: Option<u64>,
    paint_count: u64,
    last_cam_frac: Option<[f32; 2]>,
    recompose_count: u64,
}

impl CutoutComposer {
    pub fn new() -> Self {
        Self { tokens_dirty: true, ..Default::default() }
    }

    pub fn mark_dirty(&mut self) {
        self.tokens_dirty = true;
        self.dirty_gen += 1;
    }

    pub fn is_dirty(&self) -> bool {
        self.tokens_dirty
    }

    /// Recompose when tokens changed or the camera's sub-pixel offset moved.
    pub fn needs_recompose(&self, cam_frac: [f32; 2]) -> bool {
        if self.tokens_dirty {
            return true;
        }
        match self.last_cam_frac {
            None => true,
            Some(last) => {
                (last[0] - cam_frac[0]).abs() > CAM_FRAC_EPS || (last[1] - cam_frac[1]).abs() > CAM_FRAC_EPS
            }
        }
    }

    /// Record the state the current cutouts were composed against.
    pub fn settle(&mut self, cam_frac: [f32; 2]) {
        self.last_cam_frac = Some(cam_frac);
        self.tokens_dirty = false;
    }

    pub fn recompose_count(&self) -> u64 {
        self.recompose_count
    }

    /// Times the shared tokens target has been repainted.
    pub fn tokens_paint_count(&self) -> u64 {
        self.paint_count
    }

    /// Full path: copy the base and erase every silhouette directly.
    pub fn compose_full(
        &mut self,
        base: &RenderTarget,
        objects: &[ForegroundObject],
        view: &AlignedView,
        pool: &mut RenderTargetPool,
        reuse: Option<RenderTarget>,
    ) -> RenderTarget {
        let mut out = Self::target_like(base, pool, reuse);
        out.copy_from(base);
        let to_pixel = view.world_to_pixel(&out);
        for obj in objects.iter().filter(|o| o.contributes()) {
            obj.draw(&mut out.pixels, &to_pixel, Composite::Erase);
        }
        out
    }

    /// Incremental path: erase the shared tokens-only target from a fresh
    /// copy of the base.  The tokens target is only repainted when tokens
    /// are dirty or the view changed.
    pub fn compose_from_tokens(
        &mut self,
        base: &RenderTarget,
        objects: &[ForegroundObject],
        view: &AlignedView,
        pool: &mut RenderTargetPool,
        reuse: Option<RenderTarget>,
    ) -> RenderTarget {
        self.ensure_tokens(base, objects, view, pool);
        let mut out = Self::target_like(base, pool, reuse);
        out.copy_from(base);
        if let Some(tokens) = &self.tokens_rt {
            raster::erase_with(&mut out.pixels, &tokens.pixels);
        }
        self.recompose_count += 1;
        out
    }

    fn ensure_tokens(
        &mut self,
        base: &RenderTarget,
        objects: &[ForegroundObject],
        view: &AlignedView,
        pool: &mut RenderTargetPool,
    ) {
        let key = view.view_key(base.resolution);
        let fits = self
            .tokens_rt
            .as_ref()
            .is_some_and(|t| t.pixels.dimensions() == base.pixels.dimensions());
        if fits && self.painted_gen == Some(self.dirty_gen) && self.tokens_key == Some(key) {
            return;
        }
        let reuse = self.tokens_rt.take();
        let mut tokens = Self::target_like(base, pool, reuse);
        tokens.clear();
        let to_pixel = view.world_to_pixel(&tokens);
        for obj in objects.iter().filter(|o| o.contributes()) {
            obj.draw(&mut tokens.pixels, &to_pixel, Composite::Union);
        }
        self.tokens_rt = Some(tokens);
        self.tokens_key = Some(key);
        self.painted_gen = Some(self.dirty_gen);
        self.paint_count += 1;
    }

    /// Reuse `reuse` when it matches `base`, otherwise hand it back and
    /// acquire a matching target.
    fn target_like(base: &RenderTarget, pool: &mut RenderTargetPool, reuse: Option<RenderTarget>) -> RenderTarget {
        match reuse {
            Some(rt) if rt.width == base.width && rt.height == base.height && rt.resolution == base.resolution => rt,
            other => {
                if let Some(rt) = other {
                    pool.release(rt);
                }
                pool.acquire(base.width, base.height, base.resolution)
            }
        }
    }

    /// Release the tokens target and forget composed state.
    pub fn reset(&mut self, pool: &mut RenderTargetPool) {
        if let Some(rt) = self.tokens_rt.take() {
            pool.release(rt);
        }
        self.tokens_key = None;
        self.painted_gen = None;
        self.last_cam_frac = None;
        self.tokens_dirty = true;
    }
}
