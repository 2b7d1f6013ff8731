// ============================================================================
// SDF BUILDER — rasterize a region and encode its signed distance texture
// ============================================================================

use image::GrayImage;

use super::edt::SignedDistanceField;
use crate::error::MaskError;
use crate::geometry::fingerprint::GeometryFingerprint;
use crate::geometry::shape::{Shape, Tessellation};
use crate::gpu::context::GpuContext;
use crate::gpu::texture::MaskTexture;
use crate::math::{Affine2, Rect, Vec2};
use crate::raster;

/// Smallest accepted bounds extent (world units).
const MIN_EXTENT: f32 = 1e-3;

/// Inputs that size the SDF raster.
#[derive(Clone, Copy, Debug)]
pub struct SdfParams {
    /// Output viewport in device pixels; one texel starts at one pixel.
    pub device_width: f32,
    pub device_height: f32,
    pub max_texture: u32,
    pub encode_k: f32,
    pub pad_px: u32,
}

/// Everything a shader needs to turn an SDF sample back into world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SdfDecode {
    pub uv_from_world: Affine2,
    /// `world = sample · scale + offset`, sample in 0..1.
    pub scale: f32,
    pub offset: f32,
    pub texel: [f32; 2],
}

pub struct SdfTexture {
    pub id: u64,
    pub fingerprint: GeometryFingerprint,
    /// Largest distance (world units) the encoding can represent.
    pub max_dist_world: f32,
    pub pixels: GrayImage,
    pub decode: SdfDecode,
    pub gpu: Option<MaskTexture>,
}

impl SdfTexture {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn upload(&mut self, ctx: &GpuContext) {
        MaskTexture::sync(&mut self.gpu, &ctx.device, &ctx.queue, "region sdf", &self.pixels);
    }

    /// Decoded signed distance at a world point (bilinear, clamp to edge).
    pub fn sample(&self, world: Vec2) -> f32 {
        let uv = self.decode.uv_from_world.apply(world);
        let v = sample_bilinear(&self.pixels, uv);
        v * self.decode.scale + self.decode.offset
    }
}

impl std::fmt::Debug for SdfTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdfTexture")
            .field("id", &self.id)
            .field("fingerprint", &self.fingerprint.to_string())
            .field("size", &self.pixels.dimensions())
            .field("max_dist_world", &self.max_dist_world)
            .finish()
    }
}

/// Normalized (0..1) bilinear sample at texture coordinates `uv`.
pub fn sample_bilinear(img: &GrayImage, uv: Vec2) -> f32 {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let x = (uv.x * w as f32 - 0.5).clamp(0.0, (w - 1) as f32);
    let y = (uv.y * h as f32 - 0.5).clamp(0.0, (h - 1) as f32);
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);
    let p = |x: u32, y: u32| img.get_pixel(x, y).0[0] as f32 / 255.0;
    let top = p(x0, y0) * (1.0 - fx) + p(x1, y0) * fx;
    let bottom = p(x0, y1) * (1.0 - fx) + p(x1, y1) * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Build the SDF of `shapes` over `bounds`.  `max_dist` is the largest fade
/// distance (world units) the texture must be able to encode.
pub fn build_region_sdf(
    id: u64,
    shapes: &[Shape],
    bounds: Rect,
    max_dist: Option<f32>,
    params: &SdfParams,
) -> Result<SdfTexture, MaskError> {
    if ![bounds.x, bounds.y, bounds.width, bounds.height].iter().all(|v| v.is_finite()) {
        return Err(MaskError::InvalidBounds(format!("{:?}", bounds)));
    }
    let bx = bounds.x;
    let by = bounds.y;
    let bw = bounds.width.max(MIN_EXTENT);
    let bh = bounds.height.max(MIN_EXTENT);
    let k = params.encode_k;
    let dev_w = params.device_width.max(1.0);
    let dev_h = params.device_height.max(1.0);
    let max_tex = params.max_texture.max(1);

    let mut wpt = (bw / dev_w).max(bh / dev_h);
    if !(wpt.is_finite() && wpt > 0.0) {
        wpt = 1.0;
    }
    let max_sd_texels = 127.0 / k;
    if let Some(d) = max_dist
        && d.is_finite()
        && d > 0.0
    {
        wpt = wpt.max(d / max_sd_texels.max(1e-6));
    }

    let mut w = ((bw / wpt).ceil().max(1.0)) as u32;
    let mut h = ((bh / wpt).ceil().max(1.0)) as u32;
    if w > max_tex || h > max_tex {
        let s = (max_tex as f32 / w as f32).min(max_tex as f32 / h as f32);
        w = ((w as f32 * s).floor() as u32).clamp(1, max_tex);
        h = ((h as f32 * s).floor() as u32).clamp(1, max_tex);
    }

    let pad = params.pad_px.min((w - 1) / 2).min((h - 1) / 2);
    let inner_w = (w - 2 * pad).max(1) as f32;
    let inner_h = (h - 2 * pad).max(1) as f32;
    let wpt = (bw / inner_w).max(bh / inner_h);

    let sx = inner_w / bw;
    let sy = inner_h / bh;
    let to_texel = Affine2::new(sx, 0.0, 0.0, sy, pad as f32 - bx * sx, pad as f32 - by * sy);

    let mut binary = GrayImage::new(w, h);
    raster::rasterize_region(&mut binary, shapes, &to_texel, Tessellation::for_view(&to_texel));
    let pixels = SignedDistanceField::from_mask(&binary).encode(k);

    let u_sx = inner_w / (w as f32 * bw);
    let u_sy = inner_h / (h as f32 * bh);
    let uv_from_world = Affine2::new(
        u_sx,
        0.0,
        0.0,
        u_sy,
        pad as f32 / w as f32 - bx * u_sx,
        pad as f32 / h as f32 - by * u_sy,
    );
    let scale = (255.0 / k) * wpt;

    crate::log_debug!("sdf {}: {}x{} texels, {:.4} world/texel", id, w, h, wpt);

    Ok(SdfTexture {
        id,
        fingerprint: GeometryFingerprint::of(shapes),
        max_dist_world: max_sd_texels * wpt,
        pixels,
        decode: SdfDecode {
            uv_from_world,
            scale,
            offset: -0.5 * scale,
            texel: [1.0 / w as f32, 1.0 / h as f32],
        },
        gpu: None,
    })
}
