// ============================================================================
// FADE EVALUATOR — CPU reference for the region-fade shader
// ============================================================================
//
// Mirrors `fs_region_fade`: the same signed distance per mask mode and the
// same ramp, so previews and tests see what the GPU filter would produce.

use image::GrayImage;
use rayon::prelude::*;

use super::binder::{FilterUniforms, MaskMode};
use crate::geometry::analyze::{AnalyticMode, AnalyticShape};
use crate::gpu::target::RenderTarget;
use crate::math::{segment_distance, smoothstep, Vec2};

fn to_local(a: &AnalyticShape, world: Vec2) -> Vec2 {
    let dx = world.x - a.center.x;
    let dy = world.y - a.center.y;
    let (s, c) = a.rotation.sin_cos();
    Vec2::new(dx * c + dy * s, -dx * s + dy * c)
}

/// Positive inside, negative outside.
pub fn analytic_distance(a: &AnalyticShape, world: Vec2) -> f32 {
    let p = to_local(a, world);
    match a.mode {
        AnalyticMode::Box => (a.half_extents.x - p.x.abs()).min(a.half_extents.y - p.y.abs()),
        AnalyticMode::Ellipse => {
            let rx = a.half_extents.x.max(1e-6);
            let ry = a.half_extents.y.max(1e-6);
            if p.x * p.x + p.y * p.y < 1e-12 {
                return rx.min(ry);
            }
            let k0 = (p.x / rx).hypot(p.y / ry);
            let k1 = (p.x / (rx * rx)).hypot(p.y / (ry * ry));
            -k0 * (k0 - 1.0) / k1
        }
    }
}

/// Even-odd inside test plus nearest-edge distance.
pub fn edge_list_distance(edges: &[[f32; 4]], world: Vec2) -> Option<f32> {
    if edges.is_empty() {
        return None;
    }
    let mut inside = false;
    let mut d = f32::INFINITY;
    for e in edges {
        let a = Vec2::new(e[0], e[1]);
        let b = Vec2::new(e[2], e[3]);
        if (a.y > world.y) != (b.y > world.y) {
            let x = a.x + (world.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if world.x < x {
                inside = !inside;
            }
        }
        d = d.min(segment_distance(world, a, b));
    }
    Some(if inside { d } else { -d })
}

/// Signed distance under the bound mode, `None` when the mode has none.
pub fn signed_distance(u: &FilterUniforms, world: Vec2) -> Option<f32> {
    match &u.mode {
        MaskMode::MaskOnly => None,
        MaskMode::Analytic(a) => Some(analytic_distance(a, world)),
        MaskMode::EdgeList => edge_list_distance(&u.edges, world),
        MaskMode::Sdf => u.sdf.as_ref().map(|sdf| sdf.sample(world)),
    }
}

/// Ramp applied to a signed distance.
pub fn fade(u: &FilterUniforms, sd: f32) -> f32 {
    let width = u.fade_width();
    if width > 0.0 {
        (sd / width).clamp(0.0, 1.0)
    } else {
        smoothstep(-u.smooth_k_world, u.smooth_k_world, sd)
    }
}

/// Fade factor at a world point (1 when the mode has no distance).
pub fn coverage(u: &FilterUniforms, world: Vec2) -> f32 {
    signed_distance(u, world).map_or(1.0, |sd| fade(u, sd))
}

/// Mask × fade × strength for every texel of `mask`, as the filter would
/// output it at the mask's resolution.
pub fn preview(mask: &RenderTarget, u: &FilterUniforms) -> GrayImage {
    let (w, h) = mask.pixels.dimensions();
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 || u.has_mask < 0.5 || u.mask_ready < 0.5 {
        return out;
    }
    let css_per_px_x = mask.width as f32 / w as f32;
    let css_per_px_y = mask.height as f32 / h as f32;
    let src = mask.pixels.as_raw();
    let data: &mut [u8] = &mut out;
    data.par_chunks_mut(w as usize).enumerate().for_each(|(y, row)| {
        let cy = (y as f32 + 0.5) * css_per_px_y;
        for (x, px) in row.iter_mut().enumerate() {
            let m = src[y * w as usize + x] as f32 / 255.0;
            if m <= 0.0 {
                continue;
            }
            let css = Vec2::new((x as f32 + 0.5) * css_per_px_x, cy);
            let f = coverage(u, u.css_to_world.apply(css));
            *px = (m * f * u.strength * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::binder::MaskSource;
    use crate::math::Affine2;
    use std::sync::Arc;

    fn uniforms(mode: MaskMode, fade_world: f32, use_pct: bool) -> FilterUniforms {
        FilterUniforms {
            mode,
            css_to_world: Affine2::IDENTITY,
            view_size: [10.0, 10.0],
            device_to_css: 1.0,
            resolution: 1.0,
            fade_pct: 0.5,
            fade_world,
            use_pct,
            smooth_k_world: 1.0,
            inside_max: 10.0,
            edges: Arc::from(Vec::new()),
            sdf: None,
            mask: MaskSource::Base,
            has_mask: 1.0,
            mask_ready: 1.0,
            strength: 1.0,
        }
    }

    fn shape(mode: AnalyticMode, hx: f32, hy: f32, rotation: f32) -> AnalyticShape {
        AnalyticShape { mode, center: Vec2::new(0.0, 0.0), half_extents: Vec2::new(hx, hy), rotation }
    }

    #[test]
    fn box_distance_respects_rotation() {
        let b = shape(AnalyticMode::Box, 50.0, 25.0, 0.0);
        assert_eq!(analytic_distance(&b, Vec2::new(0.0, 0.0)), 25.0);
        assert_eq!(analytic_distance(&b, Vec2::new(45.0, 0.0)), 5.0);
        assert_eq!(analytic_distance(&b, Vec2::new(0.0, 30.0)), -5.0);
        let r = shape(AnalyticMode::Box, 50.0, 25.0, std::f32::consts::FRAC_PI_2);
        assert!((analytic_distance(&r, Vec2::new(0.0, 45.0)) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn circle_distance_is_exact() {
        let c = shape(AnalyticMode::Ellipse, 40.0, 40.0, 0.0);
        assert_eq!(analytic_distance(&c, Vec2::new(0.0, 0.0)), 40.0);
        assert!((analytic_distance(&c, Vec2::new(20.0, 0.0)) - 20.0).abs() < 1e-4);
        assert!((analytic_distance(&c, Vec2::new(0.0, 50.0)) + 10.0).abs() < 1e-4);
    }

    #[test]
    fn edge_list_square() {
        let edges = [
            [0.0, 0.0, 10.0, 0.0],
            [10.0, 0.0, 10.0, 10.0],
            [10.0, 10.0, 0.0, 10.0],
            [0.0, 10.0, 0.0, 0.0],
        ];
        assert_eq!(edge_list_distance(&edges, Vec2::new(5.0, 3.0)), Some(3.0));
        assert_eq!(edge_list_distance(&edges, Vec2::new(13.0, 5.0)), Some(-3.0));
        assert_eq!(edge_list_distance(&[], Vec2::new(5.0, 5.0)), None);
    }

    #[test]
    fn ramp_and_smoothing() {
        let c = MaskMode::Analytic(shape(AnalyticMode::Ellipse, 40.0, 40.0, 0.0));
        let u = uniforms(c, 40.0, false);
        assert!((coverage(&u, Vec2::new(20.0, 0.0)) - 0.5).abs() < 1e-3);
        assert_eq!(coverage(&u, Vec2::new(60.0, 0.0)), 0.0);

        let pct = uniforms(c, 0.0, true);
        // width = 0.5 · 10
        assert_eq!(coverage(&pct, Vec2::new(30.0, 0.0)), 1.0);

        let soft = uniforms(c, 0.0, false);
        assert!((coverage(&soft, Vec2::new(40.0, 0.0)) - 0.5).abs() < 1e-3);
        assert_eq!(coverage(&uniforms(MaskMode::MaskOnly, 0.0, false), Vec2::new(1e3, 0.0)), 1.0);
    }

    #[test]
    fn preview_multiplies_mask_and_strength() {
        let mut rt = RenderTarget::new(1, 4, 4, 1.0);
        rt.pixels.fill(255);
        let mut u = uniforms(MaskMode::MaskOnly, 0.0, false);
        u.strength = 0.5;
        let img = preview(&rt, &u);
        assert!(img.pixels().all(|p| p.0[0] == 128));
        u.mask_ready = 0.0;
        assert!(preview(&rt, &u).pixels().all(|p| p.0[0] == 0));
    }
}
