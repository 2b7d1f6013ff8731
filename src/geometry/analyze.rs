// ============================================================================
// SHAPE ANALYZER — analytic primitive detection and region bounds
// ============================================================================

use std::f32::consts::FRAC_PI_4;

use serde::Serialize;

use super::shape::{Shape, ShapeKind, Tessellation};
use crate::error::MaskError;
use crate::math::{deg_to_rad, signed_area, Affine2, Bounds, Rect, Vec2};

/// Edge uniformity threshold for the ellipse-like emanation test (max/mean).
const EMANATION_EDGE_RATIO: f32 = 1.8;
/// Allowed deviation of area/bbox-area from π/4.
const EMANATION_AREA_TOLERANCE: f32 = 0.012;
const EMANATION_MIN_VERTICES: usize = 6;

/// Shrink applied to camera-aligned bounds on every side (world units).
const ALIGNED_EPS: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalyticMode {
    Box = 1,
    Ellipse = 2,
}

/// A region reducible to one closed-form primitive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticShape {
    pub mode: AnalyticMode,
    pub center: Vec2,
    pub half_extents: Vec2,
    /// Radians.
    pub rotation: f32,
}

/// Returns the analytic primitive for a region with exactly one non-hole
/// shape that is a rectangle, token box, circle, ellipse, or an
/// ellipse-like emanation.  Holes are not considered.
pub fn analyze(shapes: &[Shape]) -> Option<AnalyticShape> {
    let mut solids = shapes.iter().filter(|s| !s.hole && !s.is_empty());
    let only = solids.next()?;
    if solids.next().is_some() {
        return None;
    }
    analytic_from(&only.kind)
}

fn analytic_from(kind: &ShapeKind) -> Option<AnalyticShape> {
    match kind {
        ShapeKind::Rectangle { x, y, width, height, rotation }
        | ShapeKind::Token { x, y, width, height, rotation } => {
            if !(width.is_finite() && height.is_finite()) {
                return None;
            }
            Some(AnalyticShape {
                mode: AnalyticMode::Box,
                center: Vec2::new(x + 0.5 * width, y + 0.5 * height),
                half_extents: Vec2::new(0.5 * width.abs(), 0.5 * height.abs()),
                rotation: deg_to_rad(*rotation),
            })
        }
        ShapeKind::Circle { x, y, radius } => {
            let r = radius.abs();
            Some(AnalyticShape {
                mode: AnalyticMode::Ellipse,
                center: Vec2::new(*x, *y),
                half_extents: Vec2::new(r, r),
                rotation: 0.0,
            })
        }
        ShapeKind::Ellipse { x, y, radius_x, radius_y, rotation } => Some(AnalyticShape {
            mode: AnalyticMode::Ellipse,
            center: Vec2::new(*x, *y),
            half_extents: Vec2::new(radius_x.abs(), radius_y.abs()),
            rotation: deg_to_rad(*rotation),
        }),
        ShapeKind::Emanation { base, polygons, .. } => {
            if polygons.len() > 1 || matches!(**base, ShapeKind::Token { .. }) {
                return None;
            }
            let loops = kind.loops(Tessellation::Fixed(super::shape::BUDGET_SEGMENTS));
            let [outline] = loops.as_slice() else {
                return None;
            };
            let b = Bounds::from_points(outline);
            let (bw, bh) = (b.width(), b.height());
            if !(b.is_finite() && bw > 0.0 && bh > 0.0) || !looks_ellipse_like(outline, bw * bh) {
                return None;
            }
            Some(AnalyticShape {
                mode: AnalyticMode::Ellipse,
                center: b.center(),
                half_extents: Vec2::new(0.5 * bw, 0.5 * bh),
                rotation: 0.0,
            })
        }
        _ => None,
    }
}

/// Empirical test: near-uniform edge lengths and an area ratio close to π/4.
fn looks_ellipse_like(outline: &[Vec2], bbox_area: f32) -> bool {
    let n = outline.len();
    if n < EMANATION_MIN_VERTICES {
        return false;
    }
    let mut max_len = 0.0f32;
    let mut sum_len = 0.0f32;
    let mut count = 0usize;
    for i in 0..n {
        let len = outline[i].distance(outline[(i + 1) % n]);
        if !(len.is_finite() && len > 0.0) {
            continue;
        }
        max_len = max_len.max(len);
        sum_len += len;
        count += 1;
    }
    if count < EMANATION_MIN_VERTICES {
        return false;
    }
    let mean = sum_len / count as f32;
    let edge_uniform = max_len / mean < EMANATION_EDGE_RATIO;
    let ratio = signed_area(outline).abs() / bbox_area;
    let ratio_ok = !ratio.is_finite() || (ratio - FRAC_PI_4).abs() < EMANATION_AREA_TOLERANCE;
    edge_uniform && ratio_ok
}

/// More than one non-hole, non-empty shape.
pub fn has_multiple_non_hole_shapes(shapes: &[Shape]) -> bool {
    shapes.iter().filter(|s| !s.hole && !s.is_empty()).nth(1).is_some()
}

/// Regions with no non-empty solid produce no mask.
pub fn is_degenerate(shapes: &[Shape]) -> bool {
    !shapes.iter().any(|s| !s.hole && !s.is_empty())
}

/// World AABB of the non-hole shapes.
pub fn region_world_bounds(shapes: &[Shape]) -> Option<Bounds> {
    let b = shapes
        .iter()
        .filter(|s| !s.hole)
        .fold(Bounds::EMPTY, |acc, s| acc.union(&s.kind.bounds()));
    b.is_finite().then_some(b)
}

/// World AABB of the non-hole outlines as seen through `snapped`: the
/// outlines are boxed in CSS space and the box is mapped back to world.
pub fn region_world_bounds_aligned(shapes: &[Shape], snapped: &Affine2) -> Result<Bounds, MaskError> {
    let inv = snapped
        .invert()
        .ok_or_else(|| MaskError::InvalidBounds("view transform is not invertible".to_string()))?;
    let tess = Tessellation::for_view(snapped);
    let mut css = Bounds::EMPTY;
    for s in shapes.iter().filter(|s| !s.hole) {
        for l in s.kind.loops(tess) {
            for p in l {
                css.include(snapped.apply(p));
            }
        }
    }
    if !css.is_finite() {
        return Err(MaskError::EmptyGeometry);
    }
    let world = Bounds::from_points(&css.corners().map(|c| inv.apply(c)));
    Ok(Bounds {
        min_x: world.min_x + ALIGNED_EPS,
        min_y: world.min_y + ALIGNED_EPS,
        max_x: world.max_x - ALIGNED_EPS,
        max_y: world.max_y - ALIGNED_EPS,
    })
}

/// Region rectangle for SDF construction: camera-aligned bounds when valid,
/// raw shape bounds otherwise.
pub fn region_rect(shapes: &[Shape], snapped: &Affine2) -> Result<Rect, MaskError> {
    match region_world_bounds_aligned(shapes, snapped).and_then(|b| b.to_rect()) {
        Ok(r) => Ok(r),
        Err(aligned_err) => {
            crate::log_debug!("aligned bounds rejected ({}); using raw shape bounds", aligned_err);
            region_world_bounds(shapes).ok_or(MaskError::EmptyGeometry)?.to_rect()
        }
    }
}

/// Reference interior depth of a region: the smallest per-shape inradius,
/// but never less than 1/`cap_ratio` of the largest one.
pub fn region_inradius(shapes: &[Shape], cap_ratio: f32) -> f32 {
    let mut min_r = f32::INFINITY;
    let mut max_r = 0.0f32;
    for s in shapes.iter().filter(|s| !s.hole && !s.is_empty()) {
        let r = s.kind.inradius();
        if r.is_finite() && r > 0.0 {
            min_r = min_r.min(r);
            max_r = max_r.max(r);
        }
    }
    if min_r.is_finite() {
        return max_r.min(min_r * cap_ratio).max(1e-6);
    }
    match region_world_bounds(shapes) {
        Some(b) => (0.25 * b.width().max(1e-6).min(b.height().max(1e-6))).max(1e-6),
        None => 1e-6,
    }
}
