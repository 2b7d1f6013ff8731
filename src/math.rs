// ============================================================================
// MATH — 2D vectors, affine transforms and axis-aligned bounds
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::MaskError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    #[inline]
    pub fn distance(self, other: Vec2) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Rotate around `center` by `angle` radians.
    #[inline]
    pub fn rotate_around(self, center: Vec2, angle: f32) -> Vec2 {
        if angle == 0.0 {
            return self;
        }
        let (s, c) = angle.sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Vec2::new(center.x + dx * c - dy * s, center.y + dx * s + dy * c)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// 2D affine transform using the stage-matrix convention:
///
/// ```text
/// x' = a·x + c·y + tx
/// y' = b·x + d·y + ty
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Affine2 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: 0.0, ty: 0.0 };

    pub const fn new(a: f32, b: f32, c: f32, d: f32, tx: f32, ty: f32) -> Self {
        Self { a, b, c, d, tx, ty }
    }

    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    pub const fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Uniform scale + translation, the usual world→view camera.
    pub const fn camera(zoom: f32, tx: f32, ty: f32) -> Self {
        Self::new(zoom, 0.0, 0.0, zoom, tx, ty)
    }

    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Returns the transform that applies `self` first, then `next`.
    pub fn then(&self, next: &Affine2) -> Affine2 {
        Affine2 {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            tx: next.a * self.tx + next.c * self.ty + next.tx,
            ty: next.b * self.tx + next.d * self.ty + next.ty,
        }
    }

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    pub fn invert(&self) -> Option<Affine2> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return None;
        }
        let inv = 1.0 / det;
        Some(Affine2 {
            a: self.d * inv,
            b: -self.b * inv,
            c: -self.c * inv,
            d: self.a * inv,
            tx: (self.c * self.ty - self.d * self.tx) * inv,
            ty: (self.b * self.tx - self.a * self.ty) * inv,
        })
    }

    /// Average length of the two basis vectors.
    pub fn mean_scale(&self) -> f32 {
        0.5 * (self.a.hypot(self.b) + self.c.hypot(self.d))
    }

    /// Column-major 3×3, the layout the effect shaders expect.
    pub fn to_mat3(&self) -> [f32; 9] {
        [self.a, self.b, 0.0, self.c, self.d, 0.0, self.tx, self.ty, 1.0]
    }

    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.tx, self.ty].iter().all(|v| v.is_finite())
    }
}

/// Axis-aligned bounds accumulated from points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds {
        min_x: f32::INFINITY,
        min_y: f32::INFINITY,
        max_x: f32::NEG_INFINITY,
        max_y: f32::NEG_INFINITY,
    };

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec2>) -> Bounds {
        let mut b = Bounds::EMPTY;
        for p in points {
            b.include(*p);
        }
        b
    }

    /// Non-finite points are skipped.
    #[inline]
    pub fn include(&mut self, p: Vec2) {
        if !p.is_finite() {
            return;
        }
        self.min_x = self.min_x.min(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_x = self.max_x.max(p.x);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y].iter().all(|v| v.is_finite())
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(0.5 * (self.min_x + self.max_x), 0.5 * (self.min_y + self.max_y))
    }

    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.min_x, self.min_y),
            Vec2::new(self.max_x, self.min_y),
            Vec2::new(self.max_x, self.max_y),
            Vec2::new(self.min_x, self.max_y),
        ]
    }

    /// Convert to a rectangle, rejecting non-positive extents.
    pub fn to_rect(&self) -> Result<Rect, MaskError> {
        let w = self.width();
        let h = self.height();
        if !self.is_finite() || !(w > 0.0 && h > 0.0) {
            return Err(MaskError::InvalidBounds(format!(
                "{:.3},{:.3} → {:.3},{:.3}",
                self.min_x, self.min_y, self.max_x, self.max_y
            )));
        }
        Ok(Rect { x: self.min_x, y: self.min_y, width: w, height: h })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}

/// Hermite smoothstep between `edge0` and `edge1`.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
pub fn deg_to_rad(deg: f32) -> f32 {
    if deg.is_finite() { deg.to_radians() } else { 0.0 }
}

/// Signed shoelace area of a closed loop.
pub fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0f64;
    for i in 0..n {
        let p = points[i];
        let q = points[(i + 1) % n];
        acc += p.x as f64 * q.y as f64 - q.x as f64 * p.y as f64;
    }
    (0.5 * acc) as f32
}

/// Vertex average, used as the rotation pivot for polygons.
pub fn centroid(points: &[Vec2]) -> Vec2 {
    if points.is_empty() {
        return Vec2::ZERO;
    }
    let (sx, sy) = points.iter().fold((0.0f64, 0.0f64), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
    let n = points.len() as f64;
    Vec2::new((sx / n) as f32, (sy / n) as f32)
}

/// Distance from `p` to the segment `a`–`b`.
#[inline]
pub fn segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    let t = if len2 > 0.0 {
        (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cx = a.x + t * dx;
    let cy = a.y + t * dy;
    (p.x - cx).hypot(p.y - cy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_round_trips_points() {
        let m = Affine2::new(2.0, 0.5, -0.25, 1.5, 10.0, -4.0);
        let inv = m.invert().unwrap();
        let p = Vec2::new(3.0, 7.0);
        let q = inv.apply(m.apply(p));
        assert!((q.x - p.x).abs() < 1e-4 && (q.y - p.y).abs() < 1e-4);
    }

    #[test]
    fn then_applies_left_first() {
        let s = Affine2::scale(2.0, 2.0);
        let t = Affine2::translate(5.0, 0.0);
        let p = s.then(&t).apply(Vec2::new(1.0, 1.0));
        assert_eq!(p, Vec2::new(7.0, 2.0));
    }

    #[test]
    fn singular_transform_has_no_inverse() {
        assert!(Affine2::scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn zero_extent_bounds_are_rejected() {
        let mut b = Bounds::EMPTY;
        b.include(Vec2::new(1.0, 1.0));
        b.include(Vec2::new(1.0, 5.0));
        assert!(matches!(b.to_rect(), Err(MaskError::InvalidBounds(_))));
    }

    #[test]
    fn square_area_is_signed_by_winding() {
        let ccw = [Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0), Vec2::new(2.0, 2.0), Vec2::new(0.0, 2.0)];
        assert_eq!(signed_area(&ccw), 4.0);
        let mut cw = ccw;
        cw.reverse();
        assert_eq!(signed_area(&cw), -4.0);
    }
}
