// ============================================================================
// SHAPES — closed set of region shape kinds, polygonized on demand
// ============================================================================

use std::f32::consts::{PI, TAU};

use serde::{Deserialize, Deserializer, Serialize};

use crate::math::{centroid, deg_to_rad, signed_area, Affine2, Bounds, Vec2};

/// Segment count used for curves when building polygon edge budgets.
pub const BUDGET_SEGMENTS: usize = 48;

/// How finely curved outlines are sampled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tessellation {
    Fixed(usize),
    /// Segment count follows the on-screen perimeter, clamped to 64..=512.
    Adaptive { scale_x: f32, scale_y: f32 },
}

impl Tessellation {
    pub fn for_view(view: &Affine2) -> Self {
        Tessellation::Adaptive {
            scale_x: view.a.hypot(view.b),
            scale_y: view.c.hypot(view.d),
        }
    }

    pub fn ellipse_segments(&self, rx: f32, ry: f32) -> usize {
        match *self {
            Tessellation::Fixed(n) => n.max(8),
            Tessellation::Adaptive { scale_x, scale_y } => {
                let a = (rx * scale_x).max(1.0);
                let b = (ry * scale_y).max(1.0);
                // Ramanujan's perimeter approximation.
                let p = PI * (3.0 * (a + b) - ((3.0 * a + b) * (a + 3.0 * b)).sqrt());
                let steps = (p / 2.0).clamp(64.0, 512.0).ceil();
                if steps.is_finite() { steps as usize } else { 64 }
            }
        }
    }
}

/// One region shape.  Holes subtract from the union of the region's solids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    #[serde(default)]
    pub hole: bool,
    #[serde(flatten)]
    pub kind: ShapeKind,
}

impl Shape {
    pub fn solid(kind: ShapeKind) -> Self {
        Self { hole: false, kind }
    }

    pub fn hole(kind: ShapeKind) -> Self {
        Self { hole: true, kind }
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ShapeKind {
    /// `x`,`y` is the top-left corner; rotation (degrees) is about the centre.
    Rectangle {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        #[serde(default)]
        rotation: f32,
    },
    Circle {
        x: f32,
        y: f32,
        radius: f32,
    },
    Ellipse {
        x: f32,
        y: f32,
        radius_x: f32,
        radius_y: f32,
        #[serde(default)]
        rotation: f32,
    },
    /// Rotation (degrees) is about the vertex centroid.
    Polygon {
        #[serde(deserialize_with = "de_points")]
        points: Vec<Vec2>,
        #[serde(default)]
        rotation: f32,
    },
    Ring {
        x: f32,
        y: f32,
        inner_radius: f32,
        outer_radius: f32,
    },
    Line {
        from: Vec2,
        to: Vec2,
        width: f32,
    },
    /// Circular sector of `angle` degrees opening towards `direction` degrees.
    Cone {
        x: f32,
        y: f32,
        radius: f32,
        angle: f32,
        #[serde(default)]
        direction: f32,
    },
    /// Area within `distance` of `base`.  Host-supplied `polygons` take
    /// precedence over the generated outline.
    Emanation {
        base: Box<ShapeKind>,
        distance: f32,
        #[serde(default, deserialize_with = "de_loops")]
        polygons: Vec<Vec<Vec2>>,
    },
    Token {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        #[serde(default)]
        rotation: f32,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PointList {
    Objects(Vec<Vec2>),
    Flat(Vec<f32>),
}

impl PointList {
    fn into_points(self) -> Vec<Vec2> {
        match self {
            PointList::Objects(v) => v,
            PointList::Flat(flat) => flat.chunks_exact(2).map(|c| Vec2::new(c[0], c[1])).collect(),
        }
    }
}

/// Points are accepted either as `[{x,y},..]` or flat `[x0,y0,x1,y1,..]`.
fn de_points<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec2>, D::Error> {
    Ok(PointList::deserialize(d)?.into_points())
}

fn de_loops<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<Vec2>>, D::Error> {
    let lists = Vec::<PointList>::deserialize(d)?;
    Ok(lists.into_iter().map(PointList::into_points).collect())
}

impl ShapeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ShapeKind::Rectangle { .. } => "rectangle",
            ShapeKind::Circle { .. } => "circle",
            ShapeKind::Ellipse { .. } => "ellipse",
            ShapeKind::Polygon { .. } => "polygon",
            ShapeKind::Ring { .. } => "ring",
            ShapeKind::Line { .. } => "line",
            ShapeKind::Cone { .. } => "cone",
            ShapeKind::Emanation { .. } => "emanation",
            ShapeKind::Token { .. } => "token",
        }
    }

    /// Closed outline loops.  A ring yields its outer and inner circle; the
    /// loops of one shape are always filled with the even-odd rule.
    pub fn loops(&self, tess: Tessellation) -> Vec<Vec<Vec2>> {
        let mut out = Vec::new();
        match self {
            ShapeKind::Rectangle { x, y, width, height, rotation }
            | ShapeKind::Token { x, y, width, height, rotation } => {
                out.push(rect_loop(*x, *y, *width, *height, deg_to_rad(*rotation)));
            }
            ShapeKind::Circle { x, y, radius } => {
                let r = radius.max(0.0);
                out.push(ellipse_loop(Vec2::new(*x, *y), r, r, 0.0, tess.ellipse_segments(r, r)));
            }
            ShapeKind::Ellipse { x, y, radius_x, radius_y, rotation } => {
                let (rx, ry) = (radius_x.max(0.0), radius_y.max(0.0));
                out.push(ellipse_loop(
                    Vec2::new(*x, *y),
                    rx,
                    ry,
                    deg_to_rad(*rotation),
                    tess.ellipse_segments(rx, ry),
                ));
            }
            ShapeKind::Polygon { points, rotation } => {
                let angle = deg_to_rad(*rotation);
                let pivot = centroid(points);
                let rotated: Vec<Vec2> = points.iter().map(|p| p.rotate_around(pivot, angle)).collect();
                if let Some(poly) = normalize_loop(rotated) {
                    out.push(poly);
                }
            }
            ShapeKind::Ring { x, y, inner_radius, outer_radius } => {
                let c = Vec2::new(*x, *y);
                let outer = outer_radius.max(0.0);
                let inner = inner_radius.max(0.0).min(outer);
                out.push(ellipse_loop(c, outer, outer, 0.0, tess.ellipse_segments(outer, outer)));
                if inner > 0.0 {
                    out.push(ellipse_loop(c, inner, inner, 0.0, tess.ellipse_segments(inner, inner)));
                }
            }
            ShapeKind::Line { from, to, width } => {
                if let Some(poly) = line_loop(*from, *to, *width) {
                    out.push(poly);
                }
            }
            ShapeKind::Cone { x, y, radius, angle, direction } => {
                out.push(cone_loop(Vec2::new(*x, *y), radius.max(0.0), *angle, *direction, tess));
            }
            ShapeKind::Emanation { base, distance, polygons } => {
                if polygons.is_empty() {
                    out.extend(emanation_outline(base, distance.max(0.0), tess));
                } else {
                    out.extend(polygons.iter().cloned().filter_map(normalize_loop));
                }
            }
        }
        out.retain(|l| l.len() >= 3 && l.iter().all(|p| p.is_finite()));
        out
    }

    pub fn bounds(&self) -> Bounds {
        let mut b = Bounds::EMPTY;
        for l in self.loops(Tessellation::Fixed(BUDGET_SEGMENTS)) {
            for p in l {
                b.include(p);
            }
        }
        b
    }

    /// Filled area under the even-odd rule.
    pub fn area(&self) -> f32 {
        match self {
            ShapeKind::Rectangle { width, height, .. } | ShapeKind::Token { width, height, .. } => {
                (width * height).abs()
            }
            ShapeKind::Circle { radius, .. } => PI * radius.max(0.0).powi(2),
            ShapeKind::Ellipse { radius_x, radius_y, .. } => PI * radius_x.max(0.0) * radius_y.max(0.0),
            ShapeKind::Ring { inner_radius, outer_radius, .. } => {
                let outer = outer_radius.max(0.0);
                let inner = inner_radius.max(0.0).min(outer);
                PI * (outer * outer - inner * inner)
            }
            _ => self
                .loops(Tessellation::Fixed(BUDGET_SEGMENTS))
                .iter()
                .map(|l| signed_area(l).abs())
                .sum(),
        }
    }

    /// Zero-area (or non-finite) shapes are ignored by the multi-shape
    /// test, the edge budgeter and inradius estimation.
    pub fn is_empty(&self) -> bool {
        let a = self.area();
        !(a.is_finite() && a > 1e-9)
    }

    /// Conservative interior depth used to scale percentage fades.
    pub fn inradius(&self) -> f32 {
        let r = match self {
            ShapeKind::Circle { radius, .. } => radius.max(0.0),
            ShapeKind::Ellipse { radius_x, radius_y, .. } => radius_x.abs().min(radius_y.abs()),
            ShapeKind::Rectangle { width, height, .. } | ShapeKind::Token { width, height, .. } => {
                0.5 * width.abs().min(height.abs())
            }
            ShapeKind::Ring { inner_radius, outer_radius, .. } => {
                (0.5 * (outer_radius.max(0.0) - inner_radius.max(0.0))).max(0.0)
            }
            ShapeKind::Line { width, .. } => 0.5 * width.max(0.0),
            ShapeKind::Cone { radius, angle, .. } => {
                let theta = deg_to_rad(angle.max(0.0));
                let s = (0.5 * theta).sin();
                if s > 0.0 { radius.max(0.0) * s / (1.0 + s) } else { 0.0 }
            }
            ShapeKind::Emanation { base, distance, .. } => {
                let r0 = base.inradius();
                if r0 > 0.0 { r0 + distance.max(0.0) } else { quarter_min_side(&self.bounds()) }
            }
            ShapeKind::Polygon { .. } => quarter_min_side(&self.bounds()),
        };
        if r.is_finite() { r } else { 0.0 }
    }
}

fn quarter_min_side(b: &Bounds) -> f32 {
    if !b.is_finite() {
        return 0.0;
    }
    0.25 * b.width().max(0.0).min(b.height().max(0.0))
}

/// Drops a repeated closing vertex; loops with fewer than 3 vertices vanish.
pub fn normalize_loop(mut pts: Vec<Vec2>) -> Option<Vec<Vec2>> {
    if pts.len() >= 2 && pts.first() == pts.last() {
        pts.pop();
    }
    (pts.len() >= 3).then_some(pts)
}

pub fn rect_loop(x: f32, y: f32, w: f32, h: f32, rot: f32) -> Vec<Vec2> {
    let corners = [
        Vec2::new(x, y),
        Vec2::new(x + w, y),
        Vec2::new(x + w, y + h),
        Vec2::new(x, y + h),
    ];
    if rot == 0.0 {
        return corners.to_vec();
    }
    let c = Vec2::new(x + 0.5 * w, y + 0.5 * h);
    corners.iter().map(|p| p.rotate_around(c, rot)).collect()
}

pub fn ellipse_loop(c: Vec2, rx: f32, ry: f32, rot: f32, segments: usize) -> Vec<Vec2> {
    let n = segments.max(8);
    (0..n)
        .map(|i| {
            let a = i as f32 / n as f32 * TAU;
            Vec2::new(c.x + rx * a.cos(), c.y + ry * a.sin()).rotate_around(c, rot)
        })
        .collect()
}

fn line_loop(from: Vec2, to: Vec2, width: f32) -> Option<Vec<Vec2>> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let len = dx.hypot(dy);
    if !(len > 0.0) || !(width > 0.0) {
        return None;
    }
    let nx = -dy / len * 0.5 * width;
    let ny = dx / len * 0.5 * width;
    Some(vec![
        Vec2::new(from.x + nx, from.y + ny),
        Vec2::new(to.x + nx, to.y + ny),
        Vec2::new(to.x - nx, to.y - ny),
        Vec2::new(from.x - nx, from.y - ny),
    ])
}

fn cone_loop(c: Vec2, radius: f32, angle_deg: f32, direction_deg: f32, tess: Tessellation) -> Vec<Vec2> {
    let full = tess.ellipse_segments(radius, radius);
    if angle_deg >= 360.0 {
        return ellipse_loop(c, radius, radius, 0.0, full);
    }
    let sweep = deg_to_rad(angle_deg.max(0.0));
    let start = deg_to_rad(direction_deg) - 0.5 * sweep;
    let n = ((full as f32 * angle_deg.max(0.0) / 360.0).ceil() as usize).max(2);
    let mut pts = Vec::with_capacity(n + 2);
    pts.push(c);
    for i in 0..=n {
        let a = start + sweep * i as f32 / n as f32;
        pts.push(Vec2::new(c.x + radius * a.cos(), c.y + radius * a.sin()));
    }
    pts
}

/// Outline generated by growing `base` by `distance`.  Circles and ellipses
/// grow their radii, boxes become rounded boxes; any other base is grown
/// from its bounding box.
fn emanation_outline(base: &ShapeKind, distance: f32, tess: Tessellation) -> Vec<Vec<Vec2>> {
    match base {
        ShapeKind::Circle { x, y, radius } => {
            let r = radius.max(0.0) + distance;
            vec![ellipse_loop(Vec2::new(*x, *y), r, r, 0.0, tess.ellipse_segments(r, r))]
        }
        ShapeKind::Ellipse { x, y, radius_x, radius_y, rotation } => {
            let rx = radius_x.max(0.0) + distance;
            let ry = radius_y.max(0.0) + distance;
            vec![ellipse_loop(
                Vec2::new(*x, *y),
                rx,
                ry,
                deg_to_rad(*rotation),
                tess.ellipse_segments(rx, ry),
            )]
        }
        ShapeKind::Rectangle { x, y, width, height, rotation }
        | ShapeKind::Token { x, y, width, height, rotation } => {
            vec![rounded_rect_loop(*x, *y, *width, *height, distance, deg_to_rad(*rotation), tess)]
        }
        other => {
            let b = other.bounds();
            if !b.is_finite() {
                return Vec::new();
            }
            vec![rounded_rect_loop(b.min_x, b.min_y, b.width(), b.height(), distance, 0.0, tess)]
        }
    }
}

fn rounded_rect_loop(x: f32, y: f32, w: f32, h: f32, r: f32, rot: f32, tess: Tessellation) -> Vec<Vec2> {
    if !(r > 0.0) {
        return rect_loop(x, y, w, h, rot);
    }
    let per_corner = (tess.ellipse_segments(r, r) / 4).max(2);
    let corners = [
        (Vec2::new(x + w, y + h), 0.0f32),
        (Vec2::new(x, y + h), 0.5 * PI),
        (Vec2::new(x, y), PI),
        (Vec2::new(x + w, y), 1.5 * PI),
    ];
    let c = Vec2::new(x + 0.5 * w, y + 0.5 * h);
    let mut pts = Vec::with_capacity(4 * (per_corner + 1));
    for (corner, a0) in corners {
        for i in 0..=per_corner {
            let a = a0 + 0.5 * PI * i as f32 / per_corner as f32;
            pts.push(Vec2::new(corner.x + r * a.cos(), corner.y + r * a.sin()).rotate_around(c, rot));
        }
    }
    pts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shapes_parse_from_tagged_json() {
        let s: Shape = serde_json::from_str(
            r#"{"type":"ellipse","hole":true,"x":1,"y":2,"radiusX":10,"radiusY":5}"#,
        )
        .unwrap();
        assert!(s.hole);
        assert!(matches!(s.kind, ShapeKind::Ellipse { radius_x, .. } if radius_x == 10.0));

        let p: Shape = serde_json::from_str(r#"{"type":"polygon","points":[0,0,4,0,4,4]}"#).unwrap();
        assert!(!p.hole);
        assert!(matches!(&p.kind, ShapeKind::Polygon { points, .. } if points.len() == 3));
    }

    #[test]
    fn ring_polygonizes_to_two_loops() {
        let ring = ShapeKind::Ring { x: 0.0, y: 0.0, inner_radius: 5.0, outer_radius: 10.0 };
        assert_eq!(ring.loops(Tessellation::Fixed(32)).len(), 2);
        assert!((ring.inradius() - 2.5).abs() < 1e-6);
    }

    #[test]
    fn degenerate_shapes_are_empty() {
        assert!(ShapeKind::Rectangle { x: 0.0, y: 0.0, width: 0.0, height: 10.0, rotation: 0.0 }.is_empty());
        assert!(ShapeKind::Circle { x: 0.0, y: 0.0, radius: f32::NAN }.is_empty());
        let collinear = ShapeKind::Polygon {
            points: vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0)],
            rotation: 0.0,
        };
        assert!(collinear.is_empty());
        assert!(!ShapeKind::Circle { x: 0.0, y: 0.0, radius: 1.0 }.is_empty());
    }

    #[test]
    fn closing_vertex_is_dropped() {
        let poly = ShapeKind::Polygon {
            points: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(4.0, 0.0),
                Vec2::new(4.0, 4.0),
                Vec2::new(0.0, 0.0),
            ],
            rotation: 0.0,
        };
        assert_eq!(poly.loops(Tessellation::Fixed(48))[0].len(), 3);
    }

    #[test]
    fn cone_inradius_matches_inscribed_circle() {
        let cone = ShapeKind::Cone { x: 0.0, y: 0.0, radius: 30.0, angle: 60.0, direction: 0.0 };
        // sin(30°) = 0.5  →  30 * 0.5 / 1.5
        assert!((cone.inradius() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn adaptive_tessellation_is_clamped() {
        let t = Tessellation::Adaptive { scale_x: 1.0, scale_y: 1.0 };
        assert_eq!(t.ellipse_segments(1.0, 1.0), 64);
        assert_eq!(t.ellipse_segments(10_000.0, 10_000.0), 512);
    }
}
