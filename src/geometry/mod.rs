// ============================================================================
// GEOMETRY — region shapes, analytic detection, edge budgets, fingerprints
// ============================================================================
//
//   shape.rs       — closed shape union, polygonization, area and inradius
//   analyze.rs     — analytic box/ellipse detection and region bounds
//   edges.rs       — fixed-capacity edge lists for the polygon fade path
//   fingerprint.rs — canonical geometry key for the SDF cache
// ============================================================================

pub mod analyze;
pub mod edges;
pub mod fingerprint;
pub mod shape;

pub use analyze::{AnalyticMode, AnalyticShape};
pub use edges::Edge;
pub use fingerprint::GeometryFingerprint;
pub use shape::{Shape, ShapeKind, Tessellation};
