// ============================================================================
// SDF — exact distance transform and region SDF textures
// ============================================================================

pub mod build;
pub mod edt;

pub use build::{build_region_sdf, SdfDecode, SdfParams, SdfTexture};
pub use edt::SignedDistanceField;
