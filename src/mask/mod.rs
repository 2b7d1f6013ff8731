// ============================================================================
// MASK — per-view region masks, token cutouts and the SDF cache
// ============================================================================

pub mod cache;
pub mod cutout;
pub mod renderer;

pub use cache::SdfCache;
pub use cutout::{CutoutComposer, ForegroundObject, Silhouette};
pub use renderer::{build_region_mask, filter_resolution, mask_resolution, AlignedView, ViewKey, ViewState};
