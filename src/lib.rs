// ============================================================================
// regionmask — camera-aligned region masks with analytic / polygon / SDF
// edge fades, foreground cutouts and visibility gating
// ============================================================================
//
// Layout:
//   geometry/  — shapes, analytic detection, edge budgeting, fingerprints
//   raster.rs  — CPU scanline fill used by every mask pass
//   sdf/       — signed distance transform and the encoded SDF texture
//   gpu/       — render targets, pooling, wgpu mirror and fade shader
//   mask/      — aligned view, base mask, token cutout, SDF cache
//   filter/    — filter options, mode selection, uniforms, gate machine
//   scheduler  — next-frame coalesced refresh tasks
//   engine.rs  — the region mask lifecycle tying it all together
// ============================================================================

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod engine;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod gpu;
pub mod mask;
pub mod math;
pub mod raster;
pub mod scheduler;
pub mod sdf;
pub mod settings;

pub use engine::{MaskEngine, MaskEntry, Region, Scene};
pub use error::MaskError;
pub use filter::{FilterInstance, FilterOptions, GateMode, MaskMode};
pub use gpu::RenderDevice;
pub use settings::EngineSettings;
