// ============================================================================
// FILTER — binding region masks into effect uniforms, plus visibility gates
// ============================================================================

pub mod binder;
pub mod fade;
pub mod gate;
pub mod options;

pub use binder::{select_mode, BoundFilter, FilterUniforms, MaskMode, MaskSource, RegionBinding};
pub use gate::{ElevationWindow, GateConfig, GateContext, GateEvent, GateMode, GateState, RegionGate, Viewer};
pub use options::{FilterInstance, FilterOptions};
