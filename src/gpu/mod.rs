// ============================================================================
// GPU MODULE — render targets, pooling and the wgpu mirror of mask rasters
// ============================================================================
//
// Architecture:
//   context.rs  — wgpu Device/Queue init and the engine's RenderDevice handle
//   target.rs   — RenderTarget: CPU alpha raster + optional GPU texture
//   pool.rs     — render-target recycling by (width, height, resolution)
//   texture.rs  — MaskTexture (R8Unorm) upload helpers
//   uniforms.rs — RegionFadeUniforms, the Pod uniform block
//   shaders.rs  — WGSL source for the region fade shader
//   fade.rs     — offscreen fade pass with readback
// ============================================================================

pub mod context;
pub mod fade;
pub mod pool;
pub mod shaders;
pub mod target;
pub mod texture;
pub mod uniforms;

pub use context::{GpuContext, RenderDevice};
pub use fade::FadeRenderer;
pub use pool::{PoolStats, RenderTargetPool};
pub use target::RenderTarget;
pub use texture::MaskTexture;
pub use uniforms::RegionFadeUniforms;
