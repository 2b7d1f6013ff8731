// ============================================================================
// GPU CONTEXT — wgpu device/queue plus the engine's render device handle
// ============================================================================

use std::sync::Arc;

use crate::settings::EngineSettings;
use crate::{log_info, log_warn};

/// Core wgpu resources.  Created once per engine; when creation fails the
/// engine keeps rasterizing on the CPU and simply skips the GPU mirror.
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Maximum texture dimension supported by this device.
    pub max_texture_dim: u32,
}

impl GpuContext {
    /// Hardware adapter first, then the software rasterizer
    /// (`force_fallback_adapter`).  Blocks on the async wgpu setup.
    pub fn new(preferred_gpu: &str) -> Option<Self> {
        if let Some(ctx) = pollster::block_on(Self::new_async(preferred_gpu, false)) {
            return Some(ctx);
        }
        log_warn!("GPU: hardware adapter unavailable, trying software fallback");
        pollster::block_on(Self::new_async(preferred_gpu, true))
    }

    async fn new_async(preferred_gpu: &str, force_fallback: bool) -> Option<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let power = match preferred_gpu.to_lowercase().as_str() {
            "low power" | "integrated" => wgpu::PowerPreference::LowPower,
            _ => wgpu::PowerPreference::HighPerformance,
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power,
                compatible_surface: None,
                force_fallback_adapter: force_fallback,
            })
            .await?;

        let adapter_name = adapter.get_info().name.clone();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("regionmask GPU"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        max_storage_buffer_binding_size: limits.max_storage_buffer_binding_size,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await
            .ok()?;

        Some(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name,
            max_texture_dim: limits.max_texture_dimension_2d,
        })
    }

    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// What the engine renders with: a texture size limit and, optionally, a
/// GPU to mirror finished rasters onto.
#[derive(Clone)]
pub struct RenderDevice {
    max_texture_dim: u32,
    gpu: Option<GpuContext>,
}

impl RenderDevice {
    /// CPU-only device with the given texture limit.
    pub fn headless(max_texture_dim: u32) -> Self {
        Self { max_texture_dim: max_texture_dim.max(1), gpu: None }
    }

    pub fn from_gpu(ctx: GpuContext) -> Self {
        Self { max_texture_dim: ctx.max_texture_dim.max(1), gpu: Some(ctx) }
    }

    /// GPU-backed when enabled in settings and an adapter is found,
    /// otherwise headless with the configured fallback limit.
    pub fn detect(settings: &EngineSettings) -> Self {
        if settings.gpu_acceleration {
            if let Some(ctx) = GpuContext::new(&settings.preferred_gpu) {
                log_info!("GPU: using {} (max texture {})", ctx.adapter_name, ctx.max_texture_dim);
                return Self::from_gpu(ctx);
            }
            log_warn!("GPU: no adapter available, masks stay CPU-only");
        }
        Self::headless(settings.fallback_max_texture)
    }

    pub fn max_texture_dim(&self) -> u32 {
        self.max_texture_dim
    }

    pub fn gpu(&self) -> Option<&GpuContext> {
        self.gpu.as_ref()
    }
}
