use lavaconfig::LavaConfig;

use crate::runtime::RenderPolicy;

/// Physical size of the drawable area plus the host's scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    /// Minimised windows report a zero extent; nothing can be drawn into them.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Summary of the adapter wgpu picked, kept for logging and frame pacing.
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub max_texture_dimension: u32,
}

impl AdapterProfile {
    pub fn from_wgpu(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }

    /// True for CPU rasterisers such as llvmpipe or WARP.
    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
            || self.name.to_ascii_lowercase().contains("llvmpipe")
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` combines the loaded [`LavaConfig`] with the CLI-level
/// choices: window size, RNG seed and the render policy.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub lava: LavaConfig,
    /// Initial window (or export image) size in physical pixels.
    pub surface_size: (u32, u32),
    /// Seed shared by population placement and the simulator's wrap RNG.
    pub seed: u64,
    pub policy: RenderPolicy,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            lava: LavaConfig::default(),
            surface_size: (1280, 720),
            seed: 0,
            policy: RenderPolicy::default(),
        }
    }
}
