use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;

use crate::types::AdapterProfile;

use super::SetupError;

/// wgpu device wiring shared by the windowed and headless paths.
pub(crate) struct GpuContext {
    pub _instance: wgpu::Instance,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_profile: AdapterProfile,
}

impl GpuContext {
    /// Opens a device that can present to `target` and configures its surface.
    pub(crate) fn for_window<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
    ) -> Result<(Self, PresentSurface), SetupError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = new_instance();

        let window_handle = target
            .window_handle()
            .map_err(|err| SetupError::Unsupported(format!("no window handle: {err}")))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| SetupError::Unsupported(format!("no display handle: {err}")))?;

        // The caller keeps the window alive for as long as the surface exists.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .map_err(|err| SetupError::Unsupported(format!("failed to create surface: {err}")))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|err| SetupError::Unsupported(format!("no suitable GPU adapter: {err}")))?;

        let context = Self::from_adapter(instance, &adapter)?;
        let surface = PresentSurface::configure(surface, &adapter, &context, initial_size)?;
        Ok((context, surface))
    }

    /// Opens a device without any surface, for still export.
    pub(crate) fn headless() -> Result<Self, SetupError> {
        let instance = new_instance();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|err| SetupError::Unsupported(format!("no suitable GPU adapter: {err}")))?;
        Self::from_adapter(instance, &adapter)
    }

    fn from_adapter(instance: wgpu::Instance, adapter: &wgpu::Adapter) -> Result<Self, SetupError> {
        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        let adapter_profile = AdapterProfile::from_wgpu(&adapter_info, &limits);
        debug!(
            name = %adapter_profile.name,
            backend = ?adapter_profile.backend,
            device_type = ?adapter_profile.device_type,
            is_software = adapter_profile.is_software(),
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("lavawall device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .map_err(|err| SetupError::Unsupported(format!("failed to create GPU device: {err}")))?;

        Ok(Self {
            _instance: instance,
            device,
            queue,
            adapter_profile,
        })
    }

    /// Rejects sizes the adapter cannot allocate as a single texture.
    pub(crate) fn check_size(&self, width: u32, height: u32) -> Result<(), SetupError> {
        let max_dimension = self.adapter_profile.max_texture_dimension;
        if width > max_dimension || height > max_dimension {
            return Err(SetupError::Unsupported(format!(
                "GPU max texture dimension is {max_dimension}, requested {width}x{height}"
            )));
        }
        Ok(())
    }
}

fn new_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

/// Swapchain state for the visible window.
pub(crate) struct PresentSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl PresentSurface {
    fn configure(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        context: &GpuContext,
        initial_size: PhysicalSize<u32>,
    ) -> Result<Self, SetupError> {
        let width = initial_size.width.max(1);
        let height = initial_size.height.max(1);
        context.check_size(width, height)?;

        let caps = surface.get_capabilities(adapter);
        let Some(&first_format) = caps.formats.first() else {
            return Err(SetupError::Unsupported(
                "surface reports no supported formats".into(),
            ));
        };
        // Shading happens in linear space; an sRGB swapchain does the encode.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .unwrap_or_else(|| {
                warn!(
                    fallback = ?first_format,
                    "no sRGB surface format available; colours will look darker"
                );
                first_format
            });

        let present_mode = caps
            .present_modes
            .iter()
            .copied()
            .find(|mode| *mode == wgpu::PresentMode::Fifo)
            .unwrap_or(wgpu::PresentMode::Fifo);
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        debug!(?format, ?present_mode, "configuring surface");

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &config);
        Ok(Self { surface, config })
    }

    pub(crate) fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub(crate) fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Zero-sized requests (minimised windows) are ignored.
    pub(crate) fn resize(&mut self, device: &wgpu::Device, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if (new_size.width, new_size.height) == self.size() {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(device, &self.config);
    }

    pub(crate) fn reconfigure(&self, device: &wgpu::Device) {
        self.surface.configure(device, &self.config);
    }

    pub(crate) fn acquire(&self) -> Result<wgpu::SurfaceTexture, wgpu::SurfaceError> {
        self.surface.get_current_texture()
    }
}
