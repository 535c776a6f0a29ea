use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use blobsim::{BlobSet, Simulator};
use lavaconfig::LavaConfig;
use tracing::{debug, error, trace, warn};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::driver::{FrameDriver, FrameSink};
use crate::gpu::{FrameError, GpuContext, GpuState, PresentSurface, SetupError};
use crate::runtime::{time_source_for_policy, RenderPolicy};
use crate::types::{AdapterProfile, RendererConfig, Viewport};

const SOFTWARE_FPS_CAP: f32 = 15.0;

/// Presents frames to the visible window.
///
/// Fields drop in declaration order: the surface goes before the window it
/// was created from.
pub(crate) struct WindowSink {
    surface: PresentSurface,
    gpu: GpuState,
    context: GpuContext,
    window: Arc<Window>,
}

impl WindowSink {
    pub(crate) fn new(window: Arc<Window>, config: &LavaConfig) -> Result<Self, SetupError> {
        let size = window.inner_size();
        let (context, surface) = GpuContext::for_window(window.as_ref(), size)?;
        let (width, height) = surface.size();
        let viewport = Viewport::new(width, height, window.scale_factor() as f32);
        let gpu = GpuState::new(&context, surface.format(), config, viewport)?;
        Ok(Self {
            surface,
            gpu,
            context,
            window,
        })
    }

    pub(crate) fn window(&self) -> &Window {
        self.window.as_ref()
    }

    pub(crate) fn adapter_profile(&self) -> &AdapterProfile {
        &self.context.adapter_profile
    }

    /// The swapchain follows the window immediately; the off-screen targets
    /// wait for the driver's debounced resize.
    pub(crate) fn resize_surface(&mut self, size: PhysicalSize<u32>) {
        self.surface.resize(&self.context.device, size);
    }

    pub(crate) fn reconfigure_surface(&self) {
        self.surface.reconfigure(&self.context.device);
    }
}

impl FrameSink for WindowSink {
    type Error = FrameError;

    fn render(&mut self, blobs: &BlobSet, elapsed: f32) -> Result<(), FrameError> {
        let frame = self.surface.acquire()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.gpu.render(blobs, elapsed, &view, self.surface.size());
        self.window.pre_present_notify();
        frame.present();
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) -> Result<(), FrameError> {
        self.gpu.resize(viewport);
        Ok(())
    }
}

/// Software rasterisers get a frame cap unless the caller chose one.
fn effective_policy(policy: &RenderPolicy, profile: &AdapterProfile) -> RenderPolicy {
    match policy {
        RenderPolicy::Animate { target_fps: None } if profile.is_software() => {
            warn!(
                adapter = %profile.name,
                backend = ?profile.backend,
                cap = SOFTWARE_FPS_CAP,
                "software rasterizer detected; capping animation to {} FPS (override with --fps)",
                SOFTWARE_FPS_CAP
            );
            RenderPolicy::Animate {
                target_fps: Some(SOFTWARE_FPS_CAP),
            }
        }
        other => other.clone(),
    }
}

fn viewport_of(window: &Window, size: PhysicalSize<u32>) -> Viewport {
    Viewport::new(size.width, size.height, window.scale_factor() as f32)
}

/// Opens the window and drives frames until it is closed.
pub(crate) fn run(config: RendererConfig, simulator: Simulator, blobs: BlobSet) -> Result<()> {
    let event_loop = EventLoop::new()
        .map_err(|err| SetupError::Unsupported(format!("no event loop: {err}")))?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title("lavawall")
        .with_inner_size(window_size)
        .build(&event_loop)
        .map_err(|err| SetupError::Unsupported(format!("no window: {err}")))?;
    let window = Arc::new(window);

    let sink = WindowSink::new(window, &config.lava)?;
    let policy = effective_policy(&config.policy, sink.adapter_profile());
    let mut driver = FrameDriver::new(
        sink,
        simulator,
        blobs,
        time_source_for_policy(&policy),
        &policy,
        config.lava.display.resize_debounce,
    );
    if driver.ready_for_frame(Instant::now()) {
        driver.sink().window().request_redraw();
    }

    let mut minimised = false;
    let mut occluded = false;
    let run_result = event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == driver.sink().window().id() => {
            match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    elwt.exit();
                }
                WindowEvent::Resized(new_size) => {
                    minimised = new_size.width == 0 || new_size.height == 0;
                    driver.set_visible(!minimised && !occluded);
                    if minimised {
                        return;
                    }
                    driver.sink_mut().resize_surface(new_size);
                    let viewport = viewport_of(driver.sink().window(), new_size);
                    driver.request_resize(viewport, Instant::now());
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let window = driver.sink().window();
                    let viewport = viewport_of(window, window.inner_size());
                    driver.request_resize(viewport, Instant::now());
                }
                WindowEvent::Occluded(hidden) => {
                    occluded = hidden;
                    driver.set_visible(!minimised && !occluded);
                }
                WindowEvent::RedrawRequested => match driver.frame(Instant::now()) {
                    Ok(_) => {}
                    Err(FrameError::Surface(err)) => match err {
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                            debug!(?err, "surface out of date; reconfiguring");
                            driver.sink().reconfigure_surface();
                        }
                        wgpu::SurfaceError::OutOfMemory => {
                            error!("surface out of memory; exiting");
                            elwt.exit();
                        }
                        wgpu::SurfaceError::Timeout => {
                            warn!("surface timeout; retrying next frame");
                        }
                        other => {
                            warn!(error = ?other, "surface error; retrying next frame");
                        }
                    },
                    Err(err) => {
                        warn!(error = %err, "frame failed; retrying next frame");
                    }
                },
                _ => {}
            }
        }
        Event::AboutToWait => {
            let now = Instant::now();
            if let Err(err) = driver.apply_due_resize(now) {
                warn!(error = %err, "failed to apply resize");
            }
            if driver.ready_for_frame(now) {
                trace!("scheduler: issuing redraw now");
                driver.sink().window().request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = driver.next_deadline(now) {
                let ms = deadline.saturating_duration_since(now).as_millis();
                trace!(deadline_ms = ms, "scheduler: waiting until next frame");
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                trace!("scheduler: idle (no redraw requested)");
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, device_type: wgpu::DeviceType) -> AdapterProfile {
        AdapterProfile {
            name: name.into(),
            backend: wgpu::Backend::Vulkan,
            device_type,
            max_texture_dimension: 8192,
        }
    }

    #[test]
    fn software_adapter_caps_uncapped_animation() {
        let software = profile("llvmpipe (LLVM 17.0.6, 256 bits)", wgpu::DeviceType::Cpu);
        let policy = effective_policy(&RenderPolicy::default(), &software);
        assert_eq!(
            policy,
            RenderPolicy::Animate {
                target_fps: Some(SOFTWARE_FPS_CAP)
            }
        );
    }

    #[test]
    fn explicit_fps_and_still_policies_are_kept() {
        let software = profile("llvmpipe", wgpu::DeviceType::Cpu);
        let explicit = RenderPolicy::Animate {
            target_fps: Some(60.0),
        };
        assert_eq!(effective_policy(&explicit, &software), explicit);
        assert_eq!(
            effective_policy(&RenderPolicy::Still, &software),
            RenderPolicy::Still
        );

        let hardware = profile("Radeon RX 6600", wgpu::DeviceType::DiscreteGpu);
        assert_eq!(
            effective_policy(&RenderPolicy::default(), &hardware),
            RenderPolicy::default()
        );
    }
}
