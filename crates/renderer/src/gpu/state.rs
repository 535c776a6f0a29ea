use std::time::{Duration, Instant};

use blobsim::field::ShadeParams;
use blobsim::BlobSet;
use lavaconfig::{Bloom, LavaConfig, Surface};
use tracing::debug;

use crate::bloom::blur_spacing;
use crate::types::Viewport;

use super::context::GpuContext;
use super::pipeline::Programs;
use super::targets::{GpuTargetAllocator, RenderTarget, RenderTargets, ResourceManager};
use super::uniforms::{FieldUniforms, PostUniforms};
use super::{Pass, SetupError, Slot};

/// Per-session GPU state: programs, targets, and one cached uniform buffer
/// plus bind groups for every [`Pass`].
///
/// Input bind groups reference the off-screen targets and are rebuilt only
/// when [`ResourceManager::ensure`] reallocates them.
pub(crate) struct GpuState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    programs: Programs,
    resources: ResourceManager<GpuTargetAllocator>,
    uniform_buffers: [wgpu::Buffer; Pass::COUNT],
    uniform_groups: [wgpu::BindGroup; Pass::COUNT],
    input_groups: [Option<wgpu::BindGroup>; Pass::COUNT],
    field_uniforms: FieldUniforms,
    surface: Surface,
    bloom: Bloom,
    output_size: Option<(u32, u32)>,
    stats: RenderStats,
}

impl GpuState {
    pub fn new(
        context: &GpuContext,
        output_format: wgpu::TextureFormat,
        config: &LavaConfig,
        viewport: Viewport,
    ) -> Result<Self, SetupError> {
        let device = context.device.clone();
        let programs = Programs::build(&device, output_format)?;
        let resources = ResourceManager::new(
            GpuTargetAllocator::new(device.clone()),
            config.display.max_device_pixel_ratio,
        );

        let uniform_buffers = Pass::ORDER.map(|pass| {
            let size = match pass {
                Pass::Field => std::mem::size_of::<FieldUniforms>(),
                _ => std::mem::size_of::<PostUniforms>(),
            };
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(pass.label()),
                size: size as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });
        let uniform_groups = std::array::from_fn(|index| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(Pass::ORDER[index].label()),
                layout: &programs.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffers[index].as_entire_binding(),
                }],
            })
        });

        let mut state = Self {
            queue: context.queue.clone(),
            device,
            programs,
            resources,
            uniform_buffers,
            uniform_groups,
            input_groups: Default::default(),
            field_uniforms: FieldUniforms::new(viewport.width, viewport.height),
            surface: config.surface.clone(),
            bloom: config.bloom.clone(),
            output_size: None,
            stats: RenderStats::new(),
        };
        state.resize(viewport);
        Ok(state)
    }

    /// Reallocates the off-screen targets when the viewport's layout changed.
    /// Zero-sized viewports keep the current targets.
    pub fn resize(&mut self, viewport: Viewport) {
        if viewport.is_empty() {
            return;
        }
        if !self.resources.ensure(viewport) {
            return;
        }
        let Some(layout) = self.resources.layout() else {
            return;
        };
        self.field_uniforms.set_frame(layout.full.0, layout.full.1);
        self.rebuild_input_groups();
        self.write_post_uniforms();
        // The composite's input texel size depends on the base target.
        self.output_size = None;
    }

    /// Records and submits every pass of one frame into `output`.
    pub fn render(
        &mut self,
        blobs: &BlobSet,
        elapsed: f32,
        output: &wgpu::TextureView,
        output_size: (u32, u32),
    ) {
        let shade = ShadeParams::from_surface(&self.surface, elapsed);
        self.field_uniforms.set_shading(&shade);
        self.field_uniforms.set_blobs(&blobs.pack());
        self.queue.write_buffer(
            &self.uniform_buffers[Pass::Field.index()],
            0,
            bytemuck::bytes_of(&self.field_uniforms),
        );
        if self.output_size != Some(output_size) {
            self.write_composite_uniforms(output_size);
            self.output_size = Some(output_size);
        }

        let Some(targets) = self.resources.targets() else {
            return;
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("lava frame encoder"),
            });
        for pass in Pass::ORDER {
            let view = match pass.output() {
                Slot::Output => output,
                slot => &target_for(targets, slot).view,
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(pass.label()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(self.programs.pipeline(pass.program()));
            render_pass.set_bind_group(0, &self.uniform_groups[pass.index()], &[]);
            if let Some(inputs) = &self.input_groups[pass.index()] {
                render_pass.set_bind_group(1, inputs, &[]);
            }
            render_pass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.stats.record(elapsed, blobs.len());
    }

    fn rebuild_input_groups(&mut self) {
        let Some(targets) = self.resources.targets() else {
            return;
        };
        let programs = &self.programs;
        let device = &self.device;
        self.input_groups = Pass::ORDER.map(|pass| {
            let input = target_for(targets, pass.input()?);
            let group = if pass == Pass::Composite {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(pass.label()),
                    layout: &programs.dual_input_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&input.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&programs.sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(&targets.bloom_a.view),
                        },
                    ],
                })
            } else {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(pass.label()),
                    layout: &programs.single_input_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&input.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&programs.sampler),
                        },
                    ],
                })
            };
            Some(group)
        });
    }

    fn write_post_uniforms(&self) {
        let Some(targets) = self.resources.targets() else {
            return;
        };
        let full_width = targets.base.size.0;
        for pass in Pass::ORDER {
            let (Some(input), output) = (pass.input(), pass.output()) else {
                continue;
            };
            if output == Slot::Output {
                continue;
            }
            let mut uniforms = PostUniforms::new(
                target_for(targets, output).size,
                target_for(targets, input).size,
                self.bloom.threshold,
                self.bloom.intensity,
            );
            if let Some((direction, iteration)) = pass.blur() {
                let spacing = blur_spacing(self.bloom.radius, full_width, iteration);
                uniforms = uniforms.with_blur(direction, spacing);
            }
            self.queue.write_buffer(
                &self.uniform_buffers[pass.index()],
                0,
                bytemuck::bytes_of(&uniforms),
            );
        }
    }

    fn write_composite_uniforms(&self, output_size: (u32, u32)) {
        let Some(targets) = self.resources.targets() else {
            return;
        };
        let uniforms = PostUniforms::new(
            output_size,
            targets.base.size,
            self.bloom.threshold,
            self.bloom.intensity,
        );
        self.queue.write_buffer(
            &self.uniform_buffers[Pass::Composite.index()],
            0,
            bytemuck::bytes_of(&uniforms),
        );
    }
}

fn target_for(targets: &RenderTargets<RenderTarget>, slot: Slot) -> &RenderTarget {
    match slot {
        Slot::Base | Slot::Output => &targets.base,
        Slot::BloomA => &targets.bloom_a,
        Slot::BloomB => &targets.bloom_b,
    }
}

/// Frame counter that reports a rolling FPS once per second.
struct RenderStats {
    frame_count: u64,
    frames_since_last_update: u32,
    last_update: Instant,
}

impl RenderStats {
    fn new() -> Self {
        Self {
            frame_count: 0,
            frames_since_last_update: 0,
            last_update: Instant::now(),
        }
    }

    fn record(&mut self, elapsed: f32, blob_count: usize) {
        self.frame_count += 1;
        self.frames_since_last_update += 1;
        let now = Instant::now();
        let since_update = now.saturating_duration_since(self.last_update);
        if since_update >= Duration::from_secs(1) {
            let fps = self.frames_since_last_update as f32 / since_update.as_secs_f32();
            self.frames_since_last_update = 0;
            self.last_update = now;
            debug!(
                fps = fps.round(),
                frame_count = self.frame_count,
                time = elapsed,
                blobs = blob_count,
                "render stats"
            );
        }
    }
}
