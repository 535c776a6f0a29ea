use tracing::debug;

use crate::compile::{fragment_module, vertex_module, Program};

use super::targets::TARGET_FORMAT;
use super::SetupError;

const VERTEX_PROGRAM: &str = "fullscreen vertex";

/// Bind group layouts, the shared sampler and one render pipeline per program.
pub(crate) struct Programs {
    pub uniform_layout: wgpu::BindGroupLayout,
    /// One texture plus sampler (bright and blur).
    pub single_input_layout: wgpu::BindGroupLayout,
    /// Base and bloom textures sharing a sampler (composite).
    pub dual_input_layout: wgpu::BindGroupLayout,
    pub sampler: wgpu::Sampler,
    field: wgpu::RenderPipeline,
    bright: wgpu::RenderPipeline,
    blur: wgpu::RenderPipeline,
    composite: wgpu::RenderPipeline,
}

impl Programs {
    /// Builds every program once. Any shader parse or pipeline validation
    /// failure aborts setup with the offending program's name.
    pub fn build(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
    ) -> Result<Self, SetupError> {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pass uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let single_input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("single input layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });
        let dual_input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("dual input layout"),
            entries: &[texture_entry(0), sampler_entry(1), texture_entry(2)],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("pass input sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex = vertex_module(device);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(SetupError::ProgramBuild {
                program: VERTEX_PROGRAM,
                message: err.to_string(),
            });
        }
        let build = |program: Program, inputs: Option<&wgpu::BindGroupLayout>, format| {
            let mut layouts = vec![&uniform_layout];
            layouts.extend(inputs);
            build_program(device, &vertex, program, &layouts, format)
        };

        let field = build(Program::Field, None, TARGET_FORMAT)?;
        let bright = build(Program::Bright, Some(&single_input_layout), TARGET_FORMAT)?;
        let blur = build(Program::Blur, Some(&single_input_layout), TARGET_FORMAT)?;
        let composite = build(Program::Composite, Some(&dual_input_layout), output_format)?;

        Ok(Self {
            uniform_layout,
            single_input_layout,
            dual_input_layout,
            sampler,
            field,
            bright,
            blur,
            composite,
        })
    }

    pub fn pipeline(&self, program: Program) -> &wgpu::RenderPipeline {
        match program {
            Program::Field => &self.field,
            Program::Bright => &self.bright,
            Program::Blur => &self.blur,
            Program::Composite => &self.composite,
        }
    }
}

fn build_program(
    device: &wgpu::Device,
    vertex: &wgpu::ShaderModule,
    program: Program,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, SetupError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let fragment = fragment_module(device, program);
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(program.name()),
        bind_group_layouts,
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(program.name()),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: vertex,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(SetupError::ProgramBuild {
            program: program.name(),
            message: err.to_string(),
        });
    }
    debug!(program = program.name(), ?format, "built render program");
    Ok(pipeline)
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}
