//! Headless still export: one frame rendered offscreen and written as PNG.

use std::path::Path;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use blobsim::{BlobSet, Simulator, TICK};
use image::{ImageFormat, RgbaImage};
use tracing::{debug, info};

use crate::driver::{FrameDriver, FrameSink};
use crate::gpu::{FrameError, GpuContext, GpuState};
use crate::runtime::time_source_for_policy;
use crate::types::{RendererConfig, Viewport};

const EXPORT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const BYTES_PER_PIXEL: u32 = 4;

/// Number of simulation ticks covering `time` seconds.
pub fn ticks_for(time: f32) -> u64 {
    if !time.is_finite() || time <= 0.0 {
        return 0;
    }
    (time / TICK.as_secs_f32()).round() as u64
}

/// Renders the frame at `time` and saves it to `path`.
pub(crate) fn export_still(
    config: &RendererConfig,
    simulator: Simulator,
    blobs: BlobSet,
    time: f32,
    path: &Path,
) -> Result<()> {
    let (width, height) = (config.surface_size.0.max(1), config.surface_size.1.max(1));
    let context = GpuContext::headless()?;
    context.check_size(width, height)?;
    let gpu = GpuState::new(
        &context,
        EXPORT_FORMAT,
        &config.lava,
        Viewport::new(width, height, 1.0),
    )?;
    let sink = ExportSink::new(context, gpu, (width, height));

    let mut driver = FrameDriver::new(
        sink,
        simulator,
        blobs,
        time_source_for_policy(&config.policy),
        &config.policy,
        config.lava.display.resize_debounce,
    );
    let ticks = ticks_for(time);
    driver.advance(ticks);
    debug!(ticks, time, "advanced simulation for export");
    driver.frame(Instant::now())?;

    let image = driver
        .sink_mut()
        .captured
        .take()
        .ok_or_else(|| anyhow!("no frame was captured"))?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), width, height, time, "exported still frame");
    Ok(())
}

struct ExportSink {
    gpu: GpuState,
    context: GpuContext,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
    captured: Option<RgbaImage>,
}

impl ExportSink {
    fn new(context: GpuContext, gpu: GpuState, size: (u32, u32)) -> Self {
        let texture = context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("export target"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: EXPORT_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            gpu,
            context,
            texture,
            view,
            size,
            captured: None,
        }
    }

    fn read_back(&self) -> Result<RgbaImage, FrameError> {
        let (width, height) = self.size;
        let unpadded_bytes_per_row = width * BYTES_PER_PIXEL;
        let padded_bytes_per_row = padded_row_bytes(width);
        let device = &self.context.device;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("export staging buffer"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("export copy encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::PollType::Wait)?;
        rx.recv().unwrap_or(Err(wgpu::BufferAsyncError))?;

        let mut image = RgbaImage::new(width, height);
        {
            let data = slice.get_mapped_range();
            for (row, padded) in image
                .chunks_exact_mut(unpadded_bytes_per_row as usize)
                .zip(data.chunks_exact(padded_bytes_per_row as usize))
            {
                row.copy_from_slice(&padded[..unpadded_bytes_per_row as usize]);
            }
        }
        staging.unmap();
        Ok(image)
    }
}

impl FrameSink for ExportSink {
    type Error = FrameError;

    fn render(&mut self, blobs: &BlobSet, elapsed: f32) -> Result<(), FrameError> {
        self.gpu.render(blobs, elapsed, &self.view, self.size);
        self.captured = Some(self.read_back()?);
        Ok(())
    }

    fn resize(&mut self, viewport: Viewport) -> Result<(), FrameError> {
        self.gpu.resize(viewport);
        Ok(())
    }
}

/// Row pitch of the staging buffer; wgpu requires 256-byte aligned rows.
fn padded_row_bytes(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * BYTES_PER_PIXEL).div_ceil(align) * align
}
