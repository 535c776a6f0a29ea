//! Renderer crate for lavawall, the metaball lava lamp.
//!
//! The crate glues the blob simulation to a multi-pass `wgpu` pipeline and
//! presents the result either in a window or as a single exported PNG. The
//! overall flow is:
//!
//! ```text
//!   CLI / lavawall
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ FrameDriver ──▶ Simulator::step ──▶ BlobSet snapshot
//!                          │
//!                          └─▶ FrameSink::render ──▶ field ─▶ bright ─▶ blur ×4 ─▶ composite
//! ```
//!
//! [`FrameDriver`] decides when a frame runs (FPS cap, visibility, reduced
//! motion, debounced resizes) and never touches the GPU itself. The window
//! and export sinks own the `wgpu` state; every fragment program is assembled
//! from GLSL at start-up, so a broken program is reported once as a
//! [`SetupError`] rather than on every frame.

pub mod bloom;
pub mod compile;
pub mod driver;
mod export;
mod gpu;
pub mod runtime;
pub mod types;
mod window;

use anyhow::{Context, Result};
use blobsim::{BlobSet, Simulator};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

pub use driver::{DriverState, FrameDriver, FrameSink};
pub use export::ticks_for;
pub use gpu::targets::{RenderTargets, ResourceManager, TargetAllocator, TargetLayout};
pub use gpu::{FrameError, Pass, SetupError, Slot};
pub use runtime::{RenderPolicy, TimeSample, TimeSource};
pub use types::{AdapterProfile, RendererConfig, Viewport};

/// High-level entry point that owns the chosen configuration.
///
/// `Renderer` seeds the blob population, builds the simulator and hands both
/// to the windowed loop or the still exporter.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Runs until the window closes, or until the still frame is written.
    ///
    /// GPU setup failures come back as a [`SetupError`] inside the
    /// `anyhow::Error`, so callers can tell "no GPU here" from a bug.
    pub fn run(&mut self) -> Result<()> {
        let (simulator, blobs) = self.seed_simulation()?;
        match &self.config.policy {
            RenderPolicy::Export { time, path } => {
                export::export_still(&self.config, simulator, blobs, *time, path)
            }
            RenderPolicy::Animate { .. } | RenderPolicy::Still => {
                window::run(self.config.clone(), simulator, blobs)
            }
        }
    }

    fn seed_simulation(&self) -> Result<(Simulator, BlobSet)> {
        let lava = &self.config.lava;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let blobs = BlobSet::populate(lava, &mut rng).context("failed to seed blob population")?;
        info!(
            blobs = blobs.len(),
            seed = self.config.seed,
            policy = ?self.config.policy,
            "seeded lava lamp"
        );
        Ok((Simulator::new(lava, self.config.seed), blobs))
    }
}
