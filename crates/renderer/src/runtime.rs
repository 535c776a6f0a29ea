use std::path::PathBuf;
use std::time::{Duration, Instant};

use lavaconfig::{MAX_FPS, MIN_FPS};

/// High-level behaviour requested by the caller.
///
/// The render policy decides whether frames animate continuously, render a
/// single static frame (reduced motion), or are exported to disk.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderPolicy {
    /// Run the frame loop continuously.
    Animate {
        /// Optional frames-per-second cap; `None` renders on every redraw.
        target_fps: Option<f32>,
    },
    /// Render exactly one frame and never schedule another.
    Still,
    /// Render one frame headlessly and write it to a PNG file.
    Export {
        /// Seconds of simulated and shading time to advance before capture.
        time: f32,
        /// Destination path for the exported file.
        path: PathBuf,
    },
}

impl Default for RenderPolicy {
    fn default() -> Self {
        Self::Animate { target_fps: None }
    }
}

impl RenderPolicy {
    /// Builds the policy for a window session from display preferences.
    pub fn for_display(reduced_motion: bool, fps: Option<f32>) -> Self {
        if reduced_motion {
            Self::Still
        } else {
            Self::Animate { target_fps: fps }
        }
    }

    pub fn is_single_frame(&self) -> bool {
        !matches!(self, Self::Animate { .. })
    }

    /// Minimum spacing between frames, if the policy caps the frame rate.
    /// Caps outside `MIN_FPS..=MAX_FPS` are clamped into it.
    pub fn frame_interval(&self) -> Option<Duration> {
        match self {
            Self::Animate {
                target_fps: Some(fps),
            } if *fps > 0.0 => {
                Duration::try_from_secs_f32(1.0 / fps.clamp(MIN_FPS, MAX_FPS)).ok()
            }
            _ => None,
        }
    }
}

/// Snapshot of the wall-clock time handed to the shading passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed seconds since the source started.
    pub seconds: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Produces a time sample for the next frame.
    fn sample(&mut self) -> TimeSample;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
    frame: u64,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            frame: 0,
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn sample(&mut self) -> TimeSample {
        let elapsed = self.origin.elapsed();
        let sample = TimeSample::new(elapsed.as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
    frame: u64,
}

impl FixedTimeSource {
    pub fn new(time: f32) -> Self {
        Self { time, frame: 0 }
    }
}

impl TimeSource for FixedTimeSource {
    fn sample(&mut self) -> TimeSample {
        let sample = TimeSample::new(self.time, self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Builds a time source suited to the requested render policy.
pub fn time_source_for_policy(policy: &RenderPolicy) -> BoxedTimeSource {
    match policy {
        RenderPolicy::Animate { .. } => Box::new(SystemTimeSource::new()),
        RenderPolicy::Still => Box::new(FixedTimeSource::new(0.0)),
        RenderPolicy::Export { time, .. } => Box::new(FixedTimeSource::new(*time)),
    }
}
