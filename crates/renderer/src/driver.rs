//! Frame scheduling independent of any GPU.
//!
//! [`FrameDriver`] owns the simulator, the blob set and a [`FrameSink`]. The
//! window loop asks it whether a frame is due, when to wake up next, and feeds
//! it visibility and resize signals; the sink only ever sees finished blob
//! snapshots.

use std::time::{Duration, Instant};

use blobsim::{BlobSet, Simulator, FIXED_DT, TICK};
use tracing::{debug, trace};

use crate::runtime::{BoxedTimeSource, RenderPolicy};
use crate::types::Viewport;

/// Destination for finished frames.
pub trait FrameSink {
    type Error;

    /// Draws one frame of `blobs`; `elapsed` is wall-clock seconds for shading.
    fn render(&mut self, blobs: &BlobSet, elapsed: f32) -> Result<(), Self::Error>;

    /// Applies a (debounced) viewport change. Never called during `render`.
    fn resize(&mut self, viewport: Viewport) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Running,
    /// Host is hidden; nothing is scheduled until it becomes visible.
    Paused,
    /// Single-frame policy after its frame. Resizes still reach the sink but
    /// nothing is drawn again.
    Stopped,
}

pub struct FrameDriver<S: FrameSink> {
    sink: S,
    simulator: Simulator,
    blobs: BlobSet,
    clock: BoxedTimeSource,
    state: DriverState,
    single_frame: bool,
    frame_interval: Option<Duration>,
    last_frame: Option<Instant>,
    ticks: u64,
    pending_resize: Option<(Viewport, Instant)>,
    resize_debounce: Duration,
    rendered_frames: u64,
}

impl<S: FrameSink> FrameDriver<S> {
    pub fn new(
        sink: S,
        simulator: Simulator,
        blobs: BlobSet,
        clock: BoxedTimeSource,
        policy: &RenderPolicy,
        resize_debounce: Duration,
    ) -> Self {
        Self {
            sink,
            simulator,
            blobs,
            clock,
            state: DriverState::Running,
            single_frame: policy.is_single_frame(),
            frame_interval: policy.frame_interval(),
            last_frame: None,
            ticks: 0,
            pending_resize: None,
            resize_debounce,
            rendered_frames: 0,
        }
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match self.state {
            DriverState::Running => match (self.last_frame, self.frame_interval) {
                (Some(last), Some(interval)) => now >= last + interval,
                _ => true,
            },
            DriverState::Paused | DriverState::Stopped => false,
        }
    }

    /// Earliest instant the driver needs to be woken, or `None` when idle.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        let frame = if self.ready_for_frame(now) {
            Some(now)
        } else if self.state == DriverState::Running {
            match (self.last_frame, self.frame_interval) {
                (Some(last), Some(interval)) => Some(last + interval),
                _ => Some(now),
            }
        } else {
            None
        };
        let resize = self.pending_resize.map(|(_, deadline)| deadline);
        match (frame, resize) {
            (Some(frame), Some(resize)) => Some(frame.min(resize)),
            (frame, resize) => frame.or(resize),
        }
    }

    /// Runs one frame if one is due. Returns whether the sink rendered.
    ///
    /// A due resize is applied first so it never lands inside a render.
    pub fn frame(&mut self, now: Instant) -> Result<bool, S::Error> {
        self.apply_due_resize(now)?;
        if !self.ready_for_frame(now) {
            return Ok(false);
        }

        if !self.single_frame {
            let simulated = self.simulated_elapsed();
            self.simulator.step(&mut self.blobs, FIXED_DT, simulated);
            self.ticks += 1;
        }

        let sample = self.clock.sample();
        self.sink.render(&self.blobs, sample.seconds)?;
        self.last_frame = Some(now);
        self.rendered_frames += 1;
        trace!(
            frame = sample.frame_index,
            ticks = self.ticks,
            elapsed = sample.seconds,
            "frame rendered"
        );

        if self.single_frame && self.state == DriverState::Running {
            debug!("single-frame policy satisfied; stopping the frame loop");
            self.state = DriverState::Stopped;
        }
        Ok(true)
    }

    /// Hidden hosts pause the loop; a stopped loop stays stopped.
    pub fn set_visible(&mut self, visible: bool) {
        let next = match (self.state, visible) {
            (DriverState::Running, false) => DriverState::Paused,
            (DriverState::Paused, true) => DriverState::Running,
            (state, _) => state,
        };
        if next != self.state {
            debug!(from = ?self.state, to = ?next, "visibility changed");
            self.state = next;
        }
    }

    /// Records a viewport change; only the latest request within the debounce
    /// window reaches the sink.
    pub fn request_resize(&mut self, viewport: Viewport, now: Instant) {
        self.pending_resize = Some((viewport, now + self.resize_debounce));
    }

    /// Hands a pending resize to the sink once its debounce has elapsed.
    pub fn apply_due_resize(&mut self, now: Instant) -> Result<bool, S::Error> {
        let Some((viewport, deadline)) = self.pending_resize else {
            return Ok(false);
        };
        if now < deadline {
            return Ok(false);
        }
        self.pending_resize = None;
        if viewport.is_empty() {
            return Ok(false);
        }
        self.sink.resize(viewport)?;
        Ok(true)
    }

    /// Steps the simulation `ticks` times without rendering.
    pub fn advance(&mut self, ticks: u64) {
        for _ in 0..ticks {
            let simulated = self.simulated_elapsed();
            self.simulator.step(&mut self.blobs, FIXED_DT, simulated);
            self.ticks += 1;
        }
    }

    /// Simulated seconds: completed ticks times the tick length.
    pub fn simulated_elapsed(&self) -> f32 {
        self.ticks as f32 * TICK.as_secs_f32()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn blobs(&self) -> &BlobSet {
        &self.blobs
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn rendered_frames(&self) -> u64 {
        self.rendered_frames
    }
}
