//! GPU side of the lava lamp.
//!
//! - `context` owns the wgpu instance/device and, for windows, the swapchain.
//! - `pipeline` builds the four fragment programs once, inside validation
//!   error scopes so a broken program surfaces as [`SetupError::ProgramBuild`].
//! - `targets` sizes and (re)allocates the base and bloom targets.
//! - `uniforms` mirrors the std140 blocks the programs read.
//! - `state` runs the seven passes of a frame in [`Pass::ORDER`].

mod context;
mod pipeline;
mod state;
pub mod targets;
mod uniforms;

pub(crate) use context::{GpuContext, PresentSurface};
pub(crate) use state::GpuState;

use crate::compile::Program;

/// Failures that disable rendering for the whole session.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("rendering is not supported here: {0}")]
    Unsupported(String),
    #[error("failed to build the {program} program: {message}")]
    ProgramBuild {
        program: &'static str,
        message: String,
    },
}

/// Failures of a single frame; the next frame may succeed.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("failed to map readback buffer: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),
    #[error("failed waiting for the GPU: {0}")]
    Poll(#[from] wgpu::PollError),
}

/// Texture a pass reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Base,
    BloomA,
    BloomB,
    /// The swapchain image or export texture.
    Output,
}

/// Every pass of a frame. Uniform buffers and bind groups are cached per
/// variant, indexed by [`Pass::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Field,
    Bright,
    BlurHorizontal,
    BlurVertical,
    WideBlurHorizontal,
    WideBlurVertical,
    Composite,
}

impl Pass {
    pub const COUNT: usize = 7;

    pub const ORDER: [Pass; Pass::COUNT] = [
        Pass::Field,
        Pass::Bright,
        Pass::BlurHorizontal,
        Pass::BlurVertical,
        Pass::WideBlurHorizontal,
        Pass::WideBlurVertical,
        Pass::Composite,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Pass::Field => "field pass",
            Pass::Bright => "bright pass",
            Pass::BlurHorizontal => "blur pass (horizontal)",
            Pass::BlurVertical => "blur pass (vertical)",
            Pass::WideBlurHorizontal => "wide blur pass (horizontal)",
            Pass::WideBlurVertical => "wide blur pass (vertical)",
            Pass::Composite => "composite pass",
        }
    }

    pub fn program(self) -> Program {
        match self {
            Pass::Field => Program::Field,
            Pass::Bright => Program::Bright,
            Pass::BlurHorizontal
            | Pass::BlurVertical
            | Pass::WideBlurHorizontal
            | Pass::WideBlurVertical => Program::Blur,
            Pass::Composite => Program::Composite,
        }
    }

    /// Primary input texture; the composite additionally reads [`Slot::BloomA`].
    pub fn input(self) -> Option<Slot> {
        match self {
            Pass::Field => None,
            Pass::Bright | Pass::Composite => Some(Slot::Base),
            Pass::BlurHorizontal | Pass::WideBlurHorizontal => Some(Slot::BloomA),
            Pass::BlurVertical | Pass::WideBlurVertical => Some(Slot::BloomB),
        }
    }

    pub fn output(self) -> Slot {
        match self {
            Pass::Field => Slot::Base,
            Pass::Bright | Pass::BlurVertical | Pass::WideBlurVertical => Slot::BloomA,
            Pass::BlurHorizontal | Pass::WideBlurHorizontal => Slot::BloomB,
            Pass::Composite => Slot::Output,
        }
    }

    /// Tap direction and iteration (0 = base spacing, 1 = doubled) of blur passes.
    pub fn blur(self) -> Option<([f32; 2], u32)> {
        match self {
            Pass::BlurHorizontal => Some(([1.0, 0.0], 0)),
            Pass::BlurVertical => Some(([0.0, 1.0], 0)),
            Pass::WideBlurHorizontal => Some(([1.0, 0.0], 1)),
            Pass::WideBlurVertical => Some(([0.0, 1.0], 1)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_order() {
        for (position, pass) in Pass::ORDER.iter().enumerate() {
            assert_eq!(pass.index(), position);
        }
    }

    #[test]
    fn no_pass_reads_its_own_output() {
        for pass in Pass::ORDER {
            assert_ne!(pass.input(), Some(pass.output()), "{}", pass.label());
        }
    }

    #[test]
    fn each_pass_reads_what_the_previous_one_wrote() {
        for pair in Pass::ORDER.windows(2) {
            let [previous, next] = [pair[0], pair[1]];
            if next == Pass::Composite {
                assert_eq!(previous.output(), Slot::BloomA);
                continue;
            }
            assert_eq!(next.input(), Some(previous.output()), "{}", next.label());
        }
    }

    #[test]
    fn blur_passes_share_one_program_and_double_spacing() {
        let blurs: Vec<_> = Pass::ORDER
            .into_iter()
            .filter_map(|pass| pass.blur().map(|blur| (pass, blur)))
            .collect();
        assert_eq!(blurs.len(), 4);
        assert!(blurs
            .iter()
            .all(|(pass, _)| pass.program() == Program::Blur));
        assert_eq!(blurs[0].1, ([1.0, 0.0], 0));
        assert_eq!(blurs[1].1, ([0.0, 1.0], 0));
        assert_eq!(blurs[2].1, ([1.0, 0.0], 1));
        assert_eq!(blurs[3].1, ([0.0, 1.0], 1));
    }

    #[test]
    fn field_pass_writes_base_first() {
        assert_eq!(Pass::ORDER[0].output(), Slot::Base);
        assert_eq!(Pass::ORDER[Pass::COUNT - 1].output(), Slot::Output);
    }
}
