//! Blob state, field math, and the fixed-step simulator behind the lava lamp.
//!
//! The crate is GPU-agnostic: the renderer packs a [`BlobSet`] snapshot into
//! its uniform buffer after every [`Simulator::step`], and the functions in
//! [`field`] are the CPU mirror of the per-pixel field program.

mod blob;
pub mod field;
mod simulator;

pub use blob::{Blob, BlobSet, PackedBlobs};
pub use lavaconfig::MAX_BLOBS;
pub use simulator::{pair_force, PairForce, Simulator, DISTANCE_EPSILON, FIXED_DT, TICK};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SimError {
    #[error("blob set is full ({capacity} blobs)")]
    CapacityExceeded { capacity: usize },
    #[error("population of {requested} blobs exceeds capacity of {capacity}")]
    PopulationTooLarge { requested: usize, capacity: usize },
}
