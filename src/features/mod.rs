// src/features/mod.rs
pub mod extractor;
pub mod firing;
pub mod interval;
pub mod passive;
pub mod spikes;
pub mod stats;
pub use extractor::{EpochExtractor, EpochId};
pub use firing::{FiPoint, FiRelation, SweepFiring};
pub use interval::Interval;
pub use passive::IvPoint;
pub use spikes::{SpikeFinder, SpikeShape, SweepSpikes};
pub use stats::LinearFit;
