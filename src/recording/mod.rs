// src/recording/mod.rs
pub mod abf;
pub mod scan;
pub mod source;
#[cfg(test)]
pub(crate) mod fixtures;
pub use abf::{AbfFile, OperationMode};
pub use scan::{epoch_recording, recordings_in, scan_cell, EpochKind, ScannedEpoch};
pub use source::{ChannelMap, ManualRecording, RecordingInfo, RecordingSource, StimulusStep, Sweep};
