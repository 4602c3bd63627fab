// src/lib.rs
mod atomic;
pub mod batch;
pub mod collate;
pub mod config;
pub mod control;
pub mod error;
pub mod features;
pub mod plot;
pub mod record;
pub mod recording;
pub use config::{ExtractConfig, PassiveConfig, SpikeConfig};
pub use error::{AnalysisError, Result};
pub use features::{EpochExtractor, EpochId};
pub use record::EpochRecord;
