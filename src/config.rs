use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use serde::{Deserialize, Serialize};
use crate::error::{AnalysisError, Result};
/// Measured at 32 C.
pub const DEFAULT_JUNCTION_POTENTIAL_MV: f64 = 11.6;
/// Parameters for the two-stage spike detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeConfig {
    /// Approximate rise time of a spike.
    pub rise_ms: f64,
    /// Minimum peak-to-base amplitude of the first spike in a sweep.
    pub first_spike_amplitude_min_mv: f64,
    /// Minimum amplitude for every subsequent spike.
    pub spike_amplitude_min_mv: f64,
    /// Dynamic threshold as a fraction of first spike height.
    pub spike_thresh_rel: f64,
    /// Lower bound on the dynamic threshold; also the first-spike trigger.
    pub spike_thresh_min_mv: f64,
    /// Window around each spike peak used for shape analysis (before, after).
    pub analysis_window_ms: [f64; 2],
}
impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            rise_ms: 1.0,
            first_spike_amplitude_min_mv: 30.0,
            spike_amplitude_min_mv: 10.0,
            spike_thresh_rel: 0.35,
            spike_thresh_min_mv: -50.0,
            analysis_window_ms: [7.0, 100.0],
        }
    }
}
impl SpikeConfig {
    pub fn samples(ms: f64, sample_rate_hz: f64) -> usize {
        ((ms * sample_rate_hz / 1000.0) as usize).max(1)
    }
}
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassiveConfig {
    /// Trailing fraction of each current step averaged for steady-state I and V.
    pub steady_state_fraction: f64,
    /// Delay after step onset at which the series-resistance jump is read.
    pub rs_delay_ms: f64,
    /// Deflections smaller than this are too small to time a relaxation.
    pub min_deflection_mv: f64,
}
impl Default for PassiveConfig {
    fn default() -> Self {
        Self {
            steady_state_fraction: 0.5,
            rs_delay_ms: 0.1,
            min_deflection_mv: 0.5,
        }
    }
}
/// Everything the extractor needs besides the recording itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub junction_potential_mv: f64,
    pub voltage_channel: usize,
    pub current_channel: usize,
    pub command_channel: usize,
    pub spikes: SpikeConfig,
    pub passive: PassiveConfig,
    /// Index of the command step treated as the stimulus; detected when unset.
    pub stimulus_step: Option<usize>,
    /// Sweeps whose baseline voltages deviate more than this many MADs are excluded.
    pub max_vm_deviance: Option<f64>,
}
impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            junction_potential_mv: DEFAULT_JUNCTION_POTENTIAL_MV,
            voltage_channel: 0,
            current_channel: 1,
            command_channel: 0,
            spikes: SpikeConfig::default(),
            passive: PassiveConfig::default(),
            stimulus_step: None,
            max_vm_deviance: Some(10.0),
        }
    }
}
impl ExtractConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| AnalysisError::io(path, e))?;
        let config: ExtractConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<()> {
        if self.voltage_channel == self.current_channel {
            return Err(AnalysisError::Config(format!(
                "voltage and current both assigned to channel {}",
                self.voltage_channel
            )));
        }
        let s = &self.spikes;
        if s.rise_ms <= 0.0 || s.analysis_window_ms.iter().any(|w| *w <= 0.0) {
            return Err(AnalysisError::Config(
                "spike rise time and analysis window must be positive".into(),
            ));
        }
        if !(s.spike_thresh_rel > 0.0 && s.spike_thresh_rel < 1.0) {
            return Err(AnalysisError::Config(format!(
                "relative spike threshold {} is not in (0, 1)",
                s.spike_thresh_rel
            )));
        }
        let p = &self.passive;
        if !(p.steady_state_fraction > 0.0 && p.steady_state_fraction <= 1.0) {
            return Err(AnalysisError::Config(format!(
                "steady-state fraction {} is not in (0, 1]",
                p.steady_state_fraction
            )));
        }
        if p.rs_delay_ms < 0.0 {
            return Err(AnalysisError::Config("series resistance delay is negative".into()));
        }
        if let Some(max) = self.max_vm_deviance {
            if max <= 0.0 {
                return Err(AnalysisError::Config(format!(
                    "Vm deviance cutoff {max} must be positive"
                )));
            }
        }
        Ok(())
    }
}
