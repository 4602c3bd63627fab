use std::ops::Range;
use std::path::PathBuf;
use chrono::NaiveDateTime;
use crate::error::{AnalysisError, Result};
/// One constant-level segment of the command waveform, in samples from sweep onset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StimulusStep {
    pub start: usize,
    pub end: usize,
    pub level_pa: f64,
}
impl StimulusStep {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
/// Single trial of a current-clamp recording.
#[derive(Clone, Debug)]
pub struct Sweep {
    pub index: usize,
    /// Onset relative to the start of the recording.
    pub start_s: f64,
    pub sample_rate_hz: f64,
    pub voltage_mv: Vec<f64>,
    pub current_pa: Vec<f64>,
    pub steps: Vec<StimulusStep>,
}
impl Sweep {
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate_hz > 0.0) {
            return Err(AnalysisError::data(format!(
                "sweep {}: sample rate must be greater than zero",
                self.index
            )));
        }
        if self.voltage_mv.is_empty() {
            return Err(AnalysisError::data(format!(
                "sweep {}: voltage channel is empty",
                self.index
            )));
        }
        if self.voltage_mv.len() != self.current_pa.len() {
            return Err(AnalysisError::data(format!(
                "sweep {}: channel length mismatch (voltage {}, current {})",
                self.index,
                self.voltage_mv.len(),
                self.current_pa.len()
            )));
        }
        if self
            .voltage_mv
            .iter()
            .chain(&self.current_pa)
            .any(|v| !v.is_finite())
        {
            return Err(AnalysisError::data(format!(
                "sweep {}: non-finite samples",
                self.index
            )));
        }
        let n = self.len();
        if let Some(step) = self.steps.iter().find(|s| s.start > s.end || s.end > n) {
            return Err(AnalysisError::data(format!(
                "sweep {}: command step {}..{} outside {} samples",
                self.index, step.start, step.end, n
            )));
        }
        Ok(())
    }
    pub fn len(&self) -> usize {
        self.voltage_mv.len()
    }
    pub fn is_empty(&self) -> bool {
        self.voltage_mv.is_empty()
    }
    pub fn duration_s(&self) -> f64 {
        self.len() as f64 / self.sample_rate_hz
    }
    /// Junction potential correction.
    pub fn offset_voltage(&mut self, offset_mv: f64) {
        if offset_mv != 0.0 {
            self.voltage_mv.iter_mut().for_each(|v| *v -= offset_mv);
        }
    }
}
/// Which analog inputs and command output carry the current-clamp signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelMap {
    pub voltage: usize,
    pub current: usize,
    pub command: usize,
}
impl Default for ChannelMap {
    fn default() -> Self {
        Self {
            voltage: 0,
            current: 1,
            command: 0,
        }
    }
}
#[derive(Clone, Debug, Default)]
pub struct RecordingInfo {
    pub path: PathBuf,
    /// File stem; stored in records so plots can find the recording again.
    pub name: String,
    pub timestamp: Option<NaiveDateTime>,
    pub sample_rate_hz: f64,
    pub sweep_count: usize,
    pub channel_names: Vec<String>,
}
/// Anything that can hand out sweeps of a current-clamp recording.
pub trait RecordingSource {
    fn info(&self) -> &RecordingInfo;
    fn read_sweep(&mut self, index: usize, channels: &ChannelMap) -> Result<Sweep>;
    fn sweep_count(&self) -> usize {
        self.info().sweep_count
    }
    /// Resolves an optional sweep span against the recording bounds.
    fn sweep_range(&self, range: Option<Range<usize>>) -> Result<Range<usize>> {
        let available = self.sweep_count();
        let range = range.unwrap_or(0..available);
        if range.start >= range.end || range.end > available {
            return Err(AnalysisError::Range {
                start: range.start,
                end: range.end,
                available,
            });
        }
        Ok(range)
    }
}
/// In-memory source useful for tests and deterministic playback.
pub struct ManualRecording {
    info: RecordingInfo,
    sweeps: Vec<Sweep>,
}
impl ManualRecording {
    pub fn new(name: &str, sweeps: impl IntoIterator<Item = Sweep>) -> Self {
        let sweeps: Vec<Sweep> = sweeps.into_iter().collect();
        let info = RecordingInfo {
            path: PathBuf::from(name),
            name: name.to_string(),
            timestamp: None,
            sample_rate_hz: sweeps.first().map(|s| s.sample_rate_hz).unwrap_or(0.0),
            sweep_count: sweeps.len(),
            channel_names: vec!["Vm".into(), "Im".into()],
        };
        Self { info, sweeps }
    }
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.info.timestamp = Some(timestamp);
        self
    }
}
impl RecordingSource for ManualRecording {
    fn info(&self) -> &RecordingInfo {
        &self.info
    }
    fn read_sweep(&mut self, index: usize, _channels: &ChannelMap) -> Result<Sweep> {
        self.sweeps
            .get(index)
            .cloned()
            .ok_or(AnalysisError::Range {
                start: index,
                end: index + 1,
                available: self.sweeps.len(),
            })
    }
}
