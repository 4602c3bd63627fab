//! The per-epoch record: a pprox point-process document with the epoch's
//! summary statistics alongside the trials.
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use crate::atomic::write_atomic;
use crate::error::{AnalysisError, Result};
pub const PPROX_SCHEMA: &str = "https://meliza.org/spec:2/pprox.json#";
pub const RECORD_EXTENSION: &str = "pprox";
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    #[serde(rename = "$schema")]
    pub schema: String,
    /// Path of the recording the epoch was extracted from.
    pub source: String,
    pub cell: String,
    pub epoch: u32,
    pub abf_file: String,
    pub timestamp: Option<NaiveDateTime>,
    /// Version of the extractor that wrote the record.
    pub version: String,
    pub protocol: ProtocolStats,
    pub iv: IvStats,
    pub spiking: SpikingStats,
    pub pprox: Vec<Trial>,
}
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtocolStats {
    pub sampling_rate_hz: f64,
    pub sweep_duration_s: f64,
    pub n_sweeps: usize,
    pub first_sweep: usize,
    pub stimulus_step: Option<usize>,
    /// Seconds from sweep onset.
    pub stimulus_interval: Option<[f64; 2]>,
    pub junction_potential_mv: f64,
}
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IvStats {
    /// MΩ, slope of the pooled fit.
    #[serde(rename = "Rm")]
    pub rm: Option<f64>,
    #[serde(rename = "Rm_sd")]
    pub rm_sd: Option<f64>,
    /// mV, intercept of the pooled fit.
    #[serde(rename = "V0")]
    pub v0: Option<f64>,
    #[serde(rename = "Rs")]
    pub rs: Option<f64>,
    #[serde(rename = "Rs_sd")]
    pub rs_sd: Option<f64>,
    #[serde(rename = "Vm")]
    pub vm: Option<f64>,
    #[serde(rename = "Vm_sd")]
    pub vm_sd: Option<f64>,
    /// ms
    pub tau: Option<f64>,
    /// pF
    #[serde(rename = "Cm")]
    pub cm: Option<f64>,
    pub n_points: usize,
}
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpikingStats {
    /// pA
    pub rheobase: Option<f64>,
    /// Hz / pA
    pub slope: Option<f64>,
    pub rate_max: Option<f64>,
    pub duration_max: Option<f64>,
    pub duration_mean: Option<f64>,
    pub duration_sd: Option<f64>,
    /// ms, mean over sweeps with a first spike.
    pub spike_width: Option<f64>,
    pub spike_trough: Option<f64>,
    pub n_evoked: usize,
    pub n_spont: usize,
    pub n_excluded: usize,
}
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    pub interval: [f64; 2],
    /// Mean measured current over the step, pA.
    #[serde(rename = "I")]
    pub current: Option<f64>,
}
/// Steady-state current (pA) and voltage (mV) of each step, baseline first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IvSteps {
    #[serde(rename = "I")]
    pub current: Vec<Option<f64>>,
    #[serde(rename = "V")]
    pub voltage: Vec<Option<f64>>,
}
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FirstSpikeStats {
    pub peak: f64,
    pub width: Option<f64>,
    pub trough_t: Option<f64>,
    pub trough_v: Option<f64>,
}
/// One sweep of the epoch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub index: usize,
    /// Sweep onset relative to the start of the recording, s.
    pub offset: f64,
    pub interval: [f64; 2],
    /// Spike times, s from sweep onset.
    pub events: Vec<f64>,
    pub stimulus: Option<Stimulus>,
    pub steps: IvSteps,
    pub spike_base: Option<f64>,
    pub spike_thresh: Option<f64>,
    pub first_spike: Option<FirstSpikeStats>,
    pub firing_rate: Option<f64>,
    pub firing_rate_slope: Option<f64>,
    pub firing_duration: Option<f64>,
    pub first_spike_latency: Option<f64>,
    pub n_evoked: usize,
    pub n_spont: usize,
    #[serde(rename = "Rm")]
    pub rm: Option<f64>,
    #[serde(rename = "Rs")]
    pub rs: Option<f64>,
    #[serde(rename = "Vm")]
    pub vm: Option<f64>,
    pub tau: Option<f64>,
    #[serde(rename = "Cm")]
    pub cm: Option<f64>,
    pub excluded: bool,
}
/// `<cell>_<epoch>.pprox`, with path separators in the cell id replaced.
pub fn record_file_name(cell: &str, epoch: u32) -> String {
    let cell = cell.replace(['/', '\\'], "_");
    format!("{cell}_{epoch}.{RECORD_EXTENSION}")
}
impl EpochRecord {
    pub fn file_name(&self) -> String {
        record_file_name(&self.cell, self.epoch)
    }
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
    /// Writes the record into `dir`, replacing any earlier record of the epoch.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.file_name());
        let json = self.to_json()?;
        write_atomic(&path, |w| {
            w.write_all(json.as_bytes())
                .and_then(|_| w.write_all(b"\n"))
                .map_err(|e| AnalysisError::io(&path, e))
        })?;
        Ok(path)
    }
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| AnalysisError::io(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            AnalysisError::data(format!("{}: not a valid record: {e}", path.display()))
        })
    }
}
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    pub(crate) fn sample_record(cell: &str, epoch: u32) -> EpochRecord {
        let trial = |index: usize, current: f64, events: Vec<f64>| Trial {
            index,
            offset: index as f64 * 2.0,
            interval: [0.0, 1.0],
            firing_rate: Some(events.len() as f64 / 0.5),
            n_evoked: events.len(),
            events,
            stimulus: Some(Stimulus {
                interval: [0.2, 0.7],
                current: Some(current),
            }),
            steps: IvSteps {
                current: vec![Some(0.0), Some(current), Some(-20.0)],
                voltage: vec![Some(-70.0), None, Some(-72.0)],
            },
            vm: Some(-70.0),
            rm: Some(100.0),
            ..Trial::default()
        };
        EpochRecord {
            schema: PPROX_SCHEMA.into(),
            source: format!("{cell}/recording.abf"),
            cell: cell.into(),
            epoch,
            abf_file: "recording".into(),
            timestamp: NaiveDate::from_ymd_opt(2022, 9, 23)
                .and_then(|d| d.and_hms_milli_opt(13, 5, 7, 250))
                .map(|t| t + chrono::Duration::seconds(60 * epoch as i64)),
            version: "test".into(),
            protocol: ProtocolStats {
                sampling_rate_hz: 10_000.0,
                sweep_duration_s: 1.0,
                n_sweeps: 2,
                stimulus_step: Some(0),
                stimulus_interval: Some([0.2, 0.7]),
                junction_potential_mv: 11.6,
                ..ProtocolStats::default()
            },
            iv: IvStats {
                rm: Some(100.0),
                v0: Some(-70.0),
                vm: Some(-70.0),
                rs: Some(12.5 * epoch as f64),
                n_points: 4,
                ..IvStats::default()
            },
            spiking: SpikingStats {
                rheobase: Some(75.0),
                n_evoked: 4,
                ..SpikingStats::default()
            },
            pprox: vec![
                trial(0, 50.0, vec![]),
                trial(1, 100.0, vec![0.25, 0.35, 0.45, 0.55]),
            ],
        }
    }
    #[test]
    fn file_name_is_keyed_by_cell_and_epoch() {
        assert_eq!(record_file_name("C104-a", 3), "C104-a_3.pprox");
        assert_eq!(record_file_name("site/C104", 1), "site_C104_1.pprox");
    }
    #[test]
    fn round_trip_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let record = sample_record("C104", 2);
        let path = record.write_to_dir(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("C104_2.pprox"));
        let back = EpochRecord::read(&path).unwrap();
        assert_eq!(back, record);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
    #[test]
    fn undefined_values_are_null() {
        let record = sample_record("C104", 1);
        let value: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(value["$schema"], PPROX_SCHEMA);
        assert!(value["spiking"]["slope"].is_null());
        assert!(value["pprox"][0]["steps"]["V"][1].is_null());
        assert_eq!(value["iv"]["Rm"], 100.0);
    }
    #[test]
    fn rewriting_replaces_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let mut record = sample_record("C104", 1);
        record.write_to_dir(dir.path()).unwrap();
        record.spiking.rheobase = None;
        let path = record.write_to_dir(dir.path()).unwrap();
        assert_eq!(EpochRecord::read(&path).unwrap().spiking.rheobase, None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
    #[test]
    fn garbage_is_a_data_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pprox");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(EpochRecord::read(&path), Err(AnalysisError::Data(_))));
    }
}
