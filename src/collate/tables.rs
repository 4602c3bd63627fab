use std::collections::BTreeMap;
use chrono::NaiveDateTime;
use serde::Serialize;
use crate::record::{EpochRecord, Trial};
/// One row per epoch: the record's aggregates plus changes relative to the
/// cell's first epoch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EpochRow {
    pub cell: String,
    pub epoch: u32,
    pub abf_file: String,
    pub timestamp: Option<NaiveDateTime>,
    /// Seconds since the cell's first timestamped epoch.
    pub time: Option<f64>,
    pub n_sweeps: usize,
    pub n_excluded: usize,
    pub stimulus_start: Option<f64>,
    pub stimulus_end: Option<f64>,
    #[serde(rename = "Rm")]
    pub rm: Option<f64>,
    #[serde(rename = "Rm_sd")]
    pub rm_sd: Option<f64>,
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
    pub tau: Option<f64>,
    #[serde(rename = "Cm")]
    pub cm: Option<f64>,
    pub n_iv_points: usize,
    pub rheobase: Option<f64>,
    pub slope: Option<f64>,
    pub rate_max: Option<f64>,
    pub duration_max: Option<f64>,
    pub duration_mean: Option<f64>,
    pub duration_sd: Option<f64>,
    pub spike_width: Option<f64>,
    pub spike_trough: Option<f64>,
    pub n_evoked: usize,
    pub n_spont: usize,
    #[serde(rename = "delta_Rs")]
    pub delta_rs: Option<f64>,
    #[serde(rename = "delta_Rm")]
    pub delta_rm: Option<f64>,
    #[serde(rename = "delta_Vm")]
    pub delta_vm: Option<f64>,
    /// Spikes recorded in all earlier epochs of the cell.
    pub cum_spikes: usize,
}
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SweepRow {
    pub cell: String,
    pub epoch: u32,
    pub sweep: usize,
    pub offset: f64,
    pub excluded: bool,
    pub stimulus_start: Option<f64>,
    pub stimulus_end: Option<f64>,
    #[serde(rename = "stimulus_I")]
    pub stimulus_current: Option<f64>,
    pub n_events: usize,
    pub n_evoked: usize,
    pub n_spont: usize,
    pub firing_rate: Option<f64>,
    pub firing_rate_slope: Option<f64>,
    pub firing_duration: Option<f64>,
    pub first_spike_latency: Option<f64>,
    pub spike_base: Option<f64>,
    pub spike_thresh: Option<f64>,
    pub spike_peak: Option<f64>,
    pub spike_width: Option<f64>,
    pub spike_trough_t: Option<f64>,
    pub spike_trough_v: Option<f64>,
    #[serde(rename = "Rm")]
    pub rm: Option<f64>,
    #[serde(rename = "Rs")]
    pub rs: Option<f64>,
    #[serde(rename = "Vm")]
    pub vm: Option<f64>,
    pub tau: Option<f64>,
    #[serde(rename = "Cm")]
    pub cm: Option<f64>,
}
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IvRow {
    pub cell: String,
    pub epoch: u32,
    pub sweep: usize,
    pub step: usize,
    pub excluded: bool,
    #[serde(rename = "I")]
    pub current: Option<f64>,
    #[serde(rename = "V")]
    pub voltage: Option<f64>,
}
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tables {
    pub epochs: Vec<EpochRow>,
    pub sweeps: Vec<SweepRow>,
    pub iv: Vec<IvRow>,
}
fn relative_change(value: Option<f64>, reference: Option<f64>) -> Option<f64> {
    let (value, reference) = value.zip(reference)?;
    (reference != 0.0).then(|| (value - reference) / reference)
}
fn epoch_row(record: &EpochRecord) -> EpochRow {
    let stimulus = record.protocol.stimulus_interval;
    EpochRow {
        cell: record.cell.clone(),
        epoch: record.epoch,
        abf_file: record.abf_file.clone(),
        timestamp: record.timestamp,
        time: None,
        n_sweeps: record.pprox.len(),
        n_excluded: record.spiking.n_excluded,
        stimulus_start: stimulus.map(|s| s[0]),
        stimulus_end: stimulus.map(|s| s[1]),
        rm: record.iv.rm,
        rm_sd: record.iv.rm_sd,
        v0: record.iv.v0,
        rs: record.iv.rs,
        rs_sd: record.iv.rs_sd,
        vm: record.iv.vm,
        vm_sd: record.iv.vm_sd,
        tau: record.iv.tau,
        cm: record.iv.cm,
        n_iv_points: record.iv.n_points,
        rheobase: record.spiking.rheobase,
        slope: record.spiking.slope,
        rate_max: record.spiking.rate_max,
        duration_max: record.spiking.duration_max,
        duration_mean: record.spiking.duration_mean,
        duration_sd: record.spiking.duration_sd,
        spike_width: record.spiking.spike_width,
        spike_trough: record.spiking.spike_trough,
        n_evoked: record.spiking.n_evoked,
        n_spont: record.spiking.n_spont,
        delta_rs: None,
        delta_rm: None,
        delta_vm: None,
        cum_spikes: 0,
    }
}
fn sweep_row(record: &EpochRecord, trial: &Trial) -> SweepRow {
    let stimulus = trial.stimulus.as_ref();
    let spike = trial.first_spike.as_ref();
    SweepRow {
        cell: record.cell.clone(),
        epoch: record.epoch,
        sweep: trial.index,
        offset: trial.offset,
        excluded: trial.excluded,
        stimulus_start: stimulus.map(|s| s.interval[0]),
        stimulus_end: stimulus.map(|s| s.interval[1]),
        stimulus_current: stimulus.and_then(|s| s.current),
        n_events: trial.events.len(),
        n_evoked: trial.n_evoked,
        n_spont: trial.n_spont,
        firing_rate: trial.firing_rate,
        firing_rate_slope: trial.firing_rate_slope,
        firing_duration: trial.firing_duration,
        first_spike_latency: trial.first_spike_latency,
        spike_base: trial.spike_base,
        spike_thresh: trial.spike_thresh,
        spike_peak: spike.map(|s| s.peak),
        spike_width: spike.and_then(|s| s.width),
        spike_trough_t: spike.and_then(|s| s.trough_t),
        spike_trough_v: spike.and_then(|s| s.trough_v),
        rm: trial.rm,
        rs: trial.rs,
        vm: trial.vm,
        tau: trial.tau,
        cm: trial.cm,
    }
}
fn iv_rows<'a>(record: &'a EpochRecord, trial: &'a Trial) -> impl Iterator<Item = IvRow> + 'a {
    let steps = &trial.steps;
    (0..steps.current.len().max(steps.voltage.len())).map(move |step| IvRow {
        cell: record.cell.clone(),
        epoch: record.epoch,
        sweep: trial.index,
        step,
        excluded: trial.excluded,
        current: steps.current.get(step).copied().flatten(),
        voltage: steps.voltage.get(step).copied().flatten(),
    })
}
impl Tables {
    /// Records must already be unique by (cell, epoch).
    pub fn from_records(records: &[EpochRecord]) -> Self {
        let mut by_cell: BTreeMap<&str, Vec<&EpochRecord>> = BTreeMap::new();
        for record in records {
            by_cell.entry(record.cell.as_str()).or_default().push(record);
        }
        let mut tables = Tables::default();
        for epochs in by_cell.values_mut() {
            epochs.sort_by_key(|r| r.epoch);
            let reference = epochs[0];
            let first_time = epochs.iter().find_map(|r| r.timestamp);
            let mut cum_spikes = 0;
            for &record in epochs.iter() {
                let mut row = epoch_row(record);
                row.time = record
                    .timestamp
                    .zip(first_time)
                    .map(|(t, t0)| (t - t0).num_milliseconds() as f64 / 1000.0);
                row.delta_rs = relative_change(record.iv.rs, reference.iv.rs);
                row.delta_rm = relative_change(record.iv.rm, reference.iv.rm);
                row.delta_vm = record.iv.vm.zip(reference.iv.vm).map(|(v, v0)| v - v0);
                row.cum_spikes = cum_spikes;
                cum_spikes += record.pprox.iter().map(|t| t.events.len()).sum::<usize>();
                tables.epochs.push(row);
                let mut trials: Vec<&Trial> = record.pprox.iter().collect();
                trials.sort_by_key(|t| t.index);
                for trial in trials {
                    tables.sweeps.push(sweep_row(record, trial));
                    tables.iv.extend(iv_rows(record, trial));
                }
            }
        }
        tables
    }
}
