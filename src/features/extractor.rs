use std::ops::Range;
use log::{debug, info};
use crate::config::{ExtractConfig, SpikeConfig};
use crate::error::Result;
use crate::features::firing::{self, FiPoint, FiRelation, SweepFiring};
use crate::features::interval::Interval;
use crate::features::passive::{self, IvPoint, MOHM_PER_MV_PER_PA};
use crate::features::spikes::{self, SweepSpikes};
use crate::features::stats::{self, LinearFit};
use crate::recording::{ChannelMap, RecordingSource, Sweep};
use crate::record::{
    EpochRecord, FirstSpikeStats, IvSteps, IvStats, ProtocolStats, SpikingStats, Stimulus,
    Trial, PPROX_SCHEMA,
};
/// Identifies the epoch a record belongs to.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EpochId {
    pub cell: String,
    pub epoch: u32,
}
impl EpochId {
    pub fn new(cell: impl Into<String>, epoch: u32) -> Self {
        Self {
            cell: cell.into(),
            epoch,
        }
    }
}
/// Everything measured on one sweep before epoch-level aggregation.
struct SweepAnalysis {
    sweep: Sweep,
    spikes: SweepSpikes,
    events: Vec<f64>,
    intervals: Vec<Interval>,
    iv: Vec<IvPoint>,
    firing: SweepFiring,
    stimulus_current: Option<f64>,
    rm: Option<f64>,
    rs: Option<f64>,
    tau: Option<f64>,
    cm: Option<f64>,
}
/// Turns a span of sweeps into an [`EpochRecord`].
pub struct EpochExtractor {
    config: ExtractConfig,
}
impl EpochExtractor {
    pub fn new(config: ExtractConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
    fn channels(&self) -> ChannelMap {
        ChannelMap {
            voltage: self.config.voltage_channel,
            current: self.config.current_channel,
            command: self.config.command_channel,
        }
    }
    /// Reads the sweeps in `range` (all sweeps when `None`) with the
    /// junction-potential correction applied.
    pub fn read_sweeps<S: RecordingSource>(
        &self,
        source: &mut S,
        range: Option<Range<usize>>,
    ) -> Result<Vec<Sweep>> {
        let range = source.sweep_range(range)?;
        let channels = self.channels();
        range
            .map(|index| {
                let mut sweep = source.read_sweep(index, &channels)?;
                sweep.validate()?;
                sweep.offset_voltage(self.config.junction_potential_mv);
                Ok(sweep)
            })
            .collect()
    }
    pub fn extract<S: RecordingSource>(
        &self,
        source: &mut S,
        id: &EpochId,
        range: Option<Range<usize>>,
    ) -> Result<EpochRecord> {
        let sweeps = self.read_sweeps(source, range)?;
        let info = source.info();
        info!("- {} epoch {}: {} ({} sweeps)", id.cell, id.epoch, info.name, sweeps.len());
        let step_tables: Vec<&[crate::recording::StimulusStep]> =
            sweeps.iter().map(|s| s.steps.as_slice()).collect();
        let stimulus = self
            .config
            .stimulus_step
            .or_else(|| firing::select_stimulus(&step_tables));
        match stimulus {
            Some(k) => debug!("  - stimulus: command step {k}"),
            None => debug!("  - stimulus: none found"),
        }
        let mut analyses: Vec<SweepAnalysis> = sweeps
            .into_iter()
            .map(|sweep| self.analyze_sweep(sweep, stimulus))
            .collect();
        let excluded = match self.config.max_vm_deviance {
            Some(max) => {
                let steps: Vec<Vec<IvPoint>> = analyses.iter().map(|a| a.iv.clone()).collect();
                passive::deviant_sweeps(&steps, stimulus.map(|k| k + 1), max)
            }
            None => vec![false; analyses.len()],
        };
        for (analysis, &flag) in analyses.iter().zip(&excluded) {
            if flag {
                info!("  - sweep {}: excluded (baseline deviance)", analysis.sweep.index);
            }
        }
        let included: Vec<usize> = (0..analyses.len()).filter(|&i| !excluded[i]).collect();
        let slopes = {
            let currents: Vec<Option<f64>> =
                included.iter().map(|&i| analyses[i].stimulus_current).collect();
            let rates: Vec<Option<f64>> =
                included.iter().map(|&i| analyses[i].firing.firing_rate).collect();
            firing::rate_slopes(&currents, &rates)
        };
        let mut rate_slope = vec![None; analyses.len()];
        for (&i, slope) in included.iter().zip(slopes) {
            rate_slope[i] = slope;
        }
        let protocol = self.protocol_stats(&analyses, stimulus);
        let iv = iv_stats(&analyses, &included);
        let spiking = spiking_stats(&analyses, &included);
        info!(
            "  - Rm={} MΩ, Vm={} mV, rheobase={} pA, slope={} Hz/pA",
            fmt_opt(iv.rm),
            fmt_opt(iv.vm),
            fmt_opt(spiking.rheobase),
            fmt_opt(spiking.slope)
        );
        let pprox = analyses
            .iter_mut()
            .enumerate()
            .map(|(i, a)| trial(a, stimulus, rate_slope[i], excluded[i]))
            .collect();
        Ok(EpochRecord {
            schema: PPROX_SCHEMA.to_string(),
            source: info.path.display().to_string(),
            cell: id.cell.clone(),
            epoch: id.epoch,
            abf_file: info.name.clone(),
            timestamp: info.timestamp,
            version: env!("CARGO_PKG_VERSION").to_string(),
            protocol,
            iv,
            spiking,
            pprox,
        })
    }
    fn analyze_sweep(&self, sweep: Sweep, stimulus: Option<usize>) -> SweepAnalysis {
        let rate = sweep.sample_rate_hz;
        let passive_config = &self.config.passive;
        debug!("- sweep {}", sweep.index);
        let spikes = spikes::detect(&sweep.voltage_mv, &self.config.spikes, rate);
        let events = spikes.times(rate);
        let intervals = passive::step_intervals(&sweep);
        let fraction = passive_config.steady_state_fraction;
        let iv = passive::iv_steps(&sweep, &intervals, &events, fraction);
        let stimulus_interval = stimulus.and_then(|k| intervals.get(k + 1));
        let stimulus_current = stimulus_interval.and_then(|s| s.mean_of(&sweep.current_pa, None));
        let firing = firing::sweep_firing(&events, stimulus_interval, spikes.shape.as_ref());
        let rm = passive::iv_fit(&iv).map(|fit| fit.slope * MOHM_PER_MV_PER_PA);
        let hyper = passive::hyperpolarizing_step(&intervals, &iv).map(|k| intervals[k]);
        let rs = hyper.and_then(|step| {
            let delay = SpikeConfig::samples(passive_config.rs_delay_ms, rate);
            passive::series_resistance(&sweep, &step, delay, passive_config.steady_state_fraction)
        });
        let tau = hyper.and_then(|step| {
            passive::time_constant(
                &sweep,
                &step,
                passive_config.min_deflection_mv,
                passive_config.steady_state_fraction,
            )
        });
        let cm = tau.zip(rm).and_then(|(tau, rm)| passive::capacitance(tau, rm));
        debug!(
            "  - spikes={}, evoked={}, Rm={} MΩ, Rs={} MΩ, tau={} ms",
            events.len(),
            firing.n_evoked,
            fmt_opt(rm),
            fmt_opt(rs),
            fmt_opt(tau)
        );
        SweepAnalysis {
            sweep,
            spikes,
            events,
            intervals,
            iv,
            firing,
            stimulus_current,
            rm,
            rs,
            tau,
            cm,
        }
    }
    fn protocol_stats(&self, analyses: &[SweepAnalysis], stimulus: Option<usize>) -> ProtocolStats {
        let first = analyses.first();
        ProtocolStats {
            sampling_rate_hz: first.map_or(0.0, |a| a.sweep.sample_rate_hz),
            sweep_duration_s: first.map_or(0.0, |a| a.sweep.duration_s()),
            n_sweeps: analyses.len(),
            first_sweep: first.map_or(0, |a| a.sweep.index),
            stimulus_step: stimulus,
            stimulus_interval: stimulus
                .and_then(|k| first.and_then(|a| a.intervals.get(k + 1)))
                .map(|s| {
                    let (start, end) = s.times();
                    [start, end]
                }),
            junction_potential_mv: self.config.junction_potential_mv,
        }
    }
}
fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}
fn iv_stats(analyses: &[SweepAnalysis], included: &[usize]) -> IvStats {
    let pick = |f: fn(&SweepAnalysis) -> Option<f64>| -> Vec<f64> {
        stats::defined(included.iter().map(|&i| f(&analyses[i])))
    };
    let points: Vec<(f64, f64)> = included
        .iter()
        .flat_map(|&i| analyses[i].iv.iter().filter_map(IvPoint::defined))
        .collect();
    let fit = LinearFit::fit(&points);
    if fit.is_none() {
        debug!("  - Rm: fewer than two distinct step currents");
    }
    let rm = pick(|a| a.rm);
    let rs = pick(|a| a.rs);
    let vm = pick(|a| a.iv.first().and_then(|p| p.voltage_mv));
    IvStats {
        rm: fit.map(|f| f.slope * MOHM_PER_MV_PER_PA),
        rm_sd: stats::sample_sd(&rm),
        v0: fit.map(|f| f.intercept),
        rs: stats::mean(&rs),
        rs_sd: stats::sample_sd(&rs),
        vm: stats::mean(&vm),
        vm_sd: stats::sample_sd(&vm),
        tau: stats::mean(&pick(|a| a.tau)),
        cm: stats::mean(&pick(|a| a.cm)),
        n_points: points.len(),
    }
}
fn spiking_stats(analyses: &[SweepAnalysis], included: &[usize]) -> SpikingStats {
    let pick = |f: fn(&SweepAnalysis) -> Option<f64>| -> Vec<f64> {
        stats::defined(included.iter().map(|&i| f(&analyses[i])))
    };
    let fi: Vec<FiPoint> = included
        .iter()
        .filter_map(|&i| {
            let a = &analyses[i];
            Some(FiPoint {
                index: a.sweep.index,
                current_pa: a.stimulus_current?,
                rate_hz: a.firing.firing_rate?,
                n_evoked: a.firing.n_evoked,
            })
        })
        .collect();
    let relation = FiRelation::from_points(&fi);
    let durations = pick(|a| a.firing.firing_duration);
    SpikingStats {
        rheobase: relation.rheobase,
        slope: relation.slope,
        rate_max: stats::max(&pick(|a| a.firing.firing_rate)),
        duration_max: stats::max(&durations),
        duration_mean: stats::mean(&durations),
        duration_sd: stats::sample_sd(&durations),
        spike_width: stats::mean(&pick(|a| a.spikes.shape.and_then(|s| s.width_ms))),
        spike_trough: stats::mean(&pick(|a| a.spikes.shape.and_then(|s| s.trough_ms))),
        n_evoked: included.iter().map(|&i| analyses[i].firing.n_evoked).sum(),
        n_spont: included.iter().map(|&i| analyses[i].firing.n_spont).sum(),
        n_excluded: analyses.len() - included.len(),
    }
}
fn trial(
    a: &mut SweepAnalysis,
    stimulus: Option<usize>,
    rate_slope: Option<f64>,
    excluded: bool,
) -> Trial {
    let sweep = &a.sweep;
    let first = a.spikes.first;
    Trial {
        index: sweep.index,
        offset: sweep.start_s,
        interval: [0.0, sweep.duration_s()],
        events: std::mem::take(&mut a.events),
        stimulus: stimulus
            .and_then(|k| a.intervals.get(k + 1))
            .map(|s| {
                let (start, end) = s.times();
                Stimulus {
                    interval: [start, end],
                    current: a.stimulus_current,
                }
            }),
        steps: IvSteps {
            current: a.iv.iter().map(|p| p.current_pa).collect(),
            voltage: a.iv.iter().map(|p| p.voltage_mv).collect(),
        },
        spike_base: first.map(|f| f.base),
        spike_thresh: first.map(|f| f.thresh),
        first_spike: a.spikes.shape.map(|s| FirstSpikeStats {
            peak: s.peak_mv,
            width: s.width_ms,
            trough_t: s.trough_ms,
            trough_v: s.trough_mv,
        }),
        firing_rate: a.firing.firing_rate,
        firing_rate_slope: rate_slope,
        firing_duration: a.firing.firing_duration,
        first_spike_latency: a.firing.first_spike_latency,
        n_evoked: a.firing.n_evoked,
        n_spont: a.firing.n_spont,
        rm: a.rm,
        rs: a.rs,
        vm: a.iv.first().and_then(|p| p.voltage_mv),
        tau: a.tau,
        cm: a.cm,
        excluded,
    }
}
