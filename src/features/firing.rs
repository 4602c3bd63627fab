//! Firing statistics: per-sweep spike counts and rates inside the stimulus,
//! and the firing-rate / current relation across an epoch.
use log::debug;
use crate::features::interval::Interval;
use crate::features::spikes::SpikeShape;
use crate::features::stats::LinearFit;
use crate::recording::StimulusStep;
/// Index of the command step that carries the stimulus: the first step whose
/// level changes across sweeps, else the first depolarizing step.
pub fn select_stimulus(steps: &[&[StimulusStep]]) -> Option<usize> {
    let n_steps = steps.iter().map(|s| s.len()).min()?;
    let varies = (0..n_steps).find(|&k| {
        let first = steps[0][k].level_pa;
        steps.iter().any(|s| (s[k].level_pa - first).abs() > 1e-9)
    });
    varies.or_else(|| (0..n_steps).find(|&k| steps[0][k].level_pa > 0.0))
}
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SweepFiring {
    pub n_evoked: usize,
    pub n_spont: usize,
    /// Hz.
    pub firing_rate: Option<f64>,
    /// Seconds.
    pub firing_duration: Option<f64>,
    /// Seconds from stimulus onset.
    pub first_spike_latency: Option<f64>,
}
/// Without a stimulus every spike counts as spontaneous.
pub fn sweep_firing(
    events: &[f64],
    stimulus: Option<&Interval>,
    shape: Option<&SpikeShape>,
) -> SweepFiring {
    let Some(stimulus) = stimulus.filter(|s| !s.is_empty()) else {
        return SweepFiring {
            n_spont: events.len(),
            ..SweepFiring::default()
        };
    };
    let (onset, _) = stimulus.times();
    let evoked: Vec<f64> = stimulus.events_within(events).collect();
    let firing_duration = match evoked.as_slice() {
        [] => None,
        [_] => shape
            .and_then(|s| s.width_ms.zip(s.trough_ms))
            .map(|(width, trough)| (width + trough) / 1000.0),
        [first, .., last] => Some(last - first),
    };
    SweepFiring {
        n_evoked: evoked.len(),
        n_spont: events.iter().filter(|&&t| t < onset).count(),
        firing_rate: Some(evoked.len() as f64 / stimulus.duration_s()),
        firing_duration,
        first_spike_latency: evoked.first().map(|t| t - onset),
    }
}
/// Change in rate per pA against the previous sweep, from the first sweep
/// that fires onward.
pub fn rate_slopes(currents: &[Option<f64>], rates: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut slopes = vec![None; rates.len()];
    let Some(first) = rates.iter().position(|r| r.map_or(false, |r| r > 0.0)) else {
        return slopes;
    };
    for i in first.max(1)..rates.len() {
        let pair = (currents[i - 1], currents[i], rates[i - 1], rates[i]);
        let (Some(i0), Some(i1), Some(r0), Some(r1)) = pair else {
            continue;
        };
        if (i1 - i0).abs() > f64::EPSILON {
            slopes[i] = Some((r1 - r0) / (i1 - i0));
        }
    }
    slopes
}
/// One sweep's contribution to the firing-rate / current relation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FiPoint {
    pub index: usize,
    pub current_pa: f64,
    pub rate_hz: f64,
    pub n_evoked: usize,
}
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FiRelation {
    /// pA, midpoint between the last silent and the first firing sweep.
    pub rheobase: Option<f64>,
    /// Hz / pA.
    pub slope: Option<f64>,
}
impl FiRelation {
    pub fn from_points(points: &[FiPoint]) -> Self {
        let mut sorted = points.to_vec();
        sorted.sort_by(|a, b| a.current_pa.total_cmp(&b.current_pa).then(a.index.cmp(&b.index)));
        let Some(k) = sorted.iter().position(|p| p.n_evoked > 0) else {
            debug!("  - rheobase: no evoked spikes");
            return Self::default();
        };
        let rheobase = if k == 0 {
            debug!("  - rheobase: lowest current already evokes spikes");
            None
        } else {
            Some((sorted[k - 1].current_pa + sorted[k].current_pa) / 2.0)
        };
        let fit: Vec<(f64, f64)> = sorted[k.saturating_sub(1)..]
            .iter()
            .map(|p| (p.current_pa, p.rate_hz))
            .collect();
        let slope = LinearFit::fit(&fit).map(|f| f.slope);
        if slope.is_none() {
            debug!("  - slope: fewer than two distinct currents");
        }
        Self { rheobase, slope }
    }
}
