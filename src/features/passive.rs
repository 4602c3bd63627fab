//! Passive membrane properties from the sub-threshold parts of a sweep.
//!
//! Voltages are in mV and currents in pA, so a V-on-I slope comes out in
//! GΩ; multiply by [`MOHM_PER_MV_PER_PA`] to report MΩ.
use log::debug;
use crate::features::interval::Interval;
use crate::features::stats::{self, LinearFit};
use crate::recording::Sweep;
/// mV / pA expressed in megaohms.
pub const MOHM_PER_MV_PER_PA: f64 = 1000.0;
/// Fraction of the full deflection reached after one time constant.
const ONE_TAU: f64 = 0.632_120_558_828_557_7;
/// Baseline window before a step onset used for the pre-step level.
const PRE_STEP_MS: f64 = 1.0;
/// Steady-state current and voltage of one step; `None` where undefined.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IvPoint {
    pub current_pa: Option<f64>,
    pub voltage_mv: Option<f64>,
}
impl IvPoint {
    pub fn defined(&self) -> Option<(f64, f64)> {
        self.current_pa.zip(self.voltage_mv)
    }
}
/// Holding baseline followed by every command step.
pub fn step_intervals(sweep: &Sweep) -> Vec<Interval> {
    let rate = sweep.sample_rate_hz;
    let baseline_end = sweep
        .steps
        .first()
        .map(|s| s.start)
        .unwrap_or(sweep.len());
    std::iter::once(Interval::new(0, baseline_end, rate))
        .chain(sweep.steps.iter().map(|s| Interval::of_step(s, rate)))
        .collect()
}
pub fn iv_steps(
    sweep: &Sweep,
    intervals: &[Interval],
    events: &[f64],
    fraction: f64,
) -> Vec<IvPoint> {
    intervals
        .iter()
        .map(|interval| {
            if interval.contains_any(events) {
                return IvPoint::default();
            }
            let tail = interval.tail(fraction);
            IvPoint {
                current_pa: tail.mean_of(&sweep.current_pa, None),
                voltage_mv: tail.mean_of(&sweep.voltage_mv, None),
            }
        })
        .collect()
}
/// OLS fit of V on I over the defined steps; slope in mV/pA.
pub fn iv_fit(points: &[IvPoint]) -> Option<LinearFit> {
    let pairs: Vec<(f64, f64)> = points.iter().filter_map(IvPoint::defined).collect();
    LinearFit::fit(&pairs)
}
/// First command step whose measured current lies below the holding current.
pub fn hyperpolarizing_step(intervals: &[Interval], points: &[IvPoint]) -> Option<usize> {
    let holding = points.first()?.current_pa?;
    (1..intervals.len()).find(|&k| {
        !intervals[k].is_empty()
            && points
                .get(k)
                .and_then(|p| p.current_pa)
                .map_or(false, |i| i < holding)
    })
}
fn pre_step(sweep: &Sweep, step: &Interval) -> Interval {
    let n = ((PRE_STEP_MS * sweep.sample_rate_hz / 1000.0) as usize).max(1);
    Interval::new(step.start.saturating_sub(n), step.start, sweep.sample_rate_hz)
}
/// Instantaneous voltage jump at step onset over the current change (MΩ).
pub fn series_resistance(
    sweep: &Sweep,
    step: &Interval,
    delay_samples: usize,
    fraction: f64,
) -> Option<f64> {
    let pre = pre_step(sweep, step);
    if pre.is_empty() || delay_samples >= step.len() {
        return None;
    }
    let v_pre = pre.mean_of(&sweep.voltage_mv, None)?;
    let i_pre = pre.mean_of(&sweep.current_pa, None)?;
    let i_step = step.tail(fraction).mean_of(&sweep.current_pa, None)?;
    let delta_i = i_step - i_pre;
    if delta_i.abs() < f64::EPSILON {
        return None;
    }
    let v_jump = sweep.voltage_mv[step.start + delay_samples] - v_pre;
    Some(v_jump / delta_i * MOHM_PER_MV_PER_PA)
}
/// Time for the voltage to cover 63.2 % of its steady-state deflection (ms).
pub fn time_constant(
    sweep: &Sweep,
    step: &Interval,
    min_deflection_mv: f64,
    fraction: f64,
) -> Option<f64> {
    let v = &sweep.voltage_mv;
    let v0 = pre_step(sweep, step).mean_of(v, None)?;
    let v_ss = step.tail(fraction).mean_of(v, None)?;
    let deflection = v_ss - v0;
    if deflection.abs() < min_deflection_mv {
        debug!("  - tau: deflection of {deflection:.2} mV is too small");
        return None;
    }
    let target = v0 + ONE_TAU * deflection;
    let passed = |j: usize| (v[j] - target) * deflection.signum() >= 0.0;
    let j = step.range().find(|&j| passed(j))?;
    if j == step.start {
        debug!("  - tau: no measurable relaxation");
        return None;
    }
    let frac = (target - v[j - 1]) / (v[j] - v[j - 1]);
    let samples = (j - 1 - step.start) as f64 + frac;
    Some(samples * 1000.0 / sweep.sample_rate_hz)
}
/// Membrane capacitance (pF) from tau (ms) and input resistance (MΩ).
pub fn capacitance(tau_ms: f64, rm_mohm: f64) -> Option<f64> {
    if rm_mohm <= 0.0 {
        return None;
    }
    Some(tau_ms / rm_mohm * 1000.0)
}
/// Flags sweeps whose step voltages stray from the across-sweep median by
/// more than `max_deviance` median absolute deviations. The stimulus step is
/// ignored because its voltage is expected to change from sweep to sweep.
pub fn deviant_sweeps(
    steps: &[Vec<IvPoint>],
    stimulus: Option<usize>,
    max_deviance: f64,
) -> Vec<bool> {
    let mut flagged = vec![false; steps.len()];
    if steps.len() < 3 {
        return flagged;
    }
    let n_steps = steps.iter().map(Vec::len).min().unwrap_or(0);
    for k in (0..n_steps).filter(|&k| Some(k) != stimulus) {
        let values = stats::defined(steps.iter().map(|s| s[k].voltage_mv));
        let Some(median) = stats::median(&values) else {
            continue;
        };
        let deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
        let Some(mad) = stats::median(&deviations).filter(|m| *m > 0.0) else {
            continue;
        };
        for (i, sweep) in steps.iter().enumerate() {
            if let Some(v) = sweep[k].voltage_mv {
                if (v - median).abs() / mad > max_deviance {
                    flagged[i] = true;
                }
            }
        }
    }
    flagged
}
