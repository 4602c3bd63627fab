//! Synthetic current-clamp sweeps with hand-placed steps and spikes.
//!
//! Default layout at 10 kHz, 1 s per sweep: holding 0..2000, stimulus step
//! 2000..7000 at the requested level, rest 7000..8000, a -20 pA test pulse
//! 8000..9000 and rest again to the end. The membrane is ohmic with
//! `resistance` mV/pA unless a time constant is given.
use crate::recording::{ManualRecording, StimulusStep, Sweep};
pub const RATE_HZ: f64 = 10_000.0;
pub const SWEEP_SAMPLES: usize = 10_000;
pub const STIM: (usize, usize) = (2000, 7000);
pub const PULSE: (usize, usize) = (8000, 9000);
pub const PULSE_PA: f64 = -20.0;
/// Peak-relative spike waveform added to the membrane potential.
const SPIKE_SHAPE: [f64; 7] = [20.0, 40.0, 60.0, 90.0, 60.0, 40.0, 20.0];
pub struct SweepBuilder {
    index: usize,
    stim_pa: f64,
    rest_mv: f64,
    resistance: f64,
    series_resistance: f64,
    tau_samples: Option<f64>,
    spikes: Vec<usize>,
    steps: Option<Vec<StimulusStep>>,
}
impl SweepBuilder {
    pub fn new(index: usize, stim_pa: f64) -> Self {
        Self {
            index,
            stim_pa,
            rest_mv: -70.0,
            resistance: 0.1,
            series_resistance: 0.0,
            tau_samples: None,
            spikes: Vec::new(),
            steps: None,
        }
    }
    pub fn rest_mv(mut self, rest_mv: f64) -> Self {
        self.rest_mv = rest_mv;
        self
    }
    pub fn resistance(mut self, mv_per_pa: f64) -> Self {
        self.resistance = mv_per_pa;
        self
    }
    pub fn series_resistance(mut self, mv_per_pa: f64) -> Self {
        self.series_resistance = mv_per_pa;
        self
    }
    pub fn tau_ms(mut self, tau_ms: f64) -> Self {
        self.tau_samples = Some(tau_ms * RATE_HZ / 1000.0);
        self
    }
    /// Spike peaks, in samples from sweep onset.
    pub fn spikes_at(mut self, peaks: &[usize]) -> Self {
        self.spikes = peaks.to_vec();
        self
    }
    pub fn steps(mut self, steps: Vec<StimulusStep>) -> Self {
        self.steps = Some(steps);
        self
    }
    pub fn build(self) -> Sweep {
        let steps = self.steps.clone().unwrap_or_else(|| {
            vec![
                StimulusStep {
                    start: STIM.0,
                    end: STIM.1,
                    level_pa: self.stim_pa,
                },
                StimulusStep {
                    start: PULSE.0,
                    end: PULSE.1,
                    level_pa: PULSE_PA,
                },
            ]
        });
        let current_pa: Vec<f64> = (0..SWEEP_SAMPLES)
            .map(|i| {
                steps
                    .iter()
                    .find(|s| i >= s.start && i < s.end)
                    .map(|s| s.level_pa)
                    .unwrap_or(0.0)
            })
            .collect();
        let mut membrane = self.rest_mv;
        let mut voltage_mv: Vec<f64> = current_pa
            .iter()
            .map(|&i| {
                let target = self.rest_mv + self.resistance * i;
                membrane = match self.tau_samples {
                    Some(tau) => target + (membrane - target) * (-1.0 / tau).exp(),
                    None => target,
                };
                membrane + self.series_resistance * i
            })
            .collect();
        for &peak in &self.spikes {
            let base = voltage_mv[peak];
            for (k, rise) in SPIKE_SHAPE.iter().enumerate() {
                if let Some(v) = (peak + k).checked_sub(3).and_then(|j| voltage_mv.get_mut(j)) {
                    *v = base + rise;
                }
            }
        }
        Sweep {
            index: self.index,
            start_s: self.index as f64 * 2.0,
            sample_rate_hz: RATE_HZ,
            voltage_mv,
            current_pa,
            steps,
        }
    }
}
/// Current-step series: one sweep per level, spikes placed per sweep.
pub fn step_series(levels: &[f64], spikes: &[&[usize]]) -> ManualRecording {
    let sweeps = levels.iter().enumerate().map(|(i, &level)| {
        SweepBuilder::new(i, level)
            .spikes_at(spikes.get(i).copied().unwrap_or(&[]))
            .build()
    });
    ManualRecording::new("synthetic", sweeps)
}
