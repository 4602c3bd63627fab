//! Two-stage spike detection on a membrane-potential trace.
//!
//! The first spike in a sweep is found with a fixed trigger level. Its
//! takeoff (the point of sharpest upward bend before the peak) gives the
//! spike base, and the height above that base sets a dynamic threshold
//! that all spikes in the sweep, including the first, must cross.
use log::debug;
use crate::config::SpikeConfig;
/// First spike of a sweep, as sample indices into the trace.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FirstSpike {
    pub peak: usize,
    pub thresh: f64,
    pub takeoff: usize,
    pub base: f64,
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spike {
    pub peak: usize,
    /// Peak position refined to a fraction of a sample.
    pub position: f64,
    pub peak_mv: f64,
}
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpikeShape {
    pub peak_mv: f64,
    /// Full width at half height above the spike base.
    pub width_ms: Option<f64>,
    /// Time from peak to the after-hyperpolarization minimum.
    pub trough_ms: Option<f64>,
    pub trough_mv: Option<f64>,
}
#[derive(Clone, Debug, Default)]
pub struct SweepSpikes {
    pub first: Option<FirstSpike>,
    pub spikes: Vec<Spike>,
    pub shape: Option<SpikeShape>,
}
impl SweepSpikes {
    /// Spike times in seconds from sweep onset.
    pub fn times(&self, sample_rate_hz: f64) -> Vec<f64> {
        self.spikes
            .iter()
            .map(|s| s.position / sample_rate_hz)
            .collect()
    }
}
fn argmax(v: &[f64], from: usize, to: usize) -> usize {
    (from..to).fold(from, |best, i| if v[i] > v[best] { i } else { best })
}
fn argmin(v: &[f64], from: usize, to: usize) -> usize {
    (from..to).fold(from, |best, i| if v[i] < v[best] { i } else { best })
}
/// Vertex offset of the parabola through the peak and its neighbours.
fn parabolic_offset(v: &[f64], peak: usize) -> f64 {
    if peak == 0 || peak + 1 >= v.len() {
        return 0.0;
    }
    let (a, b, c) = (v[peak - 1], v[peak], v[peak + 1]);
    let curvature = a - 2.0 * b + c;
    if curvature >= 0.0 {
        return 0.0;
    }
    (0.5 * (a - c) / curvature).clamp(-0.5, 0.5)
}
pub struct SpikeFinder {
    n_rise: usize,
    n_before: usize,
    n_after: usize,
}
impl SpikeFinder {
    pub fn new(n_rise: usize, n_before: usize, n_after: usize) -> Self {
        Self {
            n_rise: n_rise.max(1),
            n_before: n_before.max(1),
            n_after: n_after.max(1),
        }
    }
    pub fn from_config(config: &SpikeConfig, sample_rate_hz: f64) -> Self {
        Self::new(
            SpikeConfig::samples(config.rise_ms, sample_rate_hz),
            SpikeConfig::samples(config.analysis_window_ms[0], sample_rate_hz),
            SpikeConfig::samples(config.analysis_window_ms[1], sample_rate_hz),
        )
    }
    /// Locates the first spike and derives the dynamic threshold from it.
    pub fn calculate_threshold(
        &self,
        v: &[f64],
        thresh_rel: f64,
        thresh_min: f64,
    ) -> Option<FirstSpike> {
        let cross = (1..v.len()).find(|&i| v[i] >= thresh_min && v[i - 1] < thresh_min)?;
        let peak = argmax(v, cross, (cross + self.n_rise).min(v.len()));
        let from = peak.saturating_sub(self.n_rise).max(1);
        let takeoff = (from..peak).fold(None, |best: Option<(usize, f64)>, j| {
            let bend = v[j + 1] - 2.0 * v[j] + v[j - 1];
            match best {
                Some((_, b)) if b >= bend => best,
                _ => Some((j, bend)),
            }
        });
        let takeoff = takeoff.map(|(j, _)| j).unwrap_or(peak);
        let base = v[takeoff];
        let thresh = (base + thresh_rel * (v[peak] - base)).max(thresh_min);
        Some(FirstSpike {
            peak,
            thresh,
            takeoff,
            base,
        })
    }
    /// Every upward crossing of `thresh` whose peak rises at least
    /// `min_amplitude` above the trace minimum in the rise window before it.
    pub fn extract_spikes(&self, v: &[f64], thresh: f64, min_amplitude: f64) -> Vec<Spike> {
        let mut spikes = Vec::new();
        let mut i = 1;
        while i < v.len() {
            if v[i] >= thresh && v[i - 1] < thresh {
                let mut end = i;
                while end < v.len() && v[end] >= thresh {
                    end += 1;
                }
                let peak = argmax(v, i, end);
                let floor = v[argmin(v, i.saturating_sub(self.n_rise), i + 1)];
                if v[peak] - floor >= min_amplitude {
                    spikes.push(Spike {
                        peak,
                        position: peak as f64 + parabolic_offset(v, peak),
                        peak_mv: v[peak],
                    });
                }
                i = end.max(i + 1);
                continue;
            }
            i += 1;
        }
        spikes
    }
    pub fn shape(&self, v: &[f64], peak: usize, base: f64, sample_rate_hz: f64) -> SpikeShape {
        let to_ms = 1000.0 / sample_rate_hz;
        let half = base + (v[peak] - base) / 2.0;
        let left = (peak.saturating_sub(self.n_before)..peak)
            .rev()
            .find(|&j| v[j] < half)
            .map(|j| j as f64 + (half - v[j]) / (v[j + 1] - v[j]));
        let stop = (peak + self.n_after).min(v.len());
        let right = (peak + 1..stop)
            .find(|&j| v[j] < half)
            .map(|j| (j - 1) as f64 + (v[j - 1] - half) / (v[j - 1] - v[j]));
        let (trough_ms, trough_mv) = if peak + 1 < stop {
            let trough = argmin(v, peak + 1, stop);
            (Some((trough - peak) as f64 * to_ms), Some(v[trough]))
        } else {
            (None, None)
        };
        SpikeShape {
            peak_mv: v[peak],
            width_ms: left.zip(right).map(|(l, r)| (r - l) * to_ms),
            trough_ms,
            trough_mv,
        }
    }
}
/// Runs both detection stages on one sweep.
pub fn detect(v: &[f64], config: &SpikeConfig, sample_rate_hz: f64) -> SweepSpikes {
    let finder = SpikeFinder::from_config(config, sample_rate_hz);
    let first = finder.calculate_threshold(v, config.spike_thresh_rel, config.spike_thresh_min_mv);
    let Some(first) = first else {
        debug!("  ✗ no spikes");
        return SweepSpikes::default();
    };
    if v[first.peak] - first.base < config.first_spike_amplitude_min_mv {
        debug!("  ✗ first spike amplitude is too low");
        return SweepSpikes::default();
    }
    debug!(
        "  - first spike: time={:.1} ms, peak={:.1} mV, base={:.1} mV, takeoff=-{:.2} ms",
        first.peak as f64 * 1000.0 / sample_rate_hz,
        v[first.peak],
        first.base,
        (first.peak - first.takeoff) as f64 * 1000.0 / sample_rate_hz
    );
    let spikes = finder.extract_spikes(v, first.thresh, config.spike_amplitude_min_mv);
    let shape = spikes
        .first()
        .map(|s| finder.shape(v, s.peak, first.base, sample_rate_hz));
    SweepSpikes {
        first: Some(first),
        spikes,
        shape,
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::fixtures::{SweepBuilder, RATE_HZ};
    #[test]
    fn finds_exact_spike_times() {
        let sweep = SweepBuilder::new(0, 100.0)
            .spikes_at(&[2500, 3500, 4500, 5500])
            .build();
        let found = detect(&sweep.voltage_mv, &SpikeConfig::default(), RATE_HZ);
        assert_eq!(found.times(RATE_HZ), vec![0.25, 0.35, 0.45, 0.55]);
        let first = found.first.unwrap();
        assert_eq!(first.peak, 2500);
        assert_eq!(first.takeoff, 2496);
        assert!((first.base + 60.0).abs() < 1e-9);
        assert!((first.thresh + 28.5).abs() < 1e-9);
    }
    #[test]
    fn measures_first_spike_shape() {
        let sweep = SweepBuilder::new(0, 100.0).spikes_at(&[3000]).build();
        let found = detect(&sweep.voltage_mv, &SpikeConfig::default(), RATE_HZ);
        let shape = found.shape.unwrap();
        assert!((shape.peak_mv - 30.0).abs() < 1e-9);
        assert!((shape.width_ms.unwrap() - 0.35).abs() < 1e-9);
        assert!((shape.trough_ms.unwrap() - 0.4).abs() < 1e-9);
        assert!((shape.trough_mv.unwrap() + 60.0).abs() < 1e-9);
    }
    #[test]
    fn quiet_trace_has_no_spikes() {
        let sweep = SweepBuilder::new(0, 50.0).build();
        let found = detect(&sweep.voltage_mv, &SpikeConfig::default(), RATE_HZ);
        assert!(found.first.is_none());
        assert!(found.spikes.is_empty());
        assert!(found.shape.is_none());
    }
    #[test]
    fn small_first_event_is_rejected() {
        let config = SpikeConfig {
            first_spike_amplitude_min_mv: 120.0,
            ..SpikeConfig::default()
        };
        let sweep = SweepBuilder::new(0, 100.0).spikes_at(&[2500]).build();
        let found = detect(&sweep.voltage_mv, &config, RATE_HZ);
        assert!(found.spikes.is_empty());
    }
    #[test]
    fn parabolic_refinement_moves_toward_larger_neighbour() {
        let v = [0.0, 8.0, 10.0, 9.0, 0.0];
        let offset = parabolic_offset(&v, 2);
        assert!(offset > 0.0 && offset < 0.5);
        assert_eq!(parabolic_offset(&v, 0), 0.0);
    }
    #[test]
    fn subsequent_spikes_need_minimum_amplitude() {
        let finder = SpikeFinder::new(3, 5, 5);
        // second bump crosses the threshold but only rises 6 mV from its floor
        let v = [-60.0, -60.0, -60.0, 20.0, -34.0, -34.0, -32.0, -28.0, -32.0, -32.0];
        let spikes = finder.extract_spikes(&v, -30.0, 10.0);
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].peak, 3);
    }
}
