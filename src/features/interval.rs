use std::ops::Range;
use crate::features::stats;
use crate::recording::StimulusStep;
/// Half-open span of samples within a sweep, with helpers for selecting
/// samples and testing event times against it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub start: usize,
    pub end: usize,
    pub sample_rate_hz: f64,
}
impl Interval {
    pub fn new(start: usize, end: usize, sample_rate_hz: f64) -> Self {
        Self {
            start,
            end: end.max(start),
            sample_rate_hz,
        }
    }
    pub fn of_step(step: &StimulusStep, sample_rate_hz: f64) -> Self {
        Self::new(step.start, step.end, sample_rate_hz)
    }
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
    pub fn len(&self) -> usize {
        self.end - self.start
    }
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
    /// Start and end in seconds from sweep onset.
    pub fn times(&self) -> (f64, f64) {
        (
            self.start as f64 / self.sample_rate_hz,
            self.end as f64 / self.sample_rate_hz,
        )
    }
    pub fn duration_s(&self) -> f64 {
        self.len() as f64 / self.sample_rate_hz
    }
    pub fn contains_time(&self, t: f64) -> bool {
        let (start, end) = self.times();
        t >= start && t < end
    }
    pub fn contains_any(&self, events: &[f64]) -> bool {
        events.iter().any(|&t| self.contains_time(t))
    }
    pub fn events_within<'a>(&self, events: &'a [f64]) -> impl Iterator<Item = f64> + 'a {
        let (start, end) = self.times();
        events.iter().copied().filter(move |&t| t >= start && t < end)
    }
    /// The trailing `fraction` of the interval (at least one sample).
    pub fn tail(&self, fraction: f64) -> Self {
        let keep = ((self.len() as f64 * fraction).round() as usize).clamp(1, self.len().max(1));
        Self::new(self.end.saturating_sub(keep).max(self.start), self.end, self.sample_rate_hz)
    }
    /// Mean of the samples in the interval, undefined if any event falls inside.
    pub fn mean_of(&self, series: &[f64], events: Option<&[f64]>) -> Option<f64> {
        if events.map(|e| self.contains_any(e)).unwrap_or(false) {
            return None;
        }
        series.get(self.range()).and_then(stats::mean)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn times_and_membership() {
        let interval = Interval::new(2000, 7000, 10_000.0);
        assert_eq!(interval.times(), (0.2, 0.7));
        assert!((interval.duration_s() - 0.5).abs() < 1e-12);
        assert!(interval.contains_time(0.2));
        assert!(!interval.contains_time(0.7));
        assert_eq!(interval.events_within(&[0.1, 0.25, 0.69, 0.9]).count(), 2);
    }
    #[test]
    fn tail_keeps_trailing_fraction() {
        let interval = Interval::new(2000, 7000, 10_000.0);
        assert_eq!(interval.tail(0.5).range(), 4500..7000);
        assert_eq!(interval.tail(1.0).range(), 2000..7000);
        assert_eq!(Interval::new(5, 6, 1.0).tail(0.1).range(), 5..6);
    }
    #[test]
    fn mean_is_undefined_when_events_overlap() {
        let series: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let interval = Interval::new(2, 6, 1.0);
        assert_eq!(interval.mean_of(&series, None), Some(3.5));
        assert_eq!(interval.mean_of(&series, Some(&[7.0])), Some(3.5));
        assert_eq!(interval.mean_of(&series, Some(&[3.0])), None);
        assert_eq!(Interval::new(8, 20, 1.0).mean_of(&series, None), None);
    }
}
