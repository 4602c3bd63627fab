//! Small descriptive statistics used by the extractor. All of them return
//! `None` instead of NaN when the statistic is undefined for the input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
/// Sample standard deviation (n - 1 denominator).
pub fn sample_sd(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>();
    Some((ss / (values.len() - 1) as f64).sqrt())
}
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}
/// Collects the defined entries of an optional series.
pub fn defined(values: impl IntoIterator<Item = Option<f64>>) -> Vec<f64> {
    values.into_iter().flatten().collect()
}
/// Ordinary least-squares line `y = slope * x + intercept`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}
impl LinearFit {
    /// Needs at least two distinct x values.
    pub fn fit(points: &[(f64, f64)]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let mx = points.iter().map(|p| p.0).sum::<f64>() / n;
        let my = points.iter().map(|p| p.1).sum::<f64>() / n;
        let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
            (sxx + (x - mx) * (x - mx), sxy + (x - mx) * (y - my))
        });
        if sxx <= f64::EPSILON * n * mx.abs().max(1.0) {
            return None;
        }
        let slope = sxy / sxx;
        Some(Self {
            slope,
            intercept: my - slope * mx,
        })
    }
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn descriptive_stats() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        assert!((sample_sd(&values).unwrap() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(median(&values), Some(4.5));
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(max(&values), Some(9.0));
    }
    #[test]
    fn undefined_inputs_give_none() {
        assert_eq!(mean(&[]), None);
        assert_eq!(sample_sd(&[1.0]), None);
        assert_eq!(median(&[]), None);
        assert_eq!(max(&[]), None);
        assert_eq!(defined([Some(1.0), None, Some(3.0)]), vec![1.0, 3.0]);
    }
    #[test]
    fn fit_recovers_known_line() {
        let points: Vec<(f64, f64)> = [-40.0, -20.0, 0.0, 25.0, 60.0]
            .iter()
            .map(|&x| (x, 0.25 * x - 68.0))
            .collect();
        let fit = LinearFit::fit(&points).unwrap();
        assert!((fit.slope - 0.25).abs() < 1e-12);
        assert!((fit.intercept + 68.0).abs() < 1e-12);
        assert!((fit.at(10.0) + 65.5).abs() < 1e-12);
    }
    #[test]
    fn fit_needs_distinct_x() {
        assert!(LinearFit::fit(&[(1.0, 2.0)]).is_none());
        assert!(LinearFit::fit(&[(5.0, 1.0), (5.0, 3.0)]).is_none());
    }
}
