use std::io::Cursor;
use std::ops::Range;
use std::path::Path;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::coord::Shift;
use plotters::prelude::*;
use crate::config::ExtractConfig;
use crate::error::{AnalysisError, Result};
use crate::features::EpochExtractor;
use crate::record::EpochRecord;
use crate::recording::{AbfFile, Sweep};
#[derive(Clone, Debug)]
pub struct PlotStyle {
    pub width: u32,
    pub height: u32,
    pub background: RGBColor,
    pub trace: RGBColor,
    pub spike: RGBColor,
    pub current: RGBColor,
    /// Colour for sweeps left out of the epoch statistics.
    pub excluded: RGBColor,
    /// Time window in seconds; the whole sweep when `None`.
    pub xlim: Option<(f64, f64)>,
    /// Overlay the voltage traces instead of stacking them.
    pub combine: bool,
    pub time_bar_s: f64,
    pub voltage_bar_mv: f64,
    pub current_bar_pa: f64,
}
impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            width: 900,
            height: 1200,
            background: WHITE,
            trace: BLACK,
            spike: BLUE,
            current: RGBColor(90, 90, 90),
            excluded: RED,
            xlim: None,
            combine: false,
            time_bar_s: 0.1,
            voltage_bar_mv: 20.0,
            current_bar_pa: 50.0,
        }
    }
}
/// Reopens the recording a record was extracted from and reads its sweeps
/// through the channels in `config`, with the record's junction potential.
pub fn load_sweeps(record: &EpochRecord, config: &ExtractConfig) -> Result<Vec<Sweep>> {
    let mut abf = AbfFile::open(Path::new(&record.source))?;
    let extractor = EpochExtractor::new(ExtractConfig {
        junction_potential_mv: record.protocol.junction_potential_mv,
        ..config.clone()
    })?;
    let first = record.protocol.first_sweep;
    extractor.read_sweeps(&mut abf, Some(first..first + record.protocol.n_sweeps))
}
fn bounds(values: impl Iterator<Item = f64>) -> Option<Range<f64>> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return None;
    }
    if hi - lo < f64::EPSILON {
        return Some(lo - 1.0..hi + 1.0);
    }
    let pad = (hi - lo) * 0.02;
    Some(lo - pad..hi + pad)
}
fn trace_points<'a>(
    samples: &'a [f64],
    rate: f64,
    offset: f64,
    window: &'a Range<f64>,
) -> impl Iterator<Item = (f64, f64)> + 'a {
    samples
        .iter()
        .enumerate()
        .map(move |(i, v)| (i as f64 / rate, v + offset))
        .filter(move |(t, _)| window.contains(t))
}
fn time_window(sweeps: &[Sweep], record: &EpochRecord, style: &PlotStyle) -> Result<Range<f64>> {
    let window = match style.xlim {
        Some((start, end)) => start..end,
        None => {
            let duration = sweeps
                .iter()
                .map(Sweep::duration_s)
                .fold(record.protocol.sweep_duration_s, f64::max);
            0.0..duration
        }
    };
    if !(window.end > window.start) || !window.start.is_finite() || !window.end.is_finite() {
        return Err(AnalysisError::Plot(format!(
            "empty time window {:.3}..{:.3} s",
            window.start, window.end
        )));
    }
    Ok(window)
}
/// Spike raster on top, voltage traces offset by the largest trace range
/// (or overlaid when combined) in the middle, command currents overlaid at
/// the bottom. Only trials of the given sweeps are drawn. No text is drawn.
pub fn render_epoch_png(
    record: &EpochRecord,
    sweeps: &[Sweep],
    style: &PlotStyle,
) -> Result<Vec<u8>> {
    if sweeps.is_empty() {
        return Err(AnalysisError::Plot("no sweeps to plot".into()));
    }
    let window = time_window(sweeps, record, style)?;
    let offset = if style.combine {
        0.0
    } else {
        sweeps
            .iter()
            .filter_map(|s| bounds(s.voltage_mv.iter().copied()))
            .map(|r| r.end - r.start)
            .fold(0.0, f64::max)
    };
    let excluded = |index: usize| record.pprox.iter().any(|t| t.index == index && t.excluded);
    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        root.fill(&style.background)?;
        let (raster_area, rest) = root.split_vertically(style.height / 5);
        let (voltage_area, current_area) = rest.split_vertically(style.height * 3 / 5);
        draw_raster(&raster_area, record, sweeps, &window, style)?;
        let v_range = bounds(sweeps.iter().enumerate().flat_map(|(k, s)| {
            s.voltage_mv.iter().map(move |v| v + k as f64 * offset)
        }))
        .ok_or_else(|| AnalysisError::Plot("voltage traces are empty".into()))?;
        let mut chart = ChartBuilder::on(&voltage_area)
            .margin(10)
            .build_cartesian_2d(window.clone(), v_range.clone())?;
        for (k, sweep) in sweeps.iter().enumerate() {
            let color = if excluded(sweep.index) { style.excluded } else { style.trace };
            chart.draw_series(LineSeries::new(
                trace_points(&sweep.voltage_mv, sweep.sample_rate_hz, k as f64 * offset, &window),
                &color,
            ))?;
        }
        chart.draw_series(scale_bar(&window, &v_range, style.voltage_bar_mv, style))?;
        let i_range = bounds(sweeps.iter().flat_map(|s| s.current_pa.iter().copied()))
            .ok_or_else(|| AnalysisError::Plot("current traces are empty".into()))?;
        let mut chart = ChartBuilder::on(&current_area)
            .margin(10)
            .build_cartesian_2d(window.clone(), i_range.clone())?;
        for sweep in sweeps {
            chart.draw_series(LineSeries::new(
                trace_points(&sweep.current_pa, sweep.sample_rate_hz, 0.0, &window),
                &style.current,
            ))?;
        }
        chart.draw_series(scale_bar(&window, &i_range, style.current_bar_pa, style))?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}
/// L-shaped bar in the lower right corner: `height` units up, `time_bar_s` across.
fn scale_bar(
    window: &Range<f64>,
    y_range: &Range<f64>,
    height: f64,
    style: &PlotStyle,
) -> std::iter::Once<PathElement<(f64, f64)>> {
    let x0 = window.end - (window.end - window.start) * 0.02 - style.time_bar_s;
    let y0 = y_range.start + (y_range.end - y_range.start) * 0.05;
    std::iter::once(PathElement::new(
        vec![(x0, y0 + height), (x0, y0), (x0 + style.time_bar_s, y0)],
        style.trace.stroke_width(2),
    ))
}
fn draw_raster(
    area: &DrawingArea<BitMapBackend, Shift>,
    record: &EpochRecord,
    sweeps: &[Sweep],
    window: &Range<f64>,
    style: &PlotStyle,
) -> Result<()> {
    let trials: Vec<_> = record
        .pprox
        .iter()
        .filter(|t| sweeps.iter().any(|s| s.index == t.index))
        .collect();
    let rows = trials.len().max(1) as f64;
    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .build_cartesian_2d(window.clone(), 0f64..rows)?;
    for (row, trial) in trials.into_iter().enumerate() {
        let color = if trial.excluded { style.excluded } else { style.spike };
        let y = row as f64;
        chart.draw_series(trial.events.iter().filter(|t| window.contains(*t)).map(|&t| {
            PathElement::new(vec![(t, y + 0.1), (t, y + 0.9)], color.stroke_width(2))
        }))?;
    }
    Ok(())
}
/// Keeps the sweeps whose index is listed; all of them when `indices` is empty.
pub fn select_sweeps(sweeps: Vec<Sweep>, indices: &[usize]) -> Vec<Sweep> {
    if indices.is_empty() {
        return sweeps;
    }
    sweeps.into_iter().filter(|s| indices.contains(&s.index)).collect()
}
fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| AnalysisError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    let dynamic = DynamicImage::ImageRgb8(image);
    dynamic.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
