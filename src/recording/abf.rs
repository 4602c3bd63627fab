//! Reader for Axon Binary Format 2 files written by Clampex.
//!
//! Only what the current-clamp analysis needs is decoded: the protocol
//! section (operation mode, sampling interval, sweep length), the ADC and
//! DAC channel tables with their names and units, the per-DAC epoch table
//! that describes the command waveform, and the sample data.
//!
//! All multi-byte values are little-endian. Sections are addressed in
//! 512-byte blocks through the section map that follows the fixed header.
use std::path::Path;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use ndarray::{Array2, ArrayView1};
use crate::error::{AnalysisError, Result};
use crate::recording::source::{
    ChannelMap, RecordingInfo, RecordingSource, StimulusStep, Sweep,
};
const BLOCK_SIZE: usize = 512;
const SIGNATURE_V1: [u8; 4] = *b"ABF ";
const SIGNATURE_V2: [u8; 4] = *b"ABF2";
// section map entries (block index u32, byte size u32, entry count i64)
const PROTOCOL_SECTION: usize = 76;
const ADC_SECTION: usize = 92;
const DAC_SECTION: usize = 108;
const EPOCH_PER_DAC_SECTION: usize = 156;
const STRINGS_SECTION: usize = 220;
const DATA_SECTION: usize = 236;
// deepest byte read from each table entry
const ADC_ENTRY_MIN: usize = 82;
const DAC_ENTRY_MIN: usize = 32;
const EPOCH_ENTRY_MIN: usize = 22;
const EPOCH_TYPE_DISABLED: i16 = 0;
const EPOCH_TYPE_STEP: i16 = 1;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationMode {
    VariableLengthEvents,
    FixedLengthEvents,
    GapFree,
    HighSpeedOscilloscope,
    Episodic,
    Other(i16),
}
impl From<i16> for OperationMode {
    fn from(value: i16) -> Self {
        match value {
            1 => OperationMode::VariableLengthEvents,
            2 => OperationMode::FixedLengthEvents,
            3 => OperationMode::GapFree,
            4 => OperationMode::HighSpeedOscilloscope,
            5 => OperationMode::Episodic,
            other => OperationMode::Other(other),
        }
    }
}
#[derive(Clone, Copy, Debug, Default)]
struct Section {
    block: u32,
    bytes: u32,
    entries: i64,
}
impl Section {
    fn offset(&self) -> usize {
        self.block as usize * BLOCK_SIZE
    }
    fn entry(&self, k: usize) -> usize {
        self.offset() + k * self.bytes as usize
    }
    fn count(&self) -> usize {
        usize::try_from(self.entries).unwrap_or(0)
    }
    /// Entry count of a table whose entries are read up to `min_entry`
    /// bytes deep, checked against the file length before anything is read.
    fn table_len(&self, file_len: usize, min_entry: usize, what: &str) -> Result<usize> {
        let count = self.count();
        if count == 0 {
            return Ok(0);
        }
        let entry = self.bytes as usize;
        if entry < min_entry {
            return Err(AnalysisError::data(format!(
                "{what} entries are {entry} bytes, expected at least {min_entry}"
            )));
        }
        match count.checked_mul(entry).and_then(|n| n.checked_add(self.offset())) {
            Some(end) if end <= file_len => Ok(count),
            _ => Err(AnalysisError::data(format!(
                "{what} table of {count} entries runs past the end of the file"
            ))),
        }
    }
}
/// Bounds-checked little-endian field access.
struct Fields<'a>(&'a [u8]);
impl<'a> Fields<'a> {
    fn take<const N: usize>(&self, offset: usize) -> Result<[u8; N]> {
        self.0
            .get(offset..offset + N)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| AnalysisError::data(format!("ABF file truncated at byte {offset}")))
    }
    fn i16(&self, offset: usize) -> Result<i16> {
        self.take(offset).map(i16::from_le_bytes)
    }
    fn i32(&self, offset: usize) -> Result<i32> {
        self.take(offset).map(i32::from_le_bytes)
    }
    fn u32(&self, offset: usize) -> Result<u32> {
        self.take(offset).map(u32::from_le_bytes)
    }
    fn i64(&self, offset: usize) -> Result<i64> {
        self.take(offset).map(i64::from_le_bytes)
    }
    fn f32(&self, offset: usize) -> Result<f64> {
        self.take(offset).map(|b| f32::from_le_bytes(b) as f64)
    }
    fn section(&self, offset: usize) -> Result<Section> {
        Ok(Section {
            block: self.u32(offset)?,
            bytes: self.u32(offset + 4)?,
            entries: self.i64(offset + 8)?,
        })
    }
}
#[derive(Clone, Debug)]
struct AdcChannel {
    name: String,
    units: String,
    /// Multiplier from raw integer counts to `units`.
    gain: f64,
    offset: f64,
}
#[derive(Clone, Debug)]
struct DacChannel {
    number: i16,
    units: String,
}
#[derive(Clone, Copy, Debug)]
struct EpochDef {
    number: i16,
    dac: i16,
    kind: i16,
    init_level: f64,
    level_inc: f64,
    init_duration: i32,
    duration_inc: i32,
}
/// Multiplier to millivolts, if `units` is a voltage.
pub fn voltage_scale(units: &str) -> Option<f64> {
    match units.trim() {
        "V" => Some(1000.0),
        "mV" => Some(1.0),
        "µV" | "uV" => Some(1e-3),
        _ => None,
    }
}
/// Multiplier to picoamperes, if `units` is a current.
pub fn current_scale(units: &str) -> Option<f64> {
    match units.trim() {
        "A" => Some(1e12),
        "mA" => Some(1e9),
        "µA" | "uA" => Some(1e6),
        "nA" => Some(1e3),
        "pA" => Some(1.0),
        "fA" => Some(1e-3),
        _ => None,
    }
}
/// Clampex string table: the entries follow the last double NUL and are
/// addressed from 1.
fn parse_strings(bytes: &[u8]) -> Vec<String> {
    let start = bytes
        .windows(2)
        .rposition(|w| w == [0, 0])
        .unwrap_or(0);
    bytes[start..]
        .split(|b| *b == 0)
        .skip(1)
        // latin-1, so the micro sign survives
        .map(|s| s.iter().map(|&b| b as char).collect::<String>().trim().to_string())
        .collect()
}
fn lookup(strings: &[String], index: i32) -> String {
    usize::try_from(index)
        .ok()
        .and_then(|i| strings.get(i))
        .cloned()
        .unwrap_or_default()
}
fn parse_timestamp(date: u32, time_ms: u32) -> Option<NaiveDateTime> {
    let day = NaiveDate::from_ymd_opt((date / 10_000) as i32, (date / 100) % 100, date % 100)?;
    let (secs, ms) = (time_ms / 1000, time_ms % 1000);
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, ms * 1_000_000)?;
    Some(day.and_time(time))
}
pub struct AbfFile {
    info: RecordingInfo,
    bytes: Vec<u8>,
    mode: OperationMode,
    float_data: bool,
    data_offset: usize,
    data_entries: usize,
    points_per_sweep: usize,
    sweep_interval_s: f64,
    adc: Vec<AdcChannel>,
    dac: Vec<DacChannel>,
    epochs: Vec<EpochDef>,
}
impl AbfFile {
    pub fn open(path: &Path) -> Result<Self> {
        debug!("- reading {}", path.display());
        let bytes = std::fs::read(path).map_err(|e| AnalysisError::io(path, e))?;
        Self::from_bytes(path, bytes)
    }
    pub fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self> {
        let f = Fields(&bytes);
        let signature: [u8; 4] = f.take(0)?;
        if signature == SIGNATURE_V1 {
            return Err(AnalysisError::data(format!(
                "{}: ABF1 files are not supported",
                path.display()
            )));
        }
        if signature != SIGNATURE_V2 {
            return Err(AnalysisError::data(format!(
                "{}: not an ABF2 file",
                path.display()
            )));
        }
        let sweep_count = f.u32(12)? as usize;
        let timestamp = parse_timestamp(f.u32(16)?, f.u32(20)?);
        let float_data = f.i16(30)? == 1;
        let protocol = f.section(PROTOCOL_SECTION)?.offset();
        let mode = OperationMode::from(f.i16(protocol)?);
        let sample_interval_us = f.f32(protocol + 2)?;
        let samples_per_episode = f.i32(protocol + 22)?.max(0) as usize;
        let episode_start_to_start = f.f32(protocol + 62)?;
        let adc_range = f.f32(protocol + 110)?;
        let adc_resolution = f.i32(protocol + 118)? as f64;
        if !(sample_interval_us > 0.0) {
            return Err(AnalysisError::data(format!(
                "{}: sample interval must be greater than zero",
                path.display()
            )));
        }
        let sample_rate_hz = 1e6 / sample_interval_us;
        let strings_section = f.section(STRINGS_SECTION)?;
        let strings = bytes
            .get(strings_section.offset()..)
            .and_then(|b| b.get(..strings_section.bytes as usize))
            .map(parse_strings)
            .unwrap_or_default();
        let adc_section = f.section(ADC_SECTION)?;
        let adc_count = adc_section.table_len(bytes.len(), ADC_ENTRY_MIN, "ADC")?;
        let mut adc = Vec::with_capacity(adc_count);
        for k in 0..adc_count {
            let e = adc_section.entry(k);
            let telegraph_gain = if f.i16(e + 2)? != 0 {
                f.f32(e + 6)?
            } else {
                1.0
            };
            let total_gain = f.f32(e + 40)? * f.f32(e + 48)? * f.f32(e + 28)? * telegraph_gain;
            adc.push(AdcChannel {
                name: lookup(&strings, f.i32(e + 74)?),
                units: lookup(&strings, f.i32(e + 78)?),
                gain: if float_data {
                    1.0
                } else {
                    adc_range / adc_resolution / total_gain
                },
                offset: if float_data {
                    0.0
                } else {
                    f.f32(e + 44)? - f.f32(e + 52)?
                },
            });
        }
        if adc.is_empty() {
            return Err(AnalysisError::data(format!(
                "{}: no ADC channels",
                path.display()
            )));
        }
        let dac_section = f.section(DAC_SECTION)?;
        let dac_count = dac_section.table_len(bytes.len(), DAC_ENTRY_MIN, "DAC")?;
        let mut dac = Vec::with_capacity(dac_count);
        for k in 0..dac_count {
            let e = dac_section.entry(k);
            dac.push(DacChannel {
                number: f.i16(e)?,
                units: lookup(&strings, f.i32(e + 28)?),
            });
        }
        let epoch_section = f.section(EPOCH_PER_DAC_SECTION)?;
        let epoch_count = epoch_section.table_len(bytes.len(), EPOCH_ENTRY_MIN, "epoch")?;
        let mut epochs = Vec::with_capacity(epoch_count);
        for k in 0..epoch_count {
            let e = epoch_section.entry(k);
            epochs.push(EpochDef {
                number: f.i16(e)?,
                dac: f.i16(e + 2)?,
                kind: f.i16(e + 4)?,
                init_level: f.f32(e + 6)?,
                level_inc: f.f32(e + 10)?,
                init_duration: f.i32(e + 14)?,
                duration_inc: f.i32(e + 18)?,
            });
        }
        epochs.sort_by_key(|e| (e.dac, e.number));
        let data = f.section(DATA_SECTION)?;
        let points_per_sweep = samples_per_episode / adc.len();
        let sweep_interval_s = if episode_start_to_start > 0.0 {
            episode_start_to_start
        } else {
            points_per_sweep as f64 / sample_rate_hz
        };
        let abf = Self {
            info: RecordingInfo {
                path: path.to_path_buf(),
                name: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                timestamp,
                sample_rate_hz,
                sweep_count,
                channel_names: adc.iter().map(|c| c.name.clone()).collect(),
            },
            mode,
            float_data,
            data_offset: data.offset(),
            data_entries: data.count(),
            points_per_sweep,
            sweep_interval_s,
            adc,
            dac,
            epochs,
            bytes,
        };
        if abf.mode == OperationMode::Episodic {
            let needed = sweep_count
                .checked_mul(points_per_sweep)
                .and_then(|n| n.checked_mul(abf.adc.len()));
            let end = needed
                .and_then(|n| n.checked_mul(abf.sample_width()))
                .and_then(|n| n.checked_add(abf.data_offset));
            match (needed, end) {
                (Some(needed), Some(end))
                    if abf.data_entries >= needed && end <= abf.bytes.len() => {}
                _ => {
                    return Err(AnalysisError::data(format!(
                        "{}: data section holds {} samples, protocol needs {} sweeps of {} points",
                        path.display(),
                        abf.data_entries,
                        sweep_count,
                        points_per_sweep
                    )));
                }
            }
        }
        debug!(
            "  - {} sweeps x {} points at {:.1} kHz ({:?})",
            sweep_count,
            points_per_sweep,
            sample_rate_hz / 1000.0,
            mode
        );
        Ok(abf)
    }
    pub fn mode(&self) -> OperationMode {
        self.mode
    }
    pub fn channel_units(&self, channel: usize) -> Option<&str> {
        self.adc.get(channel).map(|c| c.units.as_str())
    }
    /// Whether a command waveform is defined on `dac` (gap-free files have none).
    pub fn has_command_waveform(&self, dac: usize) -> bool {
        self.epochs
            .iter()
            .any(|e| e.dac as usize == dac && e.kind != EPOCH_TYPE_DISABLED)
    }
    fn sample_width(&self) -> usize {
        if self.float_data {
            4
        } else {
            2
        }
    }
    fn sweep_samples(&self, index: usize) -> Result<Array2<f64>> {
        let n_channels = self.adc.len();
        let width = self.sample_width();
        let count = self.points_per_sweep * n_channels;
        let start = self.data_offset + index * count * width;
        let raw = self
            .bytes
            .get(start..start + count * width)
            .ok_or_else(|| {
                AnalysisError::data(format!("sweep {index} is past the end of the file"))
            })?;
        let values: Vec<f64> = if self.float_data {
            raw.chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect()
        } else {
            raw.chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]) as f64)
                .collect()
        };
        // samples are interleaved by channel
        Array2::from_shape_vec((self.points_per_sweep, n_channels), values)
            .map_err(|e| AnalysisError::data(format!("sweep {index}: {e}")))
    }
    fn scaled(&self, column: ArrayView1<f64>, channel: usize, to_unit: f64) -> Vec<f64> {
        let adc = &self.adc[channel];
        column
            .iter()
            .map(|raw| (raw * adc.gain + adc.offset) * to_unit)
            .collect()
    }
    fn command_steps(&self, index: usize, dac_number: usize) -> Vec<StimulusStep> {
        let scale = self
            .dac
            .iter()
            .find(|d| d.number as usize == dac_number)
            .and_then(|d| current_scale(&d.units))
            .unwrap_or(1.0);
        let n = self.points_per_sweep;
        // Clampex holds for the first 1/64 of the sweep before epoch A
        let mut position = n / 64;
        let mut steps = Vec::new();
        for epoch in self.epochs.iter().filter(|e| e.dac as usize == dac_number) {
            if epoch.kind == EPOCH_TYPE_DISABLED {
                continue;
            }
            let duration = (epoch.init_duration as i64 + index as i64 * epoch.duration_inc as i64)
                .max(0) as usize;
            let end = (position + duration).min(n);
            if epoch.kind == EPOCH_TYPE_STEP {
                steps.push(StimulusStep {
                    start: position,
                    end,
                    level_pa: (epoch.init_level + index as f64 * epoch.level_inc) * scale,
                });
            }
            position = end;
        }
        steps
    }
}
impl RecordingSource for AbfFile {
    fn info(&self) -> &RecordingInfo {
        &self.info
    }
    fn read_sweep(&mut self, index: usize, channels: &ChannelMap) -> Result<Sweep> {
        if self.mode != OperationMode::Episodic {
            return Err(AnalysisError::data(format!(
                "{}: not an episodic recording ({:?})",
                self.info.path.display(),
                self.mode
            )));
        }
        if index >= self.info.sweep_count {
            return Err(AnalysisError::Range {
                start: index,
                end: index + 1,
                available: self.info.sweep_count,
            });
        }
        let units = |channel: usize| {
            self.channel_units(channel)
                .map(str::to_owned)
                .ok_or_else(|| {
                    AnalysisError::data(format!("channel {channel} is not in the recording"))
                })
        };
        let v_units = units(channels.voltage)?;
        let to_mv = voltage_scale(&v_units).ok_or_else(|| {
            AnalysisError::data(format!(
                "not a current clamp recording (channel {} units `{}` not voltage)",
                channels.voltage, v_units
            ))
        })?;
        let i_units = units(channels.current)?;
        let to_pa = current_scale(&i_units).ok_or_else(|| {
            AnalysisError::data(format!(
                "not a current clamp recording (channel {} units `{}` not current)",
                channels.current, i_units
            ))
        })?;
        let samples = self.sweep_samples(index)?;
        let sweep = Sweep {
            index,
            start_s: index as f64 * self.sweep_interval_s,
            sample_rate_hz: self.info.sample_rate_hz,
            voltage_mv: self.scaled(samples.column(channels.voltage), channels.voltage, to_mv),
            current_pa: self.scaled(samples.column(channels.current), channels.current, to_pa),
            steps: self.command_steps(index, channels.command),
        };
        sweep.validate()?;
        Ok(sweep)
    }
}
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    const POINTS: usize = 640;
    const RATE_HZ: f64 = 20_000.0;
    const V_GAIN: f32 = 0.05; // instrument scale factor, V per V
    const I_GAIN: f32 = 0.0005;
    fn put<const N: usize>(buf: &mut Vec<u8>, offset: usize, bytes: [u8; N]) {
        if buf.len() < offset + N {
            buf.resize(offset + N, 0);
        }
        buf[offset..offset + N].copy_from_slice(&bytes);
    }
    fn put_section(buf: &mut Vec<u8>, at: usize, block: u32, bytes: u32, entries: i64) {
        put(buf, at, block.to_le_bytes());
        put(buf, at + 4, bytes.to_le_bytes());
        put(buf, at + 8, entries.to_le_bytes());
    }
    fn counts(value: f64, total_gain: f64) -> i16 {
        (value * total_gain * 32768.0 / 10.0).round() as i16
    }
    /// Two-channel episodic file. Membrane potential and current are written
    /// in the given units; command epoch A is a 100-sample step from -10 pA
    /// rising 10 pA per sweep, B is disabled and C holds -50 pA.
    #[derive(Clone, Debug)]
    pub(crate) struct SyntheticAbf {
        pub sweeps: usize,
        pub mode: i16,
        pub float_data: bool,
        pub voltage_units: &'static str,
        pub current_units: &'static str,
        pub command_units: &'static str,
        /// Telegraphed amplifier gain on the voltage channel.
        pub telegraph_gain: Option<f32>,
        /// Per-sweep change in the length of epoch A, in samples.
        pub duration_inc: i32,
    }
    impl Default for SyntheticAbf {
        fn default() -> Self {
            Self {
                sweeps: 3,
                mode: 5,
                float_data: false,
                voltage_units: "mV",
                current_units: "pA",
                command_units: "pA",
                telegraph_gain: None,
                duration_inc: 0,
            }
        }
    }
    impl SyntheticAbf {
        pub(crate) fn build(&self) -> Vec<u8> {
            let to_v = voltage_scale(self.voltage_units).unwrap_or(1.0);
            let to_i = current_scale(self.current_units).unwrap_or(1.0);
            let to_cmd = current_scale(self.command_units).unwrap_or(1.0);
            let mut buf = vec![0u8; BLOCK_SIZE];
            buf[0..4].copy_from_slice(&SIGNATURE_V2);
            put(&mut buf, 12, (self.sweeps as u32).to_le_bytes());
            put(&mut buf, 16, 20220923u32.to_le_bytes());
            put(&mut buf, 20, (13 * 3_600_000u32 + 5 * 60_000 + 7_250).to_le_bytes());
            put(&mut buf, 30, i16::from(self.float_data).to_le_bytes());
            // protocol, block 1
            let p = BLOCK_SIZE;
            put(&mut buf, p, self.mode.to_le_bytes());
            put(&mut buf, p + 2, (1e6 / RATE_HZ as f32).to_le_bytes());
            put(&mut buf, p + 22, ((POINTS * 2) as i32).to_le_bytes());
            put(&mut buf, p + 62, 1.5f32.to_le_bytes());
            put(&mut buf, p + 110, 10.0f32.to_le_bytes());
            put(&mut buf, p + 118, 32768i32.to_le_bytes());
            put_section(&mut buf, PROTOCOL_SECTION, 1, 512, 1);
            // ADC, block 2
            let a = 2 * BLOCK_SIZE;
            let telegraph = [self.telegraph_gain, None];
            for (k, (gain, name_idx)) in [(V_GAIN, 1i32), (I_GAIN, 3i32)].into_iter().enumerate() {
                let e = a + k * 128;
                put(&mut buf, e, (k as i16).to_le_bytes());
                if let Some(t) = telegraph[k] {
                    put(&mut buf, e + 2, 1i16.to_le_bytes());
                    put(&mut buf, e + 6, t.to_le_bytes());
                }
                put(&mut buf, e + 28, 1.0f32.to_le_bytes());
                put(&mut buf, e + 40, gain.to_le_bytes());
                put(&mut buf, e + 48, 1.0f32.to_le_bytes());
                put(&mut buf, e + 74, name_idx.to_le_bytes());
                put(&mut buf, e + 78, (name_idx + 1).to_le_bytes());
            }
            put_section(&mut buf, ADC_SECTION, 2, 128, 2);
            // DAC, block 3
            let d = 3 * BLOCK_SIZE;
            put(&mut buf, d, 0i16.to_le_bytes());
            put(&mut buf, d + 24, 5i32.to_le_bytes());
            put(&mut buf, d + 28, 6i32.to_le_bytes());
            put_section(&mut buf, DAC_SECTION, 3, 256, 1);
            // epoch per DAC, block 4
            let ep = 4 * BLOCK_SIZE;
            let defs: [(i16, i16, f64, f64, i32, i32); 3] = [
                (0, 1, -10.0, 10.0, 100, self.duration_inc),
                (1, 0, 0.0, 0.0, 50, 0),
                (2, 1, -50.0, 0.0, 200, 0),
            ];
            for (k, (number, kind, level, inc, duration, duration_inc)) in
                defs.into_iter().enumerate()
            {
                let e = ep + k * 48;
                put(&mut buf, e, number.to_le_bytes());
                put(&mut buf, e + 2, 0i16.to_le_bytes());
                put(&mut buf, e + 4, kind.to_le_bytes());
                put(&mut buf, e + 6, ((level / to_cmd) as f32).to_le_bytes());
                put(&mut buf, e + 10, ((inc / to_cmd) as f32).to_le_bytes());
                put(&mut buf, e + 14, duration.to_le_bytes());
                put(&mut buf, e + 18, duration_inc.to_le_bytes());
            }
            put_section(&mut buf, EPOCH_PER_DAC_SECTION, 4, 48, 3);
            // strings, block 5
            let strings = format!(
                "CLAMPEX\0\0IN 0\0{}\0IN 1\0{}\0Cmd 0\0{}\0",
                self.voltage_units, self.current_units, self.command_units
            );
            buf.resize(5 * BLOCK_SIZE, 0);
            buf.extend_from_slice(strings.as_bytes());
            put_section(&mut buf, STRINGS_SECTION, 5, strings.len() as u32, 6);
            // data, block 6
            buf.resize(6 * BLOCK_SIZE, 0);
            let v_gain = V_GAIN as f64 * self.telegraph_gain.map_or(1.0, f64::from);
            for sweep in 0..self.sweeps {
                for i in 0..POINTS {
                    let v = (-70.0 + sweep as f64 + i as f64 * 0.01) / to_v;
                    let current = if (10..110).contains(&i) {
                        (-10.0 + 10.0 * sweep as f64) / to_i
                    } else {
                        0.0
                    };
                    if self.float_data {
                        buf.extend_from_slice(&(v as f32).to_le_bytes());
                        buf.extend_from_slice(&(current as f32).to_le_bytes());
                    } else {
                        buf.extend_from_slice(&counts(v, v_gain).to_le_bytes());
                        buf.extend_from_slice(&counts(current, I_GAIN as f64).to_le_bytes());
                    }
                }
            }
            let width = if self.float_data { 4 } else { 2 };
            put_section(&mut buf, DATA_SECTION, 6, width, (self.sweeps * POINTS * 2) as i64);
            buf
        }
    }
    /// Default fixture with `sweeps` sweeps in operation `mode`.
    pub(crate) fn synthetic_abf(sweeps: usize, mode: i16) -> Vec<u8> {
        SyntheticAbf {
            sweeps,
            mode,
            ..SyntheticAbf::default()
        }
        .build()
    }
    fn open(bytes: Vec<u8>) -> Result<AbfFile> {
        AbfFile::from_bytes(Path::new("cell/22923000.abf"), bytes)
    }
    #[test]
    fn parses_header_and_channels() {
        let abf = open(synthetic_abf(3, 5)).unwrap();
        let info = abf.info();
        assert_eq!(info.name, "22923000");
        assert_eq!(info.sweep_count, 3);
        assert!((info.sample_rate_hz - RATE_HZ).abs() < 1e-6);
        assert_eq!(info.channel_names, vec!["IN 0", "IN 1"]);
        assert_eq!(abf.channel_units(0), Some("mV"));
        assert_eq!(abf.channel_units(1), Some("pA"));
        assert_eq!(abf.mode(), OperationMode::Episodic);
        let ts = info.timestamp.unwrap();
        assert_eq!(ts.to_string(), "2022-09-23 13:05:07.250");
    }
    #[test]
    fn decodes_scaled_samples() {
        let mut abf = open(synthetic_abf(3, 5)).unwrap();
        let sweep = abf.read_sweep(2, &ChannelMap::default()).unwrap();
        assert_eq!(sweep.len(), POINTS);
        assert!((sweep.start_s - 3.0).abs() < 1e-9);
        let v_step = 10.0 / 32768.0 / V_GAIN as f64;
        assert!((sweep.voltage_mv[0] - -68.0).abs() <= v_step);
        assert!((sweep.voltage_mv[100] - -67.0).abs() <= v_step);
        let i_step = 10.0 / 32768.0 / I_GAIN as f64;
        assert!((sweep.current_pa[50] - 10.0).abs() <= i_step);
        assert!(sweep.current_pa[200].abs() <= i_step);
    }
    #[test]
    fn builds_command_steps_per_sweep() {
        let mut abf = open(synthetic_abf(3, 5)).unwrap();
        let first = abf.read_sweep(0, &ChannelMap::default()).unwrap();
        let last = abf.read_sweep(2, &ChannelMap::default()).unwrap();
        // holding = 640 / 64 = 10 samples; disabled epoch B takes no time
        assert_eq!(
            first.steps,
            vec![
                StimulusStep { start: 10, end: 110, level_pa: -10.0 },
                StimulusStep { start: 110, end: 310, level_pa: -50.0 },
            ]
        );
        assert_eq!(last.steps[0].level_pa, 10.0);
    }
    #[test]
    fn rejects_sweeps_out_of_range() {
        let mut abf = open(synthetic_abf(2, 5)).unwrap();
        assert!(matches!(
            abf.read_sweep(2, &ChannelMap::default()),
            Err(AnalysisError::Range { available: 2, .. })
        ));
    }
    #[test]
    fn rejects_wrong_units_and_modes() {
        let mut abf = open(synthetic_abf(2, 5)).unwrap();
        let swapped = ChannelMap { voltage: 1, current: 0, command: 0 };
        assert!(matches!(abf.read_sweep(0, &swapped), Err(AnalysisError::Data(_))));
        let mut gap_free = open(synthetic_abf(1, 3)).unwrap();
        assert_eq!(gap_free.mode(), OperationMode::GapFree);
        assert!(matches!(
            gap_free.read_sweep(0, &ChannelMap::default()),
            Err(AnalysisError::Data(_))
        ));
    }
    #[test]
    fn rejects_other_formats() {
        let mut v1 = synthetic_abf(1, 5);
        v1[0..4].copy_from_slice(&SIGNATURE_V1);
        assert!(matches!(open(v1), Err(AnalysisError::Data(_))));
        assert!(matches!(open(vec![0u8; 16]), Err(AnalysisError::Data(_))));
    }
    #[test]
    fn rejects_truncated_data() {
        let mut bytes = synthetic_abf(3, 5);
        bytes.truncate(bytes.len() - 100);
        assert!(matches!(open(bytes), Err(AnalysisError::Data(_))));
    }
    #[test]
    fn rejects_oversized_tables() {
        let mut zero_width = synthetic_abf(1, 5);
        put_section(&mut zero_width, ADC_SECTION, 2, 0, i64::MAX);
        assert!(matches!(open(zero_width), Err(AnalysisError::Data(_))));
        let mut huge_dac = synthetic_abf(1, 5);
        put_section(&mut huge_dac, DAC_SECTION, 3, 256, 1 << 40);
        assert!(matches!(open(huge_dac), Err(AnalysisError::Data(_))));
        let mut huge_epochs = synthetic_abf(1, 5);
        put_section(&mut huge_epochs, EPOCH_PER_DAC_SECTION, 4, 48, i64::MAX);
        assert!(matches!(open(huge_epochs), Err(AnalysisError::Data(_))));
        let mut huge_data = synthetic_abf(1, 5);
        put(&mut huge_data, 12, u32::MAX.to_le_bytes());
        put_section(&mut huge_data, DATA_SECTION, 6, 2, i64::MAX);
        assert!(matches!(open(huge_data), Err(AnalysisError::Data(_))));
    }
    #[test]
    fn decodes_float_data_in_volts_and_nanoamps() {
        let bytes = SyntheticAbf {
            float_data: true,
            voltage_units: "V",
            current_units: "nA",
            command_units: "nA",
            // float samples are already scaled
            telegraph_gain: Some(5.0),
            ..SyntheticAbf::default()
        }
        .build();
        let mut abf = open(bytes).unwrap();
        assert_eq!(abf.channel_units(0), Some("V"));
        assert_eq!(abf.channel_units(1), Some("nA"));
        let sweep = abf.read_sweep(2, &ChannelMap::default()).unwrap();
        assert!((sweep.voltage_mv[0] - -68.0).abs() < 1e-3);
        assert!((sweep.voltage_mv[100] - -67.0).abs() < 1e-3);
        assert!((sweep.current_pa[50] - 10.0).abs() < 1e-3);
        assert!(sweep.current_pa[200].abs() < 1e-9);
        assert!((sweep.steps[0].level_pa - 10.0).abs() < 1e-3);
        assert!((sweep.steps[1].level_pa - -50.0).abs() < 1e-3);
    }
    #[test]
    fn telegraph_gain_scales_integer_samples() {
        let bytes = SyntheticAbf {
            telegraph_gain: Some(2.0),
            ..SyntheticAbf::default()
        }
        .build();
        let mut abf = open(bytes).unwrap();
        let sweep = abf.read_sweep(1, &ChannelMap::default()).unwrap();
        let v_step = 10.0 / 32768.0 / (V_GAIN as f64 * 2.0);
        assert!((sweep.voltage_mv[0] - -69.0).abs() <= v_step);
        assert!((sweep.voltage_mv[300] - -66.0).abs() <= v_step);
    }
    #[test]
    fn epoch_duration_grows_per_sweep() {
        let bytes = SyntheticAbf {
            duration_inc: 20,
            ..SyntheticAbf::default()
        }
        .build();
        let mut abf = open(bytes).unwrap();
        let first = abf.read_sweep(0, &ChannelMap::default()).unwrap();
        let last = abf.read_sweep(2, &ChannelMap::default()).unwrap();
        assert_eq!(first.steps[0], StimulusStep { start: 10, end: 110, level_pa: -10.0 });
        assert_eq!(
            last.steps,
            vec![
                StimulusStep { start: 10, end: 150, level_pa: 10.0 },
                StimulusStep { start: 150, end: 350, level_pa: -50.0 },
            ]
        );
    }
    #[test]
    fn string_table_is_one_based() {
        let strings = parse_strings(b"junk\0\0a\0b\0");
        assert_eq!(lookup(&strings, 1), "a");
        assert_eq!(lookup(&strings, 2), "b");
        assert_eq!(lookup(&strings, -1), "");
    }
}
