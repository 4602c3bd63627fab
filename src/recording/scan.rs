use std::path::{Path, PathBuf};
use log::debug;
use crate::error::{AnalysisError, Result};
use crate::recording::abf::{current_scale, voltage_scale, AbfFile, OperationMode};
use crate::recording::source::ChannelMap;
/// What kind of data an epoch file holds.
#[derive(Clone, Debug, PartialEq)]
pub enum EpochKind {
    /// Episodic current clamp with a command waveform; can be extracted.
    CurrentClamp,
    GapFree,
    NotCurrentClamp(String),
    Unreadable(String),
}
#[derive(Clone, Debug)]
pub struct ScannedEpoch {
    /// 1-based position of the recording in the cell directory.
    pub epoch: u32,
    pub path: PathBuf,
    pub kind: EpochKind,
}
/// Recordings of one cell, sorted by file name; epoch N is entry N-1.
pub fn recordings_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| AnalysisError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| AnalysisError::io(dir, e))?.path();
        let is_abf = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("abf"))
            .unwrap_or(false);
        if is_abf && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
/// Picks the recording for a 1-based epoch number.
pub fn epoch_recording(dir: &Path, epoch: u32) -> Result<PathBuf> {
    let files = recordings_in(dir)?;
    let available = files.len();
    (epoch as usize)
        .checked_sub(1)
        .and_then(|i| files.into_iter().nth(i))
        .ok_or_else(|| {
            AnalysisError::data(format!(
                "there is no epoch {epoch} in `{}` ({available} recordings)",
                dir.display()
            ))
        })
}
pub fn classify(abf: &AbfFile, channels: &ChannelMap) -> EpochKind {
    if abf.mode() != OperationMode::Episodic || !abf.has_command_waveform(channels.command) {
        return EpochKind::GapFree;
    }
    let units = (
        abf.channel_units(channels.voltage),
        abf.channel_units(channels.current),
    );
    match units {
        (Some(v), Some(i)) if voltage_scale(v).is_some() && current_scale(i).is_some() => {
            EpochKind::CurrentClamp
        }
        (v, i) => EpochKind::NotCurrentClamp(format!(
            "channel units `{}`/`{}`",
            v.unwrap_or("-"),
            i.unwrap_or("-")
        )),
    }
}
pub fn scan_cell(dir: &Path, channels: &ChannelMap) -> Result<Vec<ScannedEpoch>> {
    let scanned = recordings_in(dir)?
        .into_iter()
        .enumerate()
        .map(|(i, path)| {
            let kind = match AbfFile::open(&path) {
                Ok(abf) => classify(&abf, channels),
                Err(e) => EpochKind::Unreadable(e.to_string()),
            };
            debug!("{} {}: {:?}", dir.display(), i + 1, kind);
            ScannedEpoch {
                epoch: i as u32 + 1,
                path,
                kind,
            }
        })
        .collect();
    Ok(scanned)
}
