//! Control tables: CSV files naming the recordings to extract.
//!
//! Required columns are `cell` and `path`; `epoch`, `first_sweep` and
//! `last_sweep` are optional (the sweep span is half-open). A `path` that
//! is a directory is a cell directory whose recordings are numbered as
//! epochs; without an `epoch` every current-clamp recording in it becomes a
//! job. Relative paths are resolved against the directory of the table.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::ops::Range;
use std::path::{Path, PathBuf};
use log::{debug, info};
use serde::Deserialize;
use crate::error::{AnalysisError, Result};
use crate::features::EpochId;
use crate::recording::{epoch_recording, scan_cell, ChannelMap, EpochKind};
#[derive(Debug, Deserialize)]
struct ControlRow {
    cell: String,
    path: PathBuf,
    #[serde(default)]
    epoch: Option<u32>,
    #[serde(default)]
    first_sweep: Option<usize>,
    #[serde(default)]
    last_sweep: Option<usize>,
}
/// One epoch to extract.
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub id: EpochId,
    pub path: PathBuf,
    pub first_sweep: Option<usize>,
    pub last_sweep: Option<usize>,
}
impl Job {
    pub fn new(id: EpochId, path: PathBuf) -> Self {
        Self {
            id,
            path,
            first_sweep: None,
            last_sweep: None,
        }
    }
    /// Sweep span to extract, or `None` for the whole recording.
    pub fn sweep_range(&self, available: usize) -> Option<Range<usize>> {
        match (self.first_sweep, self.last_sweep) {
            (None, None) => None,
            (first, last) => Some(first.unwrap_or(0)..last.unwrap_or(available)),
        }
    }
}
pub fn read_control_table(path: &Path, channels: &ChannelMap) -> Result<Vec<Job>> {
    let file = File::open(path).map_err(|e| AnalysisError::io(path, e))?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));
    parse_control_table(file, base, channels)
}
pub fn parse_control_table<R: Read>(
    reader: R,
    base: &Path,
    channels: &ChannelMap,
) -> Result<Vec<Job>> {
    let mut table = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut jobs = Vec::new();
    for row in table.deserialize() {
        let row: ControlRow = row?;
        if row.cell.is_empty() {
            return Err(AnalysisError::data("control table row without a cell"));
        }
        let path = if row.path.is_absolute() {
            row.path.clone()
        } else {
            base.join(&row.path)
        };
        let span = |id: EpochId, path: PathBuf| Job {
            id,
            path,
            first_sweep: row.first_sweep,
            last_sweep: row.last_sweep,
        };
        match (path.is_dir(), row.epoch) {
            (true, Some(epoch)) => {
                jobs.push(span(EpochId::new(&row.cell, epoch), epoch_recording(&path, epoch)?));
            }
            (true, None) => {
                for scanned in scan_cell(&path, channels)? {
                    if scanned.kind == EpochKind::CurrentClamp {
                        jobs.push(span(EpochId::new(&row.cell, scanned.epoch), scanned.path));
                    } else {
                        let (cell, epoch) = (&row.cell, scanned.epoch);
                        debug!("- skipping {cell} epoch {epoch}: {:?}", scanned.kind);
                    }
                }
            }
            (false, epoch) => {
                jobs.push(span(EpochId::new(&row.cell, epoch.unwrap_or(1)), path));
            }
        }
    }
    reject_duplicates(&jobs)?;
    info!("- control table lists {} epochs", jobs.len());
    Ok(jobs)
}
/// Two jobs for the same epoch would write the same record file.
fn reject_duplicates(jobs: &[Job]) -> Result<()> {
    let mut seen: BTreeMap<&EpochId, &Path> = BTreeMap::new();
    for job in jobs {
        if let Some(first) = seen.insert(&job.id, &job.path) {
            return Err(AnalysisError::data(format!(
                "{} epoch {} is listed twice ({} and {})",
                job.id.cell,
                job.id.epoch,
                first.display(),
                job.path.display()
            )));
        }
    }
    Ok(())
}
