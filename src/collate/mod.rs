// src/collate/mod.rs
pub mod tables;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use log::{debug, info};
use serde::Serialize;
use crate::atomic::write_atomic;
use crate::error::{AnalysisError, Result};
use crate::record::{EpochRecord, RECORD_EXTENSION};
pub use tables::{EpochRow, IvRow, SweepRow, Tables};
pub const EPOCH_TABLE: &str = "epoch_stats.csv";
pub const SWEEP_TABLE: &str = "sweep_stats.csv";
pub const IV_TABLE: &str = "iv_stats.csv";
/// Expands directories to the record files they contain (non-recursive).
pub fn record_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = BTreeSet::new();
    for input in inputs {
        if input.is_dir() {
            let entries = std::fs::read_dir(input).map_err(|e| AnalysisError::io(input, e))?;
            for entry in entries {
                let path = entry.map_err(|e| AnalysisError::io(input, e))?.path();
                if path.is_file() && path.extension().map_or(false, |ext| ext == RECORD_EXTENSION) {
                    paths.insert(path);
                }
            }
        } else {
            paths.insert(input.clone());
        }
    }
    Ok(paths.into_iter().collect())
}
/// Loads every record, rejecting a second record for the same epoch.
pub fn load_records(paths: &[PathBuf]) -> Result<Vec<EpochRecord>> {
    let mut seen = BTreeSet::new();
    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        debug!("- reading {}", path.display());
        let record = EpochRecord::read(path)?;
        if !seen.insert((record.cell.clone(), record.epoch)) {
            return Err(AnalysisError::data(format!(
                "{}: duplicate record for {} epoch {}",
                path.display(),
                record.cell,
                record.epoch
            )));
        }
        records.push(record);
    }
    Ok(records)
}
fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    write_atomic(path, |w| {
        let mut writer = csv::Writer::from_writer(w);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(|e| AnalysisError::io(path, e))
    })
}
impl Tables {
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let epoch_path = dir.join(EPOCH_TABLE);
        let sweep_path = dir.join(SWEEP_TABLE);
        let iv_path = dir.join(IV_TABLE);
        write_table(&epoch_path, &self.epochs)?;
        write_table(&sweep_path, &self.sweeps)?;
        write_table(&iv_path, &self.iv)?;
        Ok(vec![epoch_path, sweep_path, iv_path])
    }
}
/// Reads records from `inputs` and writes the three tables into `out_dir`.
pub fn collate(inputs: &[PathBuf], out_dir: &Path) -> Result<Tables> {
    let paths = record_paths(inputs)?;
    if paths.is_empty() {
        return Err(AnalysisError::data("no record files to collate"));
    }
    let records = load_records(&paths)?;
    let tables = Tables::from_records(&records);
    for path in tables.write_to_dir(out_dir)? {
        info!("- wrote {}", path.display());
    }
    info!(
        "- collated {} epochs, {} sweeps, {} steps",
        tables.epochs.len(),
        tables.sweeps.len(),
        tables.iv.len()
    );
    Ok(tables)
}
