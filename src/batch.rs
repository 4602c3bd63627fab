use std::path::{Path, PathBuf};
use log::{error, info};
use rayon::prelude::*;
use crate::control::Job;
use crate::error::{AnalysisError, Result};
use crate::features::{EpochExtractor, EpochId};
use crate::recording::{AbfFile, RecordingSource};
#[derive(Debug)]
pub struct JobOutcome {
    pub id: EpochId,
    pub source: PathBuf,
    /// Path of the written record, or why the epoch failed.
    pub result: std::result::Result<PathBuf, String>,
}
impl JobOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}
/// Extracts one epoch from an ABF file and writes its record into `out_dir`.
pub fn run_job(extractor: &EpochExtractor, job: &Job, out_dir: &Path) -> Result<PathBuf> {
    let mut abf = AbfFile::open(&job.path)?;
    let range = job.sweep_range(abf.sweep_count());
    let record = extractor.extract(&mut abf, &job.id, range)?;
    let path = record.write_to_dir(out_dir)?;
    info!("- wrote {}", path.display());
    Ok(path)
}
/// Runs every job on a pool of `threads` workers (all cores when `None`).
/// A failing job is reported in its outcome and does not stop the others.
pub fn run_batch(
    extractor: &EpochExtractor,
    jobs: &[Job],
    out_dir: &Path,
    threads: Option<usize>,
) -> Result<Vec<JobOutcome>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or(0))
        .build()
        .map_err(|e| AnalysisError::Config(format!("cannot start worker pool: {e}")))?;
    let mut outcomes: Vec<JobOutcome> = pool.install(|| {
        jobs.par_iter()
            .map(|job| JobOutcome {
                id: job.id.clone(),
                source: job.path.clone(),
                result: run_job(extractor, job, out_dir).map_err(|e| e.to_string()),
            })
            .collect()
    });
    outcomes.sort_by(|a, b| a.id.cmp(&b.id));
    for outcome in outcomes.iter() {
        if let Err(reason) = &outcome.result {
            error!(
                "✗ {} epoch {} ({}): {}",
                outcome.id.cell,
                outcome.id.epoch,
                outcome.source.display(),
                reason
            );
        }
    }
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    info!(
        "- {} of {} epochs extracted, {} failed",
        outcomes.len() - failed,
        outcomes.len(),
        failed
    );
    Ok(outcomes)
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractConfig;
    use crate::recording::abf::tests::synthetic_abf;
    use crate::record::EpochRecord;
    #[test]
    fn failures_do_not_stop_other_jobs() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let good = data.path().join("good.abf");
        let bad = data.path().join("bad.abf");
        std::fs::write(&good, synthetic_abf(3, 5)).unwrap();
        std::fs::write(&bad, b"not an abf file").unwrap();
        let jobs = vec![
            Job::new(EpochId::new("C2", 1), bad),
            Job::new(EpochId::new("C1", 1), good.clone()),
            Job::new(EpochId::new("C1", 2), data.path().join("missing.abf")),
        ];
        let extractor = EpochExtractor::new(ExtractConfig::default()).unwrap();
        let outcomes = run_batch(&extractor, &jobs, out.path(), Some(2)).unwrap();
        let ids: Vec<&EpochId> = outcomes.iter().map(|o| &o.id).collect();
        assert_eq!(ids, vec![&jobs[1].id, &jobs[2].id, &jobs[0].id]);
        assert!(outcomes[0].is_ok());
        assert!(!outcomes[1].is_ok());
        assert!(!outcomes[2].is_ok());
        let written = outcomes[0].result.as_ref().unwrap();
        let record = EpochRecord::read(written).unwrap();
        assert_eq!(record.cell, "C1");
        assert_eq!(record.pprox.len(), 3);
        assert_eq!(record.abf_file, "good");
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 1);
    }
    #[test]
    fn sweep_span_limits_the_epoch() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let path = data.path().join("cell.abf");
        std::fs::write(&path, synthetic_abf(4, 5)).unwrap();
        let mut job = Job::new(EpochId::new("C3", 2), path);
        job.first_sweep = Some(1);
        job.last_sweep = Some(3);
        let extractor = EpochExtractor::new(ExtractConfig::default()).unwrap();
        let written = run_job(&extractor, &job, out.path()).unwrap();
        let record = EpochRecord::read(&written).unwrap();
        let indices: Vec<usize> = record.pprox.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert_eq!(record.protocol.first_sweep, 1);
        assert!(record.timestamp.is_some());
    }
}
