use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use crate::error::{AnalysisError, Result};
/// Writes `path` through a temporary file in the same directory that is
/// renamed over the target once complete, so readers never see a partial file.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| AnalysisError::io(dir, e))?;
    let tmp = NamedTempFile::new_in(dir).map_err(|e| AnalysisError::io(dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        write(&mut writer)?;
        writer.flush().map_err(|e| AnalysisError::io(tmp.path(), e))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|e| AnalysisError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| AnalysisError::io(path, e.error))?;
    Ok(())
}
