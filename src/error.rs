use std::path::PathBuf;
use thiserror::Error;
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Unreadable recording, missing or wrong-unit channel, malformed samples.
    #[error("data error: {0}")]
    Data(String),
    #[error("sweep range {start}..{end} is outside the recording ({available} sweeps)")]
    Range {
        start: usize,
        end: usize,
        available: usize,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("i/o error on `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("record encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("table encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
}
impl AnalysisError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnalysisError::Io {
            path: path.into(),
            source,
        }
    }
    pub fn data(message: impl Into<String>) -> Self {
        AnalysisError::Data(message.into())
    }
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for AnalysisError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        AnalysisError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for AnalysisError {
    fn from(value: image::ImageError) -> Self {
        AnalysisError::Plot(value.to_string())
    }
}
pub type Result<T> = std::result::Result<T, AnalysisError>;
