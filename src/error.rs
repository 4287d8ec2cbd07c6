use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PnlError {
    #[error("Data unavailable at {path}: {reason}")]
    DataUnavailable { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PnlError {
    pub fn data_unavailable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DataUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PnlError>;
