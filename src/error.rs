use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::state::FailureKind;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Failures that stop a run before the runtime ever reports anything.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("test file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to start `{runtime}` for {}: {source}", path.display())]
    Spawn {
        runtime: String,
        path: PathBuf,
        source: io::Error,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

impl ExecError {
    /// How the error shows up in a batch report.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ExecError::NotFound { .. } => FailureKind::NotFound,
            ExecError::Spawn { source, .. } | ExecError::Io { source, .. } => FailureKind::SpawnError {
                message: source.to_string(),
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("failed to register termination handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
