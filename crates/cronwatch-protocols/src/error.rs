//! Error taxonomy shared by the scheduler and its collaborators.

use std::path::PathBuf;

use thiserror::Error;

/// Persistence is unavailable. Fatal to the operation that hit it.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job store {path} is locked by another cronwatch process")]
    Locked { path: PathBuf },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A job run failed. Expected and recoverable; drives the failure counter.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("{0}")]
    Failed(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Runner panicked: {0}")]
    Panicked(String),
}

/// An event sink could not deliver an alert. Logged, never propagated.
#[derive(Debug, Error)]
#[error("Event delivery failed: {0}")]
pub struct SinkError(pub String);

/// Errors returned by scheduler operations.
#[derive(Debug, Error)]
pub enum CronError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Job not found: {id}")]
    NotFound { id: String },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),
}

impl CronError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = CronError::not_found("abc");
        assert!(err.to_string().contains("abc"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_storage_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = CronError::from(StorageError::io("/tmp/jobs.json", io));
        let display = err.to_string();
        assert!(display.contains("/tmp/jobs.json"));
        assert!(display.contains("read-only"));
    }

    #[test]
    fn test_locked_error_names_path() {
        let err = CronError::from(StorageError::Locked {
            path: "/tmp/jobs.json".into(),
        });
        assert!(err.to_string().contains("/tmp/jobs.json"));
        assert!(err.to_string().contains("locked"));
    }

    #[test]
    fn test_runner_error_message_is_verbatim() {
        let err = RunnerError::Failed("Service Unreachable".into());
        assert_eq!(err.to_string(), "Service Unreachable");
    }
}
