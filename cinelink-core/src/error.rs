use thiserror::Error;

/// Failure taxonomy for a sync run.
///
/// Only `Connection` aborts a run; the engine catches everything else at
/// its own stage and carries the run through to `Finished`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("media server unreachable: {0}")]
    Connection(String),

    #[error("existence query failed for '{title}': {reason}")]
    Query { title: String, reason: String },

    #[error("submission failed for '{title}': {reason}")]
    Submission { title: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("a sync run is already in progress")]
    RunInProgress,
}

pub type Result<T> = std::result::Result<T, SyncError>;
