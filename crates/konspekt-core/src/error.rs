use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("video {video_id} not found")]
    NotFound { video_id: String },

    #[error("no transcript stored for video {video_id}")]
    MissingTranscript { video_id: String },

    #[error("model gateway unavailable: {0}")]
    GatewayTransient(String),

    #[error("model returned unusable output: {0}")]
    GatewayInvalidOutput(String),

    #[error("model gateway rejected the request: {0}")]
    GatewayRejected(String),

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
}

/// Caller-facing failure classification carried in the reply envelope.
/// Internal taxonomy (transient vs invalid output vs rejected) collapses
/// to `GenerationFailed` once retries are exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    NotFound,
    GenerationFailed,
    PersistenceFailed,
}

impl EngineError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            EngineError::NotFound { .. } | EngineError::MissingTranscript { .. } => {
                FailureKind::NotFound
            }
            EngineError::GatewayTransient(_)
            | EngineError::GatewayInvalidOutput(_)
            | EngineError::GatewayRejected(_) => FailureKind::GenerationFailed,
            EngineError::Store(_) => FailureKind::PersistenceFailed,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
