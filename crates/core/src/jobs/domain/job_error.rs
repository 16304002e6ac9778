use thiserror::Error;

use crate::pipeline::pipeline_error::PipelineError;

/// Caller-facing failure taxonomy for submission and retrieval.
///
/// Validation variants are returned by `submit` before a job exists.
/// Execution variants are stored with the job and surface through `fetch`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("{0}")]
    Invalid(String),
    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("could not decode media: {0}")]
    Decode(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("job failed ({kind}): {message}")]
    ExecutionFailed { kind: String, message: String },
    #[error("processed files are missing")]
    ResultMissing,
    #[error("result was already retrieved")]
    ResultAlreadyConsumed,
}

impl JobError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            JobError::Invalid(_) => "validation_error",
            JobError::UnsupportedMedia(_) => "unsupported_media_type",
            JobError::PayloadTooLarge(_) => "payload_too_large",
            JobError::Decode(_) => "decode_error",
            JobError::Configuration(_) => "config_error",
            JobError::ExecutionFailed { .. } => "task_failed",
            JobError::ResultMissing | JobError::ResultAlreadyConsumed => "result_missing",
        }
    }

    /// HTTP-style status a transport layer maps this error to.
    pub fn status(&self) -> u16 {
        match self {
            JobError::Invalid(_) | JobError::Decode(_) => 400,
            JobError::UnsupportedMedia(_) => 415,
            JobError::PayloadTooLarge(_) => 413,
            JobError::Configuration(_) | JobError::ExecutionFailed { .. } => 500,
            JobError::ResultMissing | JobError::ResultAlreadyConsumed => 410,
        }
    }

    pub fn is_result_missing(&self) -> bool {
        matches!(self, JobError::ResultMissing | JobError::ResultAlreadyConsumed)
    }
}

impl From<PipelineError> for JobError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Decode(message) => JobError::Decode(message),
            PipelineError::NoFrames => JobError::Decode(PipelineError::NoFrames.to_string()),
            PipelineError::Configuration(message) => JobError::Configuration(message),
            other => JobError::ExecutionFailed {
                kind: other.kind().to_string(),
                message: other.to_string(),
            },
        }
    }
}
