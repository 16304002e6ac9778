use std::fmt;

use super::job_error::JobError;

/// A deliverable loaded from disk: one file, or a bundle of several.
#[derive(Clone, PartialEq)]
pub struct Artifact {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub duration_seconds: Option<f64>,
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .field("duration_seconds", &self.duration_seconds)
            .finish()
    }
}

/// Answer to a `fetch` that did not fail outright.
#[derive(Clone, Debug, PartialEq)]
pub enum FetchResult {
    /// No result yet (or no such job).
    Pending,
    Ready(Artifact),
    /// The job ran and raised.
    Failed(JobError),
}

impl FetchResult {
    /// Status word used on the wire: `pending`, `ok` or `error`.
    pub fn status(&self) -> &'static str {
        match self {
            FetchResult::Pending => "pending",
            FetchResult::Ready(_) => "ok",
            FetchResult::Failed(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_vocabulary() {
        let artifact = Artifact {
            filename: "a.jpg".into(),
            content_type: "image/jpeg".into(),
            bytes: vec![1, 2, 3],
            duration_seconds: None,
        };
        assert_eq!(FetchResult::Pending.status(), "pending");
        assert_eq!(FetchResult::Ready(artifact).status(), "ok");
        assert_eq!(FetchResult::Failed(JobError::ResultMissing).status(), "error");
    }
}
