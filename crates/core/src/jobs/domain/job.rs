use std::fmt;

use serde::{Deserialize, Serialize};

use super::job_error::JobError;
use super::manifest::Manifest;

/// Random job identifier: a v4 UUID as 32 lowercase hex characters.
///
/// Doubles as the name of the job's storage directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Accepts only the 32-hex-digit form produced by [`JobId::new`], so an id
    /// can never name a path outside the store.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.len() == 32 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(raw.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Image,
    Video,
}

/// One uploaded file.
#[derive(Clone, PartialEq, Eq)]
pub struct PayloadItem {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl PayloadItem {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

impl fmt::Debug for PayloadItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadItem")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Lifecycle of a submitted job.
///
/// `Pending → Succeeded → Consumed` or `Pending → Failed`. `Consumed` is
/// terminal: the artifacts have been handed out and deleted.
#[derive(Clone, Debug, PartialEq)]
pub enum JobState {
    Pending,
    Succeeded(Manifest),
    Failed(JobError),
    Consumed,
}
