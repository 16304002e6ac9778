use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;

use crate::config::Settings;
use crate::jobs::domain::job::{JobKind, PayloadItem};
use crate::jobs::domain::job_error::JobError;
use crate::jobs::domain::media_type::{self, MediaClass};
use crate::video::domain::duration_probe::DurationProbe;

/// Limits a submission is checked against before any job exists.
#[derive(Clone, Debug)]
pub struct SubmissionLimits {
    pub allowed_image_extensions: BTreeSet<String>,
    pub allowed_video_extensions: BTreeSet<String>,
    pub max_upload_files: usize,
    pub max_upload_bytes: u64,
    pub max_video_bytes: u64,
    pub max_video_seconds: u64,
}

impl SubmissionLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            allowed_image_extensions: settings.allowed_image_extensions.clone(),
            allowed_video_extensions: settings.allowed_video_extensions.clone(),
            max_upload_files: settings.max_upload_files,
            max_upload_bytes: settings.max_upload_bytes(),
            max_video_bytes: settings.max_video_bytes(),
            max_video_seconds: settings.max_video_seconds,
        }
    }
}

/// Rejects malformed submissions with the first applicable [`JobError`].
pub struct SubmissionValidator {
    limits: SubmissionLimits,
    probe: Arc<dyn DurationProbe>,
}

impl SubmissionValidator {
    pub fn new(limits: SubmissionLimits, probe: Arc<dyn DurationProbe>) -> Self {
        Self { limits, probe }
    }

    pub fn limits(&self) -> &SubmissionLimits {
        &self.limits
    }

    pub fn validate(&self, kind: JobKind, items: &[PayloadItem]) -> Result<(), JobError> {
        if items.is_empty() {
            return Err(JobError::Invalid("no files uploaded".into()));
        }

        match kind {
            JobKind::Image => {
                if items.len() > self.limits.max_upload_files {
                    return Err(JobError::Invalid(format!(
                        "too many files: {} uploaded, at most {} allowed",
                        items.len(),
                        self.limits.max_upload_files
                    )));
                }
                for item in items {
                    self.check_item(item, MediaClass::Image)?;
                }
                Ok(())
            }
            JobKind::Video => {
                if items.len() != 1 {
                    return Err(JobError::Invalid(format!(
                        "a video job takes exactly one file, got {}",
                        items.len()
                    )));
                }
                let extension = self.check_item(&items[0], MediaClass::Video)?;
                self.check_duration(&items[0], &extension)
            }
        }
    }

    /// Returns the item's (lowercased) extension once every static check passed.
    fn check_item(&self, item: &PayloadItem, class: MediaClass) -> Result<String, JobError> {
        let (allowed, max_bytes, noun) = match class {
            MediaClass::Image => (
                &self.limits.allowed_image_extensions,
                self.limits.max_upload_bytes,
                "image",
            ),
            MediaClass::Video => (
                &self.limits.allowed_video_extensions,
                self.limits.max_video_bytes,
                "video",
            ),
        };

        let extension = media_type::extension_of(&item.filename).ok_or_else(|| {
            JobError::Invalid(format!("{}: file name has no extension", item.filename))
        })?;
        if !allowed.contains(&extension) {
            return Err(JobError::UnsupportedMedia(format!(
                "{}: .{extension} is not an allowed {noun} type",
                item.filename
            )));
        }
        if item.data.is_empty() {
            return Err(JobError::Invalid(format!("{}: empty file", item.filename)));
        }

        let sniffed = media_type::sniff(&item.data).ok_or_else(|| {
            JobError::UnsupportedMedia(format!("{}: unrecognised file signature", item.filename))
        })?;
        if sniffed.class != class {
            return Err(JobError::UnsupportedMedia(format!(
                "{}: content is not a {noun}",
                item.filename
            )));
        }
        if !allowed
            .iter()
            .any(|a| media_type::extension_matches(a, sniffed.extension))
        {
            return Err(JobError::UnsupportedMedia(format!(
                "{}: {} content is not allowed",
                item.filename, sniffed.extension
            )));
        }
        if !media_type::extension_matches(&extension, sniffed.extension) {
            return Err(JobError::Invalid(format!(
                "{}: extension .{extension} does not match {} content",
                item.filename, sniffed.extension
            )));
        }

        if item.data.len() as u64 > max_bytes {
            return Err(JobError::PayloadTooLarge(format!(
                "{}: {} bytes exceeds the {noun} limit of {max_bytes} bytes",
                item.filename,
                item.data.len()
            )));
        }
        Ok(extension)
    }

    fn check_duration(&self, item: &PayloadItem, extension: &str) -> Result<(), JobError> {
        // dropped (and deleted) on every return path
        let mut staged = tempfile::Builder::new()
            .prefix("faceblur-probe-")
            .suffix(&format!(".{extension}"))
            .tempfile()
            .map_err(|e| JobError::Configuration(format!("cannot stage upload: {e}")))?;
        staged
            .write_all(&item.data)
            .and_then(|()| staged.flush())
            .map_err(|e| JobError::Configuration(format!("cannot stage upload: {e}")))?;

        let seconds = self
            .probe
            .duration_seconds(staged.path())
            .map_err(|e| JobError::Decode(format!("{}: unable to read video: {e}", item.filename)))?;

        if seconds > self.limits.max_video_seconds as f64 {
            return Err(JobError::Invalid(format!(
                "{}: video is {seconds:.1}s long, at most {}s allowed",
                item.filename, self.limits.max_video_seconds
            )));
        }
        Ok(())
    }
}
