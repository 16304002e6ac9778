use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::video_pipeline::VideoOptions;
use crate::shared::constants::{IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

const MIB: u64 = 1024 * 1024;

/// Every runtime tunable, with defaults matching a small single-host setup.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub storage_dir: PathBuf,
    /// Extra directory searched for cascade XML files before downloading.
    pub cascade_dir: Option<PathBuf>,
    pub allowed_image_extensions: BTreeSet<String>,
    pub allowed_video_extensions: BTreeSet<String>,
    pub max_upload_mb: u64,
    pub max_upload_files: usize,
    pub max_video_mb: u64,
    pub max_video_seconds: u64,
    pub video_detect_scale: f64,
    pub video_detect_every_n: usize,
    /// 0 = keep the source frame rate.
    pub video_max_fps: u32,
    pub video_preserve_audio: bool,
    pub video_transcode_h264: bool,
    /// Blend the pixel blocks with a blurred copy.
    pub soften_pixels: bool,
    pub storage_ttl_minutes: u64,
    /// 0 disables the periodic cleanup.
    pub cleanup_interval_minutes: u64,
    /// 0 = run jobs inline in `submit`.
    pub workers: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("storage"),
            cascade_dir: None,
            allowed_image_extensions: to_set(IMAGE_EXTENSIONS),
            allowed_video_extensions: to_set(VIDEO_EXTENSIONS),
            max_upload_mb: 25,
            max_upload_files: 10,
            max_video_mb: 50,
            max_video_seconds: 60,
            video_detect_scale: 0.5,
            video_detect_every_n: 4,
            video_max_fps: 20,
            video_preserve_audio: true,
            video_transcode_h264: true,
            soften_pixels: true,
            storage_ttl_minutes: 60,
            cleanup_interval_minutes: 30,
            workers: 2,
        }
    }
}

impl Settings {
    /// Defaults overridden by `FACEBLUR_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Settings::from_env`] but reading from any key/value source.
    ///
    /// Unparseable values are logged and fall back to the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            storage_dir: get("FACEBLUR_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.storage_dir),
            cascade_dir: get("FACEBLUR_CASCADE_DIR").map(PathBuf::from).or(d.cascade_dir),
            allowed_image_extensions: get("FACEBLUR_ALLOWED_EXTENSIONS")
                .map(|v| parse_extensions(&v))
                .filter(|s| !s.is_empty())
                .unwrap_or(d.allowed_image_extensions),
            allowed_video_extensions: get("FACEBLUR_ALLOWED_VIDEO_EXTENSIONS")
                .map(|v| parse_extensions(&v))
                .filter(|s| !s.is_empty())
                .unwrap_or(d.allowed_video_extensions),
            max_upload_mb: parse_or(&get, "FACEBLUR_MAX_UPLOAD_MB", d.max_upload_mb).max(1),
            max_upload_files: parse_or(&get, "FACEBLUR_MAX_UPLOAD_FILES", d.max_upload_files)
                .max(1),
            max_video_mb: parse_or(&get, "FACEBLUR_MAX_VIDEO_MB", d.max_video_mb).max(1),
            max_video_seconds: parse_or(&get, "FACEBLUR_MAX_VIDEO_SECONDS", d.max_video_seconds)
                .max(1),
            video_detect_scale: parse_or(&get, "FACEBLUR_VIDEO_DETECT_SCALE", d.video_detect_scale)
                .clamp(0.1, 1.0),
            video_detect_every_n: parse_or(
                &get,
                "FACEBLUR_VIDEO_DETECT_EVERY_N",
                d.video_detect_every_n,
            )
            .max(1),
            video_max_fps: parse_or(&get, "FACEBLUR_VIDEO_MAX_FPS", d.video_max_fps),
            video_preserve_audio: bool_or(
                &get,
                "FACEBLUR_VIDEO_PRESERVE_AUDIO",
                d.video_preserve_audio,
            ),
            video_transcode_h264: bool_or(
                &get,
                "FACEBLUR_VIDEO_TRANSCODE_H264",
                d.video_transcode_h264,
            ),
            soften_pixels: bool_or(&get, "FACEBLUR_SOFTEN", d.soften_pixels),
            storage_ttl_minutes: parse_or(
                &get,
                "FACEBLUR_STORAGE_TTL_MINUTES",
                d.storage_ttl_minutes,
            ),
            cleanup_interval_minutes: parse_or(
                &get,
                "FACEBLUR_CLEANUP_INTERVAL_MINUTES",
                d.cleanup_interval_minutes,
            ),
            workers: parse_or(&get, "FACEBLUR_WORKERS", d.workers),
        }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * MIB
    }

    pub fn max_video_bytes(&self) -> u64 {
        self.max_video_mb * MIB
    }

    pub fn storage_ttl(&self) -> Duration {
        Duration::from_secs(self.storage_ttl_minutes * 60)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_minutes * 60)
    }

    pub fn video_options(&self) -> VideoOptions {
        VideoOptions {
            detect_scale: self.video_detect_scale,
            detect_every_n: self.video_detect_every_n,
            max_fps: self.video_max_fps as f64,
            preserve_audio: self.video_preserve_audio,
            transcode: self.video_transcode_h264,
        }
    }
}

fn to_set(extensions: &[&str]) -> BTreeSet<String> {
    extensions.iter().map(|e| e.to_string()).collect()
}

/// `"jpg, .PNG ,"` → `{jpg, png}`
pub fn parse_extensions(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

type Lookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

fn parse_or<T: std::str::FromStr>(get: &Lookup, key: &str, default: T) -> T {
    match get(key) {
        None => default,
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid {key}={v}");
            default
        }),
    }
}

fn bool_or(get: &Lookup, key: &str, default: bool) -> bool {
    match get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => default,
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                log::warn!("Ignoring invalid {key}={v}");
                default
            }
        },
    }
}
