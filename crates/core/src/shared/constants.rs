pub const FRONTAL_CASCADE_NAME: &str = "haarcascade_frontalface_default.xml";
pub const FRONTAL_ALT_CASCADE_NAME: &str = "haarcascade_frontalface_alt2.xml";
pub const PROFILE_CASCADE_NAME: &str = "haarcascade_profileface.xml";
pub const CASCADE_BASE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades";

/// Boxes overlapping a larger kept box by more than this fraction of their own area are dropped.
pub const MERGE_OVERLAP_THRESHOLD: f64 = 0.2;

pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";
pub const ARCHIVE_FILENAME: &str = "blurred_images.zip";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff"];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv"];

/// Used when the container reports a non-positive frame rate.
pub const DEFAULT_VIDEO_FPS: f64 = 24.0;
pub const JPEG_QUALITY: u8 = 90;
