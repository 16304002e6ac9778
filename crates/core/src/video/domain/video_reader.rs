use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Sequential frame source.
///
/// Implementations handle I/O details (codec, container format, etc.)
/// while the pipeline works with the abstract `Frame` and `VideoMetadata`
/// types.
pub trait VideoReader: Send {
    /// Opens a video file and returns its metadata.
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Decodes the next frame, or returns `None` at end of stream.
    fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Advances past the next frame without converting it to RGB.
    ///
    /// Returns `false` at end of stream.
    fn skip(&mut self) -> Result<bool, Box<dyn std::error::Error>>;

    /// Releases any resources held by the reader. Safe to call twice.
    fn close(&mut self);
}
