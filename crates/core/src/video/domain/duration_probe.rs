use std::path::Path;

/// Reports a video's duration without decoding it.
///
/// Implementations must release the file on every exit path.
pub trait DurationProbe: Send + Sync {
    /// Duration in seconds; 0 when the container does not say.
    fn duration_seconds(&self, path: &Path) -> Result<f64, Box<dyn std::error::Error>>;
}
