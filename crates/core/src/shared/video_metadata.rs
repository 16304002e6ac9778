use std::path::PathBuf;

/// Stream properties reported by a video source, or requested of a sink.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Duration implied by the frame count, 0 when either value is unknown.
    pub fn duration_seconds(&self) -> f64 {
        if self.fps > 0.0 && self.total_frames > 0 {
            self.total_frames as f64 / self.fps
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn metadata(fps: f64, total_frames: usize) -> VideoMetadata {
        VideoMetadata {
            width: 640,
            height: 480,
            fps,
            total_frames,
            codec: "h264".to_string(),
            source_path: Some(PathBuf::from("/tmp/test.mp4")),
        }
    }

    #[test]
    fn test_duration_from_frame_count() {
        assert_relative_eq!(metadata(24.0, 240).duration_seconds(), 10.0);
    }

    #[test]
    fn test_duration_unknown_fps_is_zero() {
        assert_relative_eq!(metadata(0.0, 240).duration_seconds(), 0.0);
    }

    #[test]
    fn test_duration_unknown_frame_count_is_zero() {
        assert_relative_eq!(metadata(30.0, 0).duration_seconds(), 0.0);
    }
}
