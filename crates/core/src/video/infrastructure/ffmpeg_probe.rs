use std::path::Path;

use crate::video::domain::duration_probe::DurationProbe;

/// Microseconds per second in libavformat's container duration.
const AV_TIME_BASE: f64 = 1_000_000.0;

/// Reads duration from the container header via ffmpeg-next.
///
/// Prefers frame count over frame rate from the best video stream and falls
/// back to the container duration. The input context is dropped on every
/// return path, closing the file.
pub struct FfmpegDurationProbe;

impl FfmpegDurationProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FfmpegDurationProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl DurationProbe for FfmpegDurationProbe {
    fn duration_seconds(&self, path: &Path) -> Result<f64, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let rate = stream.rate();
        let frames = stream.frames();
        if frames > 0 && rate.numerator() > 0 && rate.denominator() > 0 {
            let fps = rate.numerator() as f64 / rate.denominator() as f64;
            return Ok(frames as f64 / fps);
        }

        let duration = ictx.duration();
        if duration > 0 {
            return Ok(duration as f64 / AV_TIME_BASE);
        }
        Ok(0.0)
    }
}
