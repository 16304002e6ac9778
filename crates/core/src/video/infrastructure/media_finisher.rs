use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::video::domain::command_runner::CommandRunner;

const FFMPEG: &str = "ffmpeg";
const H264_ARGS: &[&str] = &[
    "-c:v", "libx264", "-preset", "veryfast", "-crf", "23", "-pix_fmt", "yuv420p",
];
const AAC_ARGS: &[&str] = &["-c:a", "aac", "-b:a", "128k"];

/// How the final output file was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishOutcome {
    /// Processed video plus the source's audio track.
    Muxed,
    /// Silent video re-encoded to H.264.
    Transcoded,
    /// The raw encoder output, moved into place unchanged.
    Raw,
}

/// Post-processes a raw silent encode with the external ffmpeg binary.
///
/// Tool failures never fail the job: every failed step degrades to the raw
/// encode, which is always moved to `output`.
pub struct MediaFinisher {
    runner: Arc<dyn CommandRunner>,
}

impl MediaFinisher {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Produces `output` from `raw`. `raw` no longer exists afterwards.
    ///
    /// `Err` only when the raw file itself cannot be moved.
    pub fn finish(
        &self,
        raw: &Path,
        source: &Path,
        output: &Path,
        preserve_audio: bool,
        transcode: bool,
    ) -> std::io::Result<FinishOutcome> {
        let tool = self.runner.is_available(FFMPEG);
        if (preserve_audio || transcode) && !tool {
            log::warn!("{FFMPEG} not found on PATH, keeping silent raw encode");
        }

        if tool && preserve_audio {
            if self.try_run("audio mux", &mux_args(raw, source, output, transcode), output) {
                remove_if_exists(raw);
                return Ok(FinishOutcome::Muxed);
            }
        } else if tool && transcode {
            if self.try_run("transcode", &transcode_args(raw, output), output) {
                remove_if_exists(raw);
                return Ok(FinishOutcome::Transcoded);
            }
        }

        fs::rename(raw, output)?;
        Ok(FinishOutcome::Raw)
    }

    fn try_run(&self, step: &str, args: &[String], output: &Path) -> bool {
        match self.runner.run(FFMPEG, args) {
            Ok(result) if result.success() && output.exists() => true,
            Ok(result) => {
                log::warn!(
                    "{step} failed (exit {:?}): {}",
                    result.exit_code,
                    last_line(&result.stderr)
                );
                remove_if_exists(output);
                false
            }
            Err(e) => {
                log::warn!("{step} could not start: {e}");
                false
            }
        }
    }
}

/// Video from `raw`, first audio track from `source` if it has one.
pub fn mux_args(raw: &Path, source: &Path, output: &Path, transcode: bool) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-i"].iter().map(|s| s.to_string()).collect();
    args.push(raw.display().to_string());
    args.push("-i".into());
    args.push(source.display().to_string());
    args.extend(["-map", "0:v:0", "-map", "1:a:0?"].iter().map(|s| s.to_string()));
    if transcode {
        args.extend(H264_ARGS.iter().map(|s| s.to_string()));
    } else {
        args.extend(["-c:v", "copy"].iter().map(|s| s.to_string()));
    }
    args.extend(AAC_ARGS.iter().map(|s| s.to_string()));
    args.push("-shortest".into());
    args.push(output.display().to_string());
    args
}

pub fn transcode_args(raw: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-i".into(), raw.display().to_string()];
    args.extend(H264_ARGS.iter().map(|s| s.to_string()));
    args.push("-an".into());
    args.push(output.display().to_string());
    args
}

fn remove_if_exists(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove {}: {e}", path.display());
        }
    }
}

fn last_line(stderr: &str) -> &str {
    stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}
