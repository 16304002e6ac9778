use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::anonymizing::domain::frame_anonymizer::FrameAnonymizer;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::skip_frame_detector::SkipFrameDetector;
use crate::shared::constants::DEFAULT_VIDEO_FPS;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_backend::VideoBackend;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;
use crate::video::infrastructure::media_finisher::{FinishOutcome, MediaFinisher};

use super::pipeline_error::PipelineError;
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};

/// Per-run video knobs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoOptions {
    /// Detection runs on a copy scaled by this factor.
    pub detect_scale: f64,
    /// Detect on every n-th kept frame and reuse boxes in between.
    pub detect_every_n: usize,
    /// Output frame-rate cap; 0 keeps the source rate.
    pub max_fps: f64,
    pub preserve_audio: bool,
    pub transcode: bool,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            detect_scale: 0.5,
            detect_every_n: 4,
            max_fps: 20.0,
            preserve_audio: true,
            transcode: true,
        }
    }
}

/// What a successful run produced.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoReport {
    pub frame_count: usize,
    pub output_fps: f64,
    pub duration_seconds: f64,
    pub outcome: FinishOutcome,
}

/// Number of source frames consumed per output frame.
pub fn frame_stride(fps: f64, max_fps: f64) -> usize {
    if max_fps > 0.0 && fps > max_fps {
        ((fps / max_fps).round() as usize).max(1)
    } else {
        1
    }
}

/// Video pipeline: decode → (every n-th frame) locate → anonymize → encode,
/// then hand the silent encode to the [`MediaFinisher`].
///
/// Frames are processed strictly in order on the calling thread.
pub struct VideoPipeline {
    detector: Arc<dyn FaceDetector>,
    anonymizer: Arc<dyn FrameAnonymizer>,
    backend: Arc<dyn VideoBackend>,
    finisher: MediaFinisher,
}

impl VideoPipeline {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        anonymizer: Arc<dyn FrameAnonymizer>,
        backend: Arc<dyn VideoBackend>,
        finisher: MediaFinisher,
    ) -> Self {
        Self {
            detector,
            anonymizer,
            backend,
            finisher,
        }
    }

    pub fn process(
        &self,
        input: &Path,
        output: &Path,
        options: &VideoOptions,
    ) -> Result<VideoReport, PipelineError> {
        self.process_with_logger(input, output, options, &mut NullPipelineLogger)
    }

    pub fn process_with_logger(
        &self,
        input: &Path,
        output: &Path,
        options: &VideoOptions,
        logger: &mut dyn PipelineLogger,
    ) -> Result<VideoReport, PipelineError> {
        let mut reader = self.backend.new_reader();
        let source = reader
            .open(input)
            .map_err(|e| PipelineError::Decode(format!("{}: {e}", input.display())))?;

        let fps = if source.fps > 0.0 {
            source.fps
        } else {
            DEFAULT_VIDEO_FPS
        };
        let stride = frame_stride(fps, options.max_fps);
        let output_fps = fps / stride as f64;

        let first = match reader.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                reader.close();
                return Err(PipelineError::NoFrames);
            }
            Err(e) => {
                reader.close();
                return Err(PipelineError::Decode(format!("{}: {e}", input.display())));
            }
        };

        logger.info(&format!(
            "{}: {}x{} at {fps:.2} fps, keeping every {stride} frame(s)",
            input.display(),
            first.width(),
            first.height()
        ));

        let raw = raw_output_path(output);
        let expected_frames = source.total_frames.div_ceil(stride);
        let target = VideoMetadata {
            width: first.width(),
            height: first.height(),
            fps: output_fps,
            total_frames: expected_frames,
            codec: String::new(),
            source_path: None,
        };

        let mut writer = self.backend.new_writer();
        if let Err(e) = writer.open(&raw, &target) {
            reader.close();
            return Err(PipelineError::Configuration(e.to_string()));
        }

        let encoded = self.encode_frames(
            reader.as_mut(),
            writer.as_mut(),
            first,
            stride,
            expected_frames,
            options,
            logger,
        );
        reader.close();
        let closed = writer.close();

        let frame_count = match encoded.and_then(|n| {
            closed.map_err(|e| PipelineError::Execution(format!("finalising video: {e}")))?;
            Ok(n)
        }) {
            Ok(n) => n,
            Err(e) => {
                remove_if_exists(&raw);
                return Err(e);
            }
        };

        let outcome = self.finisher.finish(
            &raw,
            input,
            output,
            options.preserve_audio,
            options.transcode,
        )?;
        logger.summary();

        Ok(VideoReport {
            frame_count,
            output_fps,
            duration_seconds: frame_count as f64 / output_fps,
            outcome,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn encode_frames(
        &self,
        reader: &mut dyn VideoReader,
        writer: &mut dyn VideoWriter,
        first: Frame,
        stride: usize,
        expected_frames: usize,
        options: &VideoOptions,
        logger: &mut dyn PipelineLogger,
    ) -> Result<usize, PipelineError> {
        let mut detector = SkipFrameDetector::new(
            self.detector.as_ref(),
            options.detect_every_n.max(1),
            options.detect_scale,
        )
        .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        let mut written = 0;
        let mut next = Some(first);
        while let Some(mut frame) = next {
            let t0 = Instant::now();
            let boxes = detector
                .detect(&frame)
                .map_err(|e| PipelineError::Execution(format!("face detection: {e}")))?;
            logger.timing("detect", elapsed_ms(t0));
            logger.metric("faces", boxes.len() as f64);

            let t0 = Instant::now();
            self.anonymizer
                .apply(&mut frame, &boxes)
                .map_err(|e| PipelineError::Execution(format!("anonymize: {e}")))?;
            logger.timing("anonymize", elapsed_ms(t0));

            let t0 = Instant::now();
            writer
                .write(&frame)
                .map_err(|e| PipelineError::Execution(format!("encode: {e}")))?;
            logger.timing("encode", elapsed_ms(t0));

            written += 1;
            logger.progress(written, expected_frames);
            next = next_kept(reader, stride);
        }
        Ok(written)
    }
}

/// Skips `stride - 1` frames and reads the next one.
///
/// A decode error mid-stream ends the stream; everything before it is kept.
fn next_kept(reader: &mut dyn VideoReader, stride: usize) -> Option<Frame> {
    for _ in 1..stride {
        match reader.skip() {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                log::warn!("Stopping at undecodable frame: {e}");
                return None;
            }
        }
    }
    match reader.read() {
        Ok(frame) => frame,
        Err(e) => {
            log::warn!("Stopping at undecodable frame: {e}");
            None
        }
    }
}

/// Silent intermediate encode next to the final output.
pub fn raw_output_path(output: &Path) -> PathBuf {
    output.with_extension("video.mp4")
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn remove_if_exists(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Could not remove {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::bounding_box::{BoundingBox, DetectionSet};
    use crate::video::domain::command_runner::{CommandOutput, CommandRunner};
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::fs;
    use std::sync::Mutex;

    // --- Stubs ---

    /// Serves `count` solid frames at `fps`; fails on read of `fail_at`.
    struct ScriptedReader {
        fps: f64,
        count: usize,
        fail_at: Option<usize>,
        position: usize,
        events: Arc<Mutex<Vec<String>>>,
    }

    impl VideoReader for ScriptedReader {
        fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            self.events.lock().unwrap().push("open".into());
            Ok(VideoMetadata {
                width: 8,
                height: 6,
                fps: self.fps,
                total_frames: self.count,
                codec: "stub".into(),
                source_path: Some(path.to_path_buf()),
            })
        }

        fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
            if Some(self.position) == self.fail_at {
                return Err("corrupt packet".into());
            }
            if self.position >= self.count {
                return Ok(None);
            }
            let frame = Frame::new(vec![200; 8 * 6 * 3], 8, 6, self.position)?;
            self.position += 1;
            Ok(Some(frame))
        }

        fn skip(&mut self) -> Result<bool, Box<dyn std::error::Error>> {
            if self.position >= self.count {
                return Ok(false);
            }
            self.position += 1;
            Ok(true)
        }

        fn close(&mut self) {
            self.events.lock().unwrap().push("reader closed".into());
        }
    }

    /// Records written frame indices; creates the file on open like a real muxer.
    struct RecordingWriter {
        fail_open: bool,
        opened: Arc<Mutex<Vec<VideoMetadata>>>,
        written: Arc<Mutex<Vec<usize>>>,
        events: Arc<Mutex<Vec<String>>>,
        path: Option<PathBuf>,
    }

    impl VideoWriter for RecordingWriter {
        fn open(
            &mut self,
            path: &Path,
            metadata: &VideoMetadata,
        ) -> Result<(), Box<dyn std::error::Error>> {
            if self.fail_open {
                return Err("no usable video encoder (tried mpeg4)".into());
            }
            fs::write(path, b"")?;
            self.path = Some(path.to_path_buf());
            self.opened.lock().unwrap().push(metadata.clone());
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.written.lock().unwrap().push(frame.index());
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            if let Some(path) = self.path.take() {
                fs::write(path, b"raw video")?;
            }
            self.events.lock().unwrap().push("writer closed".into());
            Ok(())
        }
    }

    struct StubBackend {
        reader: Mutex<Option<ScriptedReader>>,
        writer: Mutex<Option<RecordingWriter>>,
    }

    impl VideoBackend for StubBackend {
        fn new_reader(&self) -> Box<dyn VideoReader> {
            Box::new(self.reader.lock().unwrap().take().unwrap())
        }

        fn new_writer(&self) -> Box<dyn VideoWriter> {
            Box::new(self.writer.lock().unwrap().take().unwrap())
        }
    }

    /// Records which frames were searched, always reports one face.
    struct CountingDetector {
        calls: Arc<Mutex<Vec<(usize, f64)>>>,
    }

    impl FaceDetector for CountingDetector {
        fn detect(
            &self,
            frame: &Frame,
            scale: f64,
        ) -> Result<DetectionSet, Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().push((frame.index(), scale));
            Ok(vec![BoundingBox::new(0, 0, 4, 4)])
        }
    }

    struct RecordingAnonymizer {
        calls: Arc<Mutex<Vec<(usize, usize)>>>,
    }

    impl FrameAnonymizer for RecordingAnonymizer {
        fn apply(
            &self,
            frame: &mut Frame,
            boxes: &[BoundingBox],
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.calls.lock().unwrap().push((frame.index(), boxes.len()));
            Ok(())
        }
    }

    /// A tool that is either missing or always succeeds by writing its output.
    struct FakeRunner {
        available: bool,
    }

    impl CommandRunner for FakeRunner {
        fn is_available(&self, _program: &str) -> bool {
            self.available
        }

        fn run(
            &self,
            _program: &str,
            args: &[String],
        ) -> Result<CommandOutput, Box<dyn std::error::Error>> {
            let out = args.last().ok_or("no output argument")?;
            fs::write(out, b"muxed")?;
            Ok(CommandOutput {
                exit_code: Some(0),
                stderr: String::new(),
            })
        }
    }

    struct Harness {
        pipeline: VideoPipeline,
        events: Arc<Mutex<Vec<String>>>,
        opened: Arc<Mutex<Vec<VideoMetadata>>>,
        written: Arc<Mutex<Vec<usize>>>,
        detections: Arc<Mutex<Vec<(usize, f64)>>>,
        anonymized: Arc<Mutex<Vec<(usize, usize)>>>,
        dir: tempfile::TempDir,
    }

    impl Harness {
        fn input(&self) -> PathBuf {
            self.dir.path().join("in.mp4")
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("in_blurred.mp4")
        }

        fn run(&self, options: &VideoOptions) -> Result<VideoReport, PipelineError> {
            self.pipeline.process(&self.input(), &self.output(), options)
        }
    }

    fn harness(fps: f64, count: usize, fail_at: Option<usize>, fail_open: bool, tool: bool) -> Harness {
        let events = Arc::new(Mutex::new(Vec::new()));
        let opened = Arc::new(Mutex::new(Vec::new()));
        let written = Arc::new(Mutex::new(Vec::new()));
        let detections = Arc::new(Mutex::new(Vec::new()));
        let anonymized = Arc::new(Mutex::new(Vec::new()));

        let backend = StubBackend {
            reader: Mutex::new(Some(ScriptedReader {
                fps,
                count,
                fail_at,
                position: 0,
                events: events.clone(),
            })),
            writer: Mutex::new(Some(RecordingWriter {
                fail_open,
                opened: opened.clone(),
                written: written.clone(),
                events: events.clone(),
                path: None,
            })),
        };
        let pipeline = VideoPipeline::new(
            Arc::new(CountingDetector {
                calls: detections.clone(),
            }),
            Arc::new(RecordingAnonymizer {
                calls: anonymized.clone(),
            }),
            Arc::new(backend),
            MediaFinisher::new(Arc::new(FakeRunner { available: tool })),
        );

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("in.mp4"), b"source").unwrap();
        Harness {
            pipeline,
            events,
            opened,
            written,
            detections,
            anonymized,
            dir,
        }
    }

    fn options(detect_every_n: usize, max_fps: f64) -> VideoOptions {
        VideoOptions {
            detect_scale: 0.5,
            detect_every_n,
            max_fps,
            preserve_audio: false,
            transcode: false,
        }
    }

    // ── Stride ───────────────────────────────────────────────────

    #[rstest]
    #[case::cap_divides_evenly(24.0, 8.0, 3)]
    #[case::rounds_to_nearest(30.0, 20.0, 2)]
    #[case::below_cap(15.0, 20.0, 1)]
    #[case::equal_to_cap(20.0, 20.0, 1)]
    #[case::uncapped(60.0, 0.0, 1)]
    #[case::barely_above_cap(21.0, 20.0, 1)]
    fn test_frame_stride(#[case] fps: f64, #[case] max_fps: f64, #[case] expected: usize) {
        assert_eq!(frame_stride(fps, max_fps), expected);
    }

    #[test]
    fn test_stride_law_24_to_8_fps() {
        let h = harness(24.0, 48, None, false, false);
        let report = h.run(&options(1, 8.0)).unwrap();

        assert_eq!(report.frame_count, 16);
        assert_relative_eq!(report.output_fps, 8.0);
        assert_relative_eq!(report.duration_seconds, 2.0);
        let written = h.written.lock().unwrap().clone();
        assert_eq!(written, (0..48).step_by(3).collect::<Vec<_>>());
        assert_relative_eq!(h.opened.lock().unwrap()[0].fps, 8.0);
    }

    #[test]
    fn test_unknown_fps_defaults_to_24() {
        let h = harness(0.0, 10, None, false, false);
        let report = h.run(&options(1, 0.0)).unwrap();
        assert_relative_eq!(report.output_fps, 24.0);
        assert_eq!(report.frame_count, 10);
    }

    // ── Detection cadence ────────────────────────────────────────

    #[test]
    fn test_detects_every_nth_kept_frame_and_reuses_boxes() {
        let h = harness(10.0, 10, None, false, false);
        h.run(&options(4, 0.0)).unwrap();

        let detected: Vec<usize> = h.detections.lock().unwrap().iter().map(|c| c.0).collect();
        assert_eq!(detected, vec![0, 4, 8]);
        assert!(h.detections.lock().unwrap().iter().all(|c| c.1 == 0.5));

        // every frame is anonymized with the cached single box
        let anonymized = h.anonymized.lock().unwrap().clone();
        assert_eq!(anonymized.len(), 10);
        assert!(anonymized.iter().all(|&(_, n)| n == 1));
    }

    #[test]
    fn test_cadence_counts_kept_frames_not_source_frames() {
        let h = harness(30.0, 12, None, false, false);
        // stride 2 keeps source frames 0, 2, 4, ...; every second kept frame is searched
        h.run(&options(2, 15.0)).unwrap();
        let detected: Vec<usize> = h.detections.lock().unwrap().iter().map(|c| c.0).collect();
        assert_eq!(detected, vec![0, 4, 8]);
    }

    // ── Failures ─────────────────────────────────────────────────

    #[test]
    fn test_empty_video_is_no_frames() {
        let h = harness(24.0, 0, None, false, false);
        let err = h.run(&options(1, 0.0)).unwrap_err();
        assert!(matches!(err, PipelineError::NoFrames));
        assert_eq!(*h.events.lock().unwrap(), vec!["open", "reader closed"]);
        assert!(!h.output().exists());
    }

    #[test]
    fn test_unreadable_first_frame_is_decode_error() {
        let h = harness(24.0, 5, Some(0), false, false);
        let err = h.run(&options(1, 0.0)).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn test_writer_open_failure_is_configuration_error() {
        let h = harness(24.0, 5, None, true, false);
        let err = h.run(&options(1, 0.0)).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(ref m) if m.contains("mpeg4")));
        assert!(h.events.lock().unwrap().contains(&"reader closed".to_string()));
    }

    #[test]
    fn test_mid_stream_decode_error_keeps_earlier_frames() {
        let h = harness(24.0, 10, Some(6), false, false);
        let report = h.run(&options(1, 0.0)).unwrap();
        assert_eq!(report.frame_count, 6);
        assert_eq!(fs::read(h.output()).unwrap(), b"raw video");
    }

    // ── Finishing ────────────────────────────────────────────────

    #[test]
    fn test_without_tool_raw_encode_becomes_output() {
        let h = harness(24.0, 3, None, false, false);
        let mut opts = options(1, 0.0);
        opts.preserve_audio = true;
        let report = h.run(&opts).unwrap();

        assert_eq!(report.outcome, FinishOutcome::Raw);
        assert_eq!(fs::read(h.output()).unwrap(), b"raw video");
        assert!(!raw_output_path(&h.output()).exists());
        let events = h.events.lock().unwrap();
        assert!(events.contains(&"reader closed".to_string()));
        assert!(events.contains(&"writer closed".to_string()));
    }

    #[test]
    fn test_audio_mux_success() {
        let h = harness(24.0, 3, None, false, true);
        let mut opts = options(1, 0.0);
        opts.preserve_audio = true;
        let report = h.run(&opts).unwrap();

        assert_eq!(report.outcome, FinishOutcome::Muxed);
        assert_eq!(fs::read(h.output()).unwrap(), b"muxed");
        assert!(!raw_output_path(&h.output()).exists());
    }

    #[test]
    fn test_raw_path_sits_next_to_output() {
        assert_eq!(
            raw_output_path(Path::new("/jobs/abc/clip_blurred.mp4")),
            PathBuf::from("/jobs/abc/clip_blurred.video.mp4")
        );
    }
}
