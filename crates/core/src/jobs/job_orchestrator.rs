use std::collections::{HashMap, HashSet};
use std::fs;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::jobs::domain::artifact::{Artifact, FetchResult};
use crate::jobs::domain::job::{JobId, JobKind, JobState, PayloadItem};
use crate::jobs::domain::job_error::JobError;
use crate::jobs::domain::manifest::{ArtifactEntry, ImageManifest, Manifest, VideoManifest};
use crate::jobs::domain::stats_recorder::{StatKey, StatsRecorder, StatsSnapshot};
use crate::jobs::infrastructure::worker_pool::WorkerPool;
use crate::jobs::infrastructure::zip_bundler;
use crate::jobs::submission_validator::SubmissionValidator;
use crate::pipeline::image_pipeline::ImagePipeline;
use crate::pipeline::pipeline_logger::LogPipelineLogger;
use crate::pipeline::video_pipeline::{VideoOptions, VideoPipeline};
use crate::shared::constants::{IMAGE_CONTENT_TYPE, VIDEO_CONTENT_TYPE};
use crate::storage::artifact_store::{remove_file_if_exists, ArtifactStore};

/// Settled entries outlive their artifacts by at most this long unless
/// [`JobOrchestrator::with_retention`] says otherwise.
const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

type JobTable = Arc<Mutex<HashMap<JobId, JobEntry>>>;

/// A job's state plus the moment it last settled (`None` while pending).
#[derive(Debug)]
struct JobEntry {
    state: JobState,
    settled_at: Option<Instant>,
}

impl JobEntry {
    fn pending() -> Self {
        Self {
            state: JobState::Pending,
            settled_at: None,
        }
    }

    fn settled(state: JobState) -> Self {
        Self {
            state,
            settled_at: Some(Instant::now()),
        }
    }
}

/// Everything a worker needs to run a job.
pub struct JobRuntime {
    pub store: ArtifactStore,
    pub images: ImagePipeline,
    pub videos: VideoPipeline,
    pub video_options: VideoOptions,
}

/// Turns pipeline runs into addressable, one-shot jobs.
///
/// `submit` validates and enqueues; `fetch` hands out the artifacts of a
/// finished job exactly once and deletes them.
pub struct JobOrchestrator {
    runtime: Arc<JobRuntime>,
    validator: SubmissionValidator,
    stats: Arc<dyn StatsRecorder>,
    jobs: JobTable,
    retention: Duration,
    pool: WorkerPool,
}

impl JobOrchestrator {
    pub fn new(
        runtime: JobRuntime,
        validator: SubmissionValidator,
        stats: Arc<dyn StatsRecorder>,
        workers: usize,
    ) -> Self {
        Self {
            runtime: Arc::new(runtime),
            validator,
            stats,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            retention: DEFAULT_RETENTION,
            pool: WorkerPool::new(workers),
        }
    }

    /// How long succeeded, failed and consumed entries stay addressable.
    /// Usually the storage TTL, so an entry never outlives its files by much.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.runtime.store
    }

    /// Validates the payload and schedules the job.
    ///
    /// Validation failures are returned here and no job is created.
    pub fn submit(&self, kind: JobKind, items: Vec<PayloadItem>) -> Result<JobId, JobError> {
        self.stats.increment(StatKey::TotalRequests, 1);
        self.validator.validate(kind, &items)?;

        let id = JobId::new();
        {
            let mut jobs = lock(&self.jobs);
            prune_settled(&mut jobs, self.retention, Instant::now());
            jobs.insert(id.clone(), JobEntry::pending());
        }
        self.stats.increment(StatKey::TotalTasks, 1);
        log::info!("Job {id} queued: {} {kind:?} file(s)", items.len());

        let runtime = self.runtime.clone();
        let jobs = self.jobs.clone();
        let job_id = id.clone();
        self.pool.execute(move || execute_job(&runtime, &jobs, job_id, kind, items));
        Ok(id)
    }

    /// Pending, a failure, or the artifact (which consumes the job).
    ///
    /// Only one caller ever receives a job's artifacts; later fetches get
    /// [`JobError::ResultAlreadyConsumed`].
    pub fn fetch(&self, id: &JobId) -> Result<FetchResult, JobError> {
        let manifest = {
            let mut jobs = lock(&self.jobs);
            prune_settled(&mut jobs, self.retention, Instant::now());
            let Some(entry) = jobs.get_mut(id) else {
                return Ok(FetchResult::Pending);
            };
            match mem::replace(&mut entry.state, JobState::Consumed) {
                JobState::Succeeded(manifest) => {
                    entry.settled_at = Some(Instant::now());
                    manifest
                }
                JobState::Pending => {
                    entry.state = JobState::Pending;
                    return Ok(FetchResult::Pending);
                }
                JobState::Failed(cause) => {
                    entry.state = JobState::Failed(cause.clone());
                    return Ok(FetchResult::Failed(cause));
                }
                JobState::Consumed => return Err(JobError::ResultAlreadyConsumed),
            }
        };

        let loaded = load_artifact(&manifest);
        let removed = self.runtime.store.remove_paths(&manifest.paths());
        log::debug!("Job {id} consumed, {removed} file(s) removed");

        let artifact = loaded?;
        match &manifest {
            Manifest::Image(m) => {
                self.stats.increment(StatKey::TotalImages, m.entries.len() as u64);
            }
            Manifest::Video(m) => {
                self.stats.increment(StatKey::TotalVideos, 1);
                self.stats.increment(
                    StatKey::TotalVideoSeconds,
                    m.duration_seconds.max(0.0).round() as u64,
                );
            }
        }
        Ok(FetchResult::Ready(artifact))
    }

    pub fn record_visitor(&self, visitor_id: &str) -> bool {
        self.stats.record_visitor(visitor_id)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

fn lock(jobs: &JobTable) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
    jobs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drops entries that settled at least `retention` before `now`.
/// Pending entries are always kept.
fn prune_settled(jobs: &mut HashMap<JobId, JobEntry>, retention: Duration, now: Instant) {
    let before = jobs.len();
    jobs.retain(|_, entry| match entry.settled_at {
        Some(at) => now.saturating_duration_since(at) < retention,
        None => true,
    });
    let evicted = before - jobs.len();
    if evicted > 0 {
        log::debug!("Evicted {evicted} expired job(s)");
    }
}

fn execute_job(
    runtime: &JobRuntime,
    jobs: &JobTable,
    id: JobId,
    kind: JobKind,
    items: Vec<PayloadItem>,
) {
    log::info!("Job {id} started");
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_job(runtime, &id, kind, items)))
        .unwrap_or_else(|_| {
            Err(JobError::ExecutionFailed {
                kind: "panic".into(),
                message: "job panicked".into(),
            })
        });

    let state = match outcome {
        Ok(manifest) => {
            log::info!("Job {id} succeeded: {} artifact(s)", manifest.entries().len());
            JobState::Succeeded(manifest)
        }
        Err(cause) => {
            log::warn!("Job {id} failed: {cause}");
            runtime.store.discard_job_dir(&id);
            JobState::Failed(cause)
        }
    };
    lock(jobs).insert(id, JobEntry::settled(state));
}

fn run_job(
    runtime: &JobRuntime,
    id: &JobId,
    kind: JobKind,
    items: Vec<PayloadItem>,
) -> Result<Manifest, JobError> {
    let dir = runtime.store.create_job_dir(id).map_err(io_failure)?;
    match kind {
        JobKind::Image => run_images(runtime, &dir, items),
        JobKind::Video => {
            let item = items
                .into_iter()
                .next()
                .ok_or_else(|| JobError::Invalid("no video uploaded".into()))?;
            run_video(runtime, &dir, item)
        }
    }
}

fn run_images(
    runtime: &JobRuntime,
    dir: &Path,
    items: Vec<PayloadItem>,
) -> Result<Manifest, JobError> {
    let mut taken = HashSet::new();
    let mut entries = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let blurred = runtime.images.process(&item.data)?;
        let filename = unique_name(image_output_name(&item.filename, index), &mut taken);
        let path = dir.join(&filename);
        fs::write(&path, blurred).map_err(io_failure)?;
        entries.push(ArtifactEntry {
            filename,
            content_type: IMAGE_CONTENT_TYPE.to_string(),
            artifact_path: path,
        });
    }
    Ok(Manifest::Image(ImageManifest { entries }))
}

fn run_video(runtime: &JobRuntime, dir: &Path, item: PayloadItem) -> Result<Manifest, JobError> {
    let input = dir.join(staged_input_name(&item.filename));
    fs::write(&input, &item.data).map_err(io_failure)?;
    log::info!("Video input staged at {} ({} bytes)", input.display(), item.data.len());

    let filename = video_output_name(&item.filename);
    let output = dir.join(&filename);
    let mut logger = LogPipelineLogger::default();
    let result = runtime
        .videos
        .process_with_logger(&input, &output, &runtime.video_options, &mut logger);

    if let Err(e) = remove_file_if_exists(&input) {
        log::warn!("Could not remove staged input {}: {e}", input.display());
    }
    let report = result?;
    log::info!(
        "Video {} done: {} frames at {:.2} fps, {:.2}s ({:?})",
        output.display(),
        report.frame_count,
        report.output_fps,
        report.duration_seconds,
        report.outcome
    );

    Ok(Manifest::Video(VideoManifest {
        entry: ArtifactEntry {
            filename,
            content_type: VIDEO_CONTENT_TYPE.to_string(),
            artifact_path: output,
        },
        duration_seconds: report.duration_seconds,
    }))
}

fn load_artifact(manifest: &Manifest) -> Result<Artifact, JobError> {
    let mut artifacts = manifest
        .entries()
        .into_iter()
        .map(read_entry)
        .collect::<Result<Vec<_>, _>>()?;

    match manifest {
        Manifest::Video(m) => {
            let mut artifact = artifacts.pop().ok_or(JobError::ResultMissing)?;
            artifact.duration_seconds = Some(m.duration_seconds);
            Ok(artifact)
        }
        Manifest::Image(_) if artifacts.len() == 1 => artifacts.pop().ok_or(JobError::ResultMissing),
        Manifest::Image(_) if artifacts.is_empty() => Err(JobError::ResultMissing),
        Manifest::Image(_) => zip_bundler::bundle(&artifacts).map_err(|e| JobError::ExecutionFailed {
            kind: "archive".into(),
            message: e.to_string(),
        }),
    }
}

fn read_entry(entry: &ArtifactEntry) -> Result<Artifact, JobError> {
    let bytes = fs::read(&entry.artifact_path).map_err(|e| {
        log::warn!("Artifact {} unreadable: {e}", entry.artifact_path.display());
        JobError::ResultMissing
    })?;
    Ok(Artifact {
        filename: entry.filename.clone(),
        content_type: entry.content_type.clone(),
        bytes,
        duration_seconds: None,
    })
}

fn io_failure(e: std::io::Error) -> JobError {
    JobError::ExecutionFailed {
        kind: "io".into(),
        message: e.to_string(),
    }
}

/// Final path component of an uploaded name, stripped of anything that
/// could escape the job directory.
fn file_stem_of(filename: &str) -> Option<String> {
    let name = sanitized_name(filename)?;
    Path::new(&name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn sanitized_name(filename: &str) -> Option<String> {
    filename
        .rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map(str::to_string)
}

fn image_output_name(filename: &str, index: usize) -> String {
    match file_stem_of(filename) {
        Some(stem) => format!("{stem}_blurred.jpg"),
        None => format!("blurred_{index}.jpg"),
    }
}

fn video_output_name(filename: &str) -> String {
    match file_stem_of(filename) {
        Some(stem) => format!("{stem}_blurred.mp4"),
        None => "blurred_video.mp4".to_string(),
    }
}

fn staged_input_name(filename: &str) -> String {
    sanitized_name(filename).unwrap_or_else(|| "upload".to_string())
}

/// `a.jpg`, `a_1.jpg`, `a_2.jpg`, ... in order of first use.
fn unique_name(candidate: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(candidate.clone()) {
        return candidate;
    }
    let path = Path::new(&candidate);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("blurred");
    let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("jpg");
    let mut n = 1;
    loop {
        let name = format!("{stem}_{n}.{extension}");
        if taken.insert(name.clone()) {
            return name;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymizing::domain::frame_anonymizer::FrameAnonymizer;
    use crate::config::Settings;
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::jobs::infrastructure::in_memory_stats::InMemoryStats;
    use crate::jobs::submission_validator::SubmissionLimits;
    use crate::shared::bounding_box::{BoundingBox, DetectionSet};
    use crate::shared::frame::Frame;
    use crate::shared::video_metadata::VideoMetadata;
    use crate::video::domain::command_runner::{CommandOutput, CommandRunner};
    use crate::video::domain::duration_probe::DurationProbe;
    use crate::video::domain::video_backend::VideoBackend;
    use crate::video::domain::video_reader::VideoReader;
    use crate::video::domain::video_writer::VideoWriter;
    use crate::video::infrastructure::media_finisher::MediaFinisher;
    use rstest::rstest;
    use std::io::{Cursor, Read};
    use std::path::PathBuf;
    use std::sync::Barrier;
    use std::thread;

    // --- Stubs ---

    struct StubDetector;

    impl FaceDetector for StubDetector {
        fn detect(
            &self,
            _frame: &Frame,
            _scale: f64,
        ) -> Result<DetectionSet, Box<dyn std::error::Error>> {
            Ok(vec![BoundingBox::new(2, 2, 8, 8)])
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(
            &self,
            _frame: &Frame,
            _scale: f64,
        ) -> Result<DetectionSet, Box<dyn std::error::Error>> {
            Err("cascade evaluation failed".into())
        }
    }

    struct PanickingDetector;

    impl FaceDetector for PanickingDetector {
        fn detect(
            &self,
            _frame: &Frame,
            _scale: f64,
        ) -> Result<DetectionSet, Box<dyn std::error::Error>> {
            panic!("detector blew up")
        }
    }

    struct NoopAnonymizer;

    impl FrameAnonymizer for NoopAnonymizer {
        fn apply(
            &self,
            _frame: &mut Frame,
            _boxes: &[BoundingBox],
        ) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
    }

    /// Serves a few grey frames per reader it hands out.
    struct FramesReader {
        remaining: usize,
    }

    impl VideoReader for FramesReader {
        fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            if !path.exists() {
                return Err("no such file".into());
            }
            Ok(VideoMetadata {
                width: 8,
                height: 8,
                fps: 10.0,
                total_frames: self.remaining,
                codec: "stub".into(),
                source_path: Some(path.to_path_buf()),
            })
        }

        fn read(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(Frame::new(vec![90; 8 * 8 * 3], 8, 8, 0)?))
        }

        fn skip(&mut self) -> Result<bool, Box<dyn std::error::Error>> {
            Ok(self.read()?.is_some())
        }

        fn close(&mut self) {}
    }

    struct FileWriter {
        path: Option<PathBuf>,
        frames: usize,
    }

    impl VideoWriter for FileWriter {
        fn open(
            &mut self,
            path: &Path,
            _metadata: &VideoMetadata,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.path = Some(path.to_path_buf());
            Ok(())
        }

        fn write(&mut self, _frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.frames += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            if let Some(path) = self.path.take() {
                fs::write(path, format!("{} frames", self.frames))?;
            }
            Ok(())
        }
    }

    struct StubBackend {
        frames: usize,
    }

    impl VideoBackend for StubBackend {
        fn new_reader(&self) -> Box<dyn VideoReader> {
            Box::new(FramesReader {
                remaining: self.frames,
            })
        }

        fn new_writer(&self) -> Box<dyn VideoWriter> {
            Box::new(FileWriter {
                path: None,
                frames: 0,
            })
        }
    }

    struct MissingTool;

    impl CommandRunner for MissingTool {
        fn is_available(&self, _program: &str) -> bool {
            false
        }

        fn run(
            &self,
            program: &str,
            _args: &[String],
        ) -> Result<CommandOutput, Box<dyn std::error::Error>> {
            Err(format!("{program} not installed").into())
        }
    }

    struct FixedProbe(f64);

    impl DurationProbe for FixedProbe {
        fn duration_seconds(&self, _path: &Path) -> Result<f64, Box<dyn std::error::Error>> {
            Ok(self.0)
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([120, 80, 60]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn mp4_bytes() -> Vec<u8> {
        let mut data = vec![0, 0, 0, 0x18];
        data.extend_from_slice(b"ftypisom");
        data.resize(64, 0);
        data
    }

    fn orchestrator_with(detector: Arc<dyn FaceDetector>, video_frames: usize) -> (JobOrchestrator, tempfile::TempDir) {
        let root = tempfile::tempdir().unwrap();
        let anonymizer: Arc<dyn FrameAnonymizer> = Arc::new(NoopAnonymizer);
        let runtime = JobRuntime {
            store: ArtifactStore::new(root.path()),
            images: ImagePipeline::new(detector.clone(), anonymizer.clone()),
            videos: VideoPipeline::new(
                detector,
                anonymizer,
                Arc::new(StubBackend {
                    frames: video_frames,
                }),
                MediaFinisher::new(Arc::new(MissingTool)),
            ),
            video_options: VideoOptions::default(),
        };
        let validator = SubmissionValidator::new(
            SubmissionLimits::from_settings(&Settings::default()),
            Arc::new(FixedProbe(3.6)),
        );
        let orchestrator = JobOrchestrator::new(runtime, validator, Arc::new(InMemoryStats::new()), 0);
        (orchestrator, root)
    }

    fn orchestrator() -> (JobOrchestrator, tempfile::TempDir) {
        orchestrator_with(Arc::new(StubDetector), 4)
    }

    fn image_item(name: &str) -> PayloadItem {
        PayloadItem::new(name, "image/png", png_bytes(16, 12))
    }

    fn ready(result: FetchResult) -> Artifact {
        match result {
            FetchResult::Ready(artifact) => artifact,
            other => panic!("expected artifact, got {other:?}"),
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    #[test]
    fn test_unknown_job_is_pending() {
        let (orchestrator, _root) = orchestrator();
        assert_eq!(orchestrator.fetch(&JobId::new()), Ok(FetchResult::Pending));
    }

    #[test]
    fn test_queued_job_stays_pending() {
        let (orchestrator, _root) = orchestrator();
        let id = JobId::new();
        lock(&orchestrator.jobs).insert(id.clone(), JobEntry::pending());

        assert_eq!(orchestrator.fetch(&id), Ok(FetchResult::Pending));
        assert_eq!(orchestrator.fetch(&id), Ok(FetchResult::Pending));
    }

    #[test]
    fn test_single_image_returned_unbundled_then_consumed() {
        let (orchestrator, root) = orchestrator();
        let id = orchestrator
            .submit(JobKind::Image, vec![image_item("holiday.png")])
            .unwrap();
        let job_dir = root.path().join(id.as_str());
        assert!(job_dir.join("holiday_blurred.jpg").exists());

        let artifact = ready(orchestrator.fetch(&id).unwrap());
        assert_eq!(artifact.filename, "holiday_blurred.jpg");
        assert_eq!(artifact.content_type, "image/jpeg");
        assert!(image::load_from_memory(&artifact.bytes).is_ok());
        assert!(!job_dir.exists());

        assert_eq!(orchestrator.fetch(&id), Err(JobError::ResultAlreadyConsumed));
        assert!(orchestrator.fetch(&id).unwrap_err().is_result_missing());
    }

    #[test]
    fn test_multiple_images_bundled_as_zip() {
        let (orchestrator, _root) = orchestrator();
        let items = vec![image_item("a.png"), image_item("a.png"), image_item("b.png")];
        let id = orchestrator.submit(JobKind::Image, items).unwrap();

        let artifact = ready(orchestrator.fetch(&id).unwrap());
        assert_eq!(artifact.filename, "blurred_images.zip");
        assert_eq!(artifact.content_type, "application/zip");

        let mut zip = zip::ZipArchive::new(Cursor::new(artifact.bytes)).unwrap();
        let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["a_blurred.jpg", "a_blurred_1.jpg", "b_blurred.jpg"]);

        let mut jpeg = Vec::new();
        zip.by_name("b_blurred.jpg").unwrap().read_to_end(&mut jpeg).unwrap();
        assert!(image::load_from_memory(&jpeg).is_ok());
    }

    #[test]
    fn test_video_job_produces_mp4_with_duration() {
        let (orchestrator, root) = orchestrator();
        let id = orchestrator
            .submit(JobKind::Video, vec![PayloadItem::new("clip.mp4", "video/mp4", mp4_bytes())])
            .unwrap();

        let job_dir = root.path().join(id.as_str());
        assert!(!job_dir.join("clip.mp4").exists(), "staged input must be deleted");

        let artifact = ready(orchestrator.fetch(&id).unwrap());
        assert_eq!(artifact.filename, "clip_blurred.mp4");
        assert_eq!(artifact.content_type, "video/mp4");
        assert_eq!(artifact.bytes, b"4 frames");
        assert!(artifact.duration_seconds.is_some());
        assert!(!job_dir.exists());
    }

    // ── Failures ────────────────────────────────────────────────────

    #[test]
    fn test_validation_error_creates_no_job() {
        let (orchestrator, root) = orchestrator();
        let err = orchestrator
            .submit(JobKind::Image, vec![PayloadItem::new("a.png", "image/png", Vec::new())])
            .unwrap_err();

        assert_eq!(err.code(), "validation_error");
        assert!(lock(&orchestrator.jobs).is_empty());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
        assert_eq!(orchestrator.stats().total_requests, 1);
        assert_eq!(orchestrator.stats().total_tasks, 0);
    }

    #[test]
    fn test_pipeline_error_surfaces_on_fetch() {
        let (orchestrator, root) = orchestrator_with(Arc::new(FailingDetector), 4);
        let id = orchestrator
            .submit(JobKind::Image, vec![image_item("a.png")])
            .unwrap();

        let result = orchestrator.fetch(&id).unwrap();
        assert_eq!(result.status(), "error");
        match result {
            FetchResult::Failed(JobError::ExecutionFailed { kind, message }) => {
                assert_eq!(kind, "execution");
                assert!(message.contains("cascade evaluation failed"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!root.path().join(id.as_str()).exists());
        // failure is reported again, not consumed
        assert_eq!(orchestrator.fetch(&id).unwrap().status(), "error");
    }

    #[test]
    fn test_panicking_job_is_failed_not_lost() {
        let (orchestrator, _root) = orchestrator_with(Arc::new(PanickingDetector), 4);
        let id = orchestrator
            .submit(JobKind::Image, vec![image_item("a.png")])
            .unwrap();

        match orchestrator.fetch(&id).unwrap() {
            FetchResult::Failed(err) => assert_eq!(err.code(), "task_failed"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_video_without_frames_fails_with_decode_error() {
        let (orchestrator, _root) = orchestrator_with(Arc::new(StubDetector), 0);
        let id = orchestrator
            .submit(JobKind::Video, vec![PayloadItem::new("clip.mp4", "video/mp4", mp4_bytes())])
            .unwrap();

        match orchestrator.fetch(&id).unwrap() {
            FetchResult::Failed(err) => assert_eq!(err.code(), "decode_error"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_artifact_deleted_before_fetch_is_result_missing() {
        let (orchestrator, root) = orchestrator();
        let id = orchestrator
            .submit(JobKind::Image, vec![image_item("a.png")])
            .unwrap();
        fs::remove_file(root.path().join(id.as_str()).join("a_blurred.jpg")).unwrap();

        assert_eq!(orchestrator.fetch(&id), Err(JobError::ResultMissing));
        assert_eq!(orchestrator.fetch(&id), Err(JobError::ResultAlreadyConsumed));
        assert_eq!(orchestrator.stats().total_images, 0);
    }

    #[test]
    fn test_concurrent_fetches_have_one_winner() {
        const CALLERS: usize = 8;
        let (orchestrator, _root) = orchestrator();
        let id = orchestrator
            .submit(JobKind::Image, vec![image_item("a.png")])
            .unwrap();
        let barrier = Barrier::new(CALLERS);

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..CALLERS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        orchestrator.fetch(&id)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = results
            .iter()
            .filter(|r| matches!(r, Ok(FetchResult::Ready(_))))
            .count();
        let losers = results
            .iter()
            .filter(|r| **r == Err(JobError::ResultAlreadyConsumed))
            .count();
        assert_eq!(winners, 1);
        assert_eq!(losers, CALLERS - 1);
        assert_eq!(orchestrator.stats().total_images, 1);
    }

    // ── Retention ───────────────────────────────────────────────────

    #[test]
    fn test_prune_drops_only_expired_settled_entries() {
        let retention = Duration::from_secs(60);
        let now = Instant::now();
        let (failed, queued) = (JobId::new(), JobId::new());
        let mut jobs = HashMap::new();
        jobs.insert(
            failed.clone(),
            JobEntry {
                state: JobState::Failed(JobError::ResultMissing),
                settled_at: Some(now),
            },
        );
        jobs.insert(queued.clone(), JobEntry::pending());

        prune_settled(&mut jobs, retention, now + Duration::from_secs(30));
        assert_eq!(jobs.len(), 2);

        prune_settled(&mut jobs, retention, now + Duration::from_secs(90));
        assert!(!jobs.contains_key(&failed));
        assert!(jobs.contains_key(&queued));
    }

    #[test]
    fn test_consumed_entry_kept_within_retention() {
        let (orchestrator, _root) = orchestrator();
        let id = orchestrator
            .submit(JobKind::Image, vec![image_item("a.png")])
            .unwrap();
        ready(orchestrator.fetch(&id).unwrap());
        orchestrator
            .submit(JobKind::Image, vec![image_item("b.png")])
            .unwrap();

        assert!(lock(&orchestrator.jobs).contains_key(&id));
        assert_eq!(orchestrator.fetch(&id), Err(JobError::ResultAlreadyConsumed));
    }

    #[test]
    fn test_expired_entries_are_evicted() {
        let (orchestrator, _root) = orchestrator();
        let orchestrator = orchestrator.with_retention(Duration::ZERO);
        let first = orchestrator
            .submit(JobKind::Image, vec![image_item("a.png")])
            .unwrap();
        let second = orchestrator
            .submit(JobKind::Image, vec![image_item("b.png")])
            .unwrap();

        {
            let jobs = lock(&orchestrator.jobs);
            assert!(!jobs.contains_key(&first));
            assert!(jobs.contains_key(&second));
            assert_eq!(jobs.len(), 1);
        }
        // an evicted id reads like any unknown one
        assert_eq!(orchestrator.fetch(&first), Ok(FetchResult::Pending));
    }

    // ── Stats ───────────────────────────────────────────────────────

    #[test]
    fn test_stats_follow_submissions_and_fetches() {
        let (orchestrator, _root) = orchestrator();
        let images = orchestrator
            .submit(JobKind::Image, vec![image_item("a.png"), image_item("b.png")])
            .unwrap();
        let video = orchestrator
            .submit(JobKind::Video, vec![PayloadItem::new("clip.mp4", "video/mp4", mp4_bytes())])
            .unwrap();
        ready(orchestrator.fetch(&images).unwrap());
        ready(orchestrator.fetch(&video).unwrap());
        assert!(orchestrator.record_visitor("visitor-1"));
        assert!(!orchestrator.record_visitor("visitor-1"));

        let stats = orchestrator.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.total_images, 2);
        assert_eq!(stats.total_videos, 1);
        assert_eq!(stats.total_visitors, 1);
    }

    // ── Naming ──────────────────────────────────────────────────────

    #[rstest]
    #[case::plain("face.png", 0, "face_blurred.jpg")]
    #[case::nested_path("../../etc/face.png", 3, "face_blurred.jpg")]
    #[case::windows_path("C:\\photos\\me.jpeg", 1, "me_blurred.jpg")]
    #[case::no_name("", 2, "blurred_2.jpg")]
    fn test_image_output_name(#[case] input: &str, #[case] index: usize, #[case] expected: &str) {
        assert_eq!(image_output_name(input, index), expected);
    }

    #[rstest]
    #[case::plain("clip.webm", "clip_blurred.mp4", "clip.webm")]
    #[case::nested("uploads/x/clip.mov", "clip_blurred.mp4", "clip.mov")]
    #[case::empty("", "blurred_video.mp4", "upload")]
    #[case::dot_dot("..", "blurred_video.mp4", "upload")]
    fn test_video_names(#[case] input: &str, #[case] output: &str, #[case] staged: &str) {
        assert_eq!(video_output_name(input), output);
        assert_eq!(staged_input_name(input), staged);
    }

    #[test]
    fn test_unique_name_appends_counter() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("a.jpg".into(), &mut taken), "a.jpg");
        assert_eq!(unique_name("a.jpg".into(), &mut taken), "a_1.jpg");
        assert_eq!(unique_name("a.jpg".into(), &mut taken), "a_2.jpg");
    }
}
