use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default gap between two progress lines.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Observer for long-running pipeline work.
///
/// Keeps the video loop free of any particular output mechanism; the CLI
/// logs through the `log` facade, tests pass [`NullPipelineLogger`].
pub trait PipelineLogger: Send {
    /// Report frame-level progress. `total` is 0 when the container does
    /// not know its frame count.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces per frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards every event.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Logger that writes through `log::info!`.
///
/// Progress lines are throttled by wall-clock time rather than frame count,
/// so slow high-resolution clips and fast thumbnails both produce a line
/// every few seconds. The final frame is always reported.
pub struct LogPipelineLogger {
    interval: Duration,
    last_report: Option<Instant>,
    reports: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    frames_seen: usize,
}

impl LogPipelineLogger {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: None,
            reports: 0,
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            frames_seen: 0,
        }
    }

    /// Number of progress lines emitted so far.
    pub fn reports(&self) -> usize {
        self.reports
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    /// Formatted per-stage summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let frames = self.frames_seen;
        let mut lines = vec![format!(
            "Pipeline summary ({frames} frames, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = mean(durations);
            let pct = if elapsed_ms > 0.0 {
                total_ms / elapsed_ms * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  {stage:12}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms  ({pct:4.1}%)"
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            lines.push(format!("  {name}: avg {:.1}", mean(&self.metrics[name])));
        }

        if frames > 0 && elapsed_ms > 0.0 {
            let fps = frames as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {fps:.1} fps"));
        }

        Some(lines.join("\n"))
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_INTERVAL)
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = self.frames_seen.max(current);
        let due = match self.last_report {
            None => true,
            Some(at) => at.elapsed() >= self.interval,
        };
        let last = total > 0 && current >= total;
        if !due && !last {
            return;
        }

        if total > 0 {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} frames ({pct:.1}%)");
        } else {
            log::info!("Processing: {current} frames");
        }
        self.last_report = Some(Instant::now());
        self.reports += 1;
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.entry(name.to_string()).or_default().push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // --- NullPipelineLogger ---

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 10);
        logger.timing("detect", 5.0);
        logger.metric("faces", 3.0);
        logger.info("hello");
        logger.summary();
    }

    // --- LogPipelineLogger ---

    #[test]
    fn test_progress_throttled_by_time() {
        let mut logger = LogPipelineLogger::new(Duration::from_secs(3600));
        for i in 1..20 {
            logger.progress(i, 20);
        }
        // first call only; the interval never elapses
        assert_eq!(logger.reports(), 1);
    }

    #[test]
    fn test_final_frame_always_reported() {
        let mut logger = LogPipelineLogger::new(Duration::from_secs(3600));
        for i in 1..=20 {
            logger.progress(i, 20);
        }
        assert_eq!(logger.reports(), 2);
    }

    #[test]
    fn test_zero_interval_reports_every_call() {
        let mut logger = LogPipelineLogger::new(Duration::ZERO);
        for i in 1..=5 {
            logger.progress(i, 0);
        }
        assert_eq!(logger.reports(), 5);
    }

    #[test]
    fn test_default_interval_is_five_seconds() {
        assert_eq!(LogPipelineLogger::default().interval, Duration::from_secs(5));
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = LogPipelineLogger::default();
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("anonymize", 5.0);

        assert_eq!(logger.timings_for("detect").unwrap(), &[20.0, 30.0]);
        assert_eq!(logger.timings_for("anonymize").unwrap().len(), 1);
        assert!(logger.timings_for("encode").is_none());
    }

    #[test]
    fn test_metric_average() {
        let mut logger = LogPipelineLogger::default();
        logger.metric("faces", 3.0);
        logger.metric("faces", 4.0);
        assert_relative_eq!(mean(logger.metrics_for("faces").unwrap()), 3.5);
    }

    #[test]
    fn test_summary_lists_stages_and_metrics() {
        let mut logger = LogPipelineLogger::default();
        logger.progress(10, 10);
        logger.timing("detect", 20.0);
        logger.timing("anonymize", 5.0);
        logger.metric("faces", 2.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Pipeline summary (10 frames"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("anonymize"));
        assert!(summary.contains("faces: avg 2.0"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(LogPipelineLogger::default().summary_string().is_none());
    }
}
