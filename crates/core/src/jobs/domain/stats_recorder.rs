use serde::{Deserialize, Serialize};

/// The fixed set of usage counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatKey {
    TotalRequests,
    TotalTasks,
    TotalImages,
    TotalVideos,
    TotalVideoSeconds,
    TotalVisitors,
}

impl StatKey {
    pub const ALL: [StatKey; 6] = [
        StatKey::TotalRequests,
        StatKey::TotalTasks,
        StatKey::TotalImages,
        StatKey::TotalVideos,
        StatKey::TotalVideoSeconds,
        StatKey::TotalVisitors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatKey::TotalRequests => "total_requests",
            StatKey::TotalTasks => "total_tasks",
            StatKey::TotalImages => "total_images",
            StatKey::TotalVideos => "total_videos",
            StatKey::TotalVideoSeconds => "total_video_seconds",
            StatKey::TotalVisitors => "total_visitors",
        }
    }
}

/// Point-in-time copy of every counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub total_tasks: u64,
    pub total_images: u64,
    pub total_videos: u64,
    pub total_video_seconds: u64,
    pub total_visitors: u64,
}

impl StatsSnapshot {
    pub fn get(&self, key: StatKey) -> u64 {
        match key {
            StatKey::TotalRequests => self.total_requests,
            StatKey::TotalTasks => self.total_tasks,
            StatKey::TotalImages => self.total_images,
            StatKey::TotalVideos => self.total_videos,
            StatKey::TotalVideoSeconds => self.total_video_seconds,
            StatKey::TotalVisitors => self.total_visitors,
        }
    }

    pub fn set(&mut self, key: StatKey, value: u64) {
        let slot = match key {
            StatKey::TotalRequests => &mut self.total_requests,
            StatKey::TotalTasks => &mut self.total_tasks,
            StatKey::TotalImages => &mut self.total_images,
            StatKey::TotalVideos => &mut self.total_videos,
            StatKey::TotalVideoSeconds => &mut self.total_video_seconds,
            StatKey::TotalVisitors => &mut self.total_visitors,
        };
        *slot = value;
    }
}

/// Usage counters. Auxiliary: failures here never affect a job.
pub trait StatsRecorder: Send + Sync {
    fn increment(&self, key: StatKey, amount: u64);

    /// Counts a visitor the first time `visitor_id` is seen; returns whether it was new.
    fn record_visitor(&self, visitor_id: &str) -> bool;

    fn snapshot(&self) -> StatsSnapshot;
}
