use std::collections::HashSet;
use std::sync::Mutex;

use crate::jobs::domain::stats_recorder::{StatKey, StatsRecorder, StatsSnapshot};

/// Process-local counters; reset on restart.
#[derive(Default)]
pub struct InMemoryStats {
    counters: Mutex<StatsSnapshot>,
    visitors: Mutex<HashSet<String>>,
}

impl InMemoryStats {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsRecorder for InMemoryStats {
    fn increment(&self, key: StatKey, amount: u64) {
        match self.counters.lock() {
            Ok(mut counters) => {
                let value = counters.get(key).saturating_add(amount);
                counters.set(key, value);
            }
            Err(_) => log::warn!("Stats lock poisoned, dropping {} increment", key.as_str()),
        }
    }

    fn record_visitor(&self, visitor_id: &str) -> bool {
        let is_new = match self.visitors.lock() {
            Ok(mut visitors) => visitors.insert(visitor_id.to_string()),
            Err(_) => false,
        };
        if is_new {
            self.increment(StatKey::TotalVisitors, 1);
        }
        is_new
    }

    fn snapshot(&self) -> StatsSnapshot {
        self.counters.lock().map(|c| *c).unwrap_or_default()
    }
}
