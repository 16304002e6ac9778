use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{RecvTimeoutError, Sender};

/// Deletes expired artifacts, independent of whether they were fetched.
#[derive(Clone, Debug)]
pub struct Reaper {
    root: PathBuf,
    ttl: Duration,
    interval: Duration,
}

/// Stops a running reaper loop. Dropping it stops the loop as well.
pub struct ReaperHandle {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Reaper {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration, interval: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
            interval,
        }
    }

    pub fn sweep(&self) -> usize {
        sweep(&self.root, self.ttl)
    }

    /// Starts the periodic loop on its own thread.
    ///
    /// Returns `None` when the interval is zero, which disables the loop.
    pub fn spawn(self) -> io::Result<Option<ReaperHandle>> {
        if self.interval.is_zero() {
            log::info!("Storage cleanup disabled");
            return Ok(None);
        }

        let (stop, stopped) = crossbeam_channel::bounded::<()>(1);
        let thread = std::thread::Builder::new()
            .name("faceblur-reaper".into())
            .spawn(move || loop {
                self.sweep();
                match stopped.recv_timeout(self.interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;

        Ok(Some(ReaperHandle {
            stop: Some(stop),
            thread: Some(thread),
        }))
    }
}

impl ReaperHandle {
    /// Signals the loop and waits for the current sweep to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("Reaper thread panicked");
            }
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Removes every file under `root` whose modification age is at least `ttl`,
/// then every directory left empty by that, deepest first.
///
/// Returns the number of files removed. Filesystem errors are logged and skipped.
pub fn sweep(root: &Path, ttl: Duration) -> usize {
    if !root.is_dir() {
        return 0;
    }
    let now = SystemTime::now();
    let removed = sweep_dir(root, ttl, now);
    if removed > 0 {
        log::info!("Storage cleanup removed {removed} file(s) from {}", root.display());
    }
    removed
}

fn sweep_dir(dir: &Path, ttl: Duration, now: SystemTime) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot list {}: {e}", dir.display());
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        if file_type.is_dir() {
            let removed_here = sweep_dir(&path, ttl, now);
            removed += removed_here;
            if removed_here > 0 || is_expired(&path, ttl, now) {
                // fails harmlessly while the directory still holds fresh files
                if let Err(e) = fs::remove_dir(&path) {
                    log::debug!("Keeping {}: {e}", path.display());
                }
            }
        } else if is_expired(&path, ttl, now) {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Could not remove {}: {e}", path.display()),
            }
        }
    }
    removed
}

fn is_expired(path: &Path, ttl: Duration, now: SystemTime) -> bool {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => now.duration_since(modified).unwrap_or(Duration::ZERO) >= ttl,
        Err(_) => false,
    }
}
