use super::video_reader::VideoReader;
use super::video_writer::VideoWriter;

/// Hands out fresh per-job reader and writer instances.
pub trait VideoBackend: Send + Sync {
    fn new_reader(&self) -> Box<dyn VideoReader>;
    fn new_writer(&self) -> Box<dyn VideoWriter>;
}
