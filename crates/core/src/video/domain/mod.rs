pub mod command_runner;
pub mod duration_probe;
pub mod video_backend;
pub mod video_reader;
pub mod video_writer;
