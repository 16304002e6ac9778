pub mod ffmpeg_backend;
pub mod ffmpeg_probe;
pub mod ffmpeg_reader;
pub mod ffmpeg_writer;
pub mod image_codec;
pub mod media_finisher;
pub mod system_command_runner;
