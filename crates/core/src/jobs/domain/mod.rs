pub mod artifact;
pub mod job;
pub mod job_error;
pub mod manifest;
pub mod media_type;
pub mod stats_recorder;
