pub mod anonymizing;
pub mod config;
pub mod detection;
pub mod jobs;
pub mod pipeline;
pub mod shared;
pub mod storage;
pub mod video;
