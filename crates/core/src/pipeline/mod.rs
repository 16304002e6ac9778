pub mod image_pipeline;
pub mod pipeline_error;
pub mod pipeline_logger;
pub mod video_pipeline;
