use thiserror::Error;

/// Failure of a single image or video pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("could not decode input: {0}")]
    Decode(String),
    #[error("input contains no readable frames")]
    NoFrames,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("processing failed: {0}")]
    Execution(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Decode(_) => "decode",
            PipelineError::NoFrames => "no_frames",
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Execution(_) => "execution",
            PipelineError::Io(_) => "io",
        }
    }
}
