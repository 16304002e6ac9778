/// Outcome of an external tool invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external programs; lets the finishing steps be tested without ffmpeg.
pub trait CommandRunner: Send + Sync {
    /// Whether `program` can be found on this system.
    fn is_available(&self, program: &str) -> bool;

    /// Runs `program` to completion. `Err` means it could not be started.
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput, Box<dyn std::error::Error>>;
}
