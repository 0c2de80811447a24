use std::sync::Arc;

use thiserror::Error;

/// Failures surfaced by the process-execution layer.
///
/// Cloneable so a single error value can be handed out more than once (test
/// executors inject the same error on every matching call). I/O errors are
/// kept behind an `Arc` for that reason.
#[derive(Error, Debug, Clone)]
pub enum ShellError {
    #[error("failed to start {program}: {source}")]
    Start {
        program: String,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("{command} {}", describe_exit(.code))]
    Exit { command: String, code: Option<i32> },

    #[error("{command} was cancelled")]
    Cancelled { command: String },

    #[error("{command} timed out")]
    TimedOut { command: String },

    #[error("io error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    #[allow(dead_code)] // Raised only by the in-memory test executor.
    #[error("{0}")]
    Fixture(String),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

impl ShellError {
    pub fn start(program: impl Into<String>, source: std::io::Error) -> Self {
        ShellError::Start {
            program: program.into(),
            source: Arc::new(source),
        }
    }

    pub fn exit(command: impl Into<String>, code: Option<i32>) -> Self {
        ShellError::Exit {
            command: command.into(),
            code,
        }
    }

    /// True for both an explicit cancel and an expired deadline.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ShellError::Cancelled { .. } | ShellError::TimedOut { .. })
    }

    /// Exit code of a process that ran to completion with a failure status.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ShellError::Exit { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<std::io::Error> for ShellError {
    fn from(err: std::io::Error) -> Self {
        ShellError::Io(Arc::new(err))
    }
}
