use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use crate::error::ShellError;
use crate::shell::{CancelToken, Capture, Cmd, Console, Executor, OutStream, PrefixWriter};

/// Prefix put in front of every streamed line of brew output.
pub const DEFAULT_PREFIX: &str = "[brew] ";

/// Environment applied to every brew invocation unless configured otherwise.
/// Keeps read-only queries from triggering an auto-update or printing hints.
pub const DEFAULT_ENV: &[&str] = &["HOMEBREW_NO_AUTO_UPDATE=1", "HOMEBREW_NO_ENV_HINTS=1"];

/// Runs the `brew` binary through an [`Executor`].
///
/// Every call builds a fresh [`Cmd`] with the configured environment. When a
/// timeout is set, calls go through `run_cancellable` and fail with
/// [`ShellError::TimedOut`] once it expires.
#[derive(Clone)]
pub struct Homebrew {
    executor: Arc<dyn Executor>,
    binary: PathBuf,
    env: Vec<String>,
    prefix: String,
    timeout: Option<Duration>,
}

impl Homebrew {
    pub fn new(executor: Arc<dyn Executor>, binary: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            binary: binary.into(),
            env: DEFAULT_ENV.iter().map(|e| e.to_string()).collect(),
            prefix: DEFAULT_PREFIX.to_string(),
            timeout: None,
        }
    }

    /// Replace the environment entries (`KEY=VALUE`) passed to brew.
    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn command(&self, args: &[&str]) -> Cmd {
        let mut cmd = Cmd::new(self.binary.to_string_lossy(), args.iter().copied());
        cmd.set_env(self.env.iter().cloned());
        cmd
    }

    fn execute(&self, cmd: &mut Cmd) -> Result<(), ShellError> {
        debug!(command = %cmd, timeout = ?self.timeout, "running brew");
        match self.timeout {
            Some(timeout) => self
                .executor
                .run_cancellable(&CancelToken::with_timeout(timeout), cmd),
            None => self.executor.run(cmd),
        }
    }

    /// Run brew and return its stdout. Stderr is kept for the error message.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = self.command(args);
        let stdout = Capture::new();
        let stderr = Capture::new();
        cmd.stdout = Some(Box::new(stdout.clone()));
        cmd.stderr = Some(Box::new(stderr.clone()));

        if let Err(e) = self.execute(&mut cmd) {
            let detail = stderr.text();
            let detail = detail.trim();
            return Err(e).with_context(|| {
                if detail.is_empty() {
                    format!("{:#} failed", cmd)
                } else {
                    format!("{:#} failed: {}", cmd, detail)
                }
            });
        }
        Ok(stdout.text())
    }

    /// Run brew with its stdout and stderr streamed onto `console`, each line
    /// cleaned up and prefixed. Input from `console` is passed through.
    pub fn run_with_output(&self, args: &[&str], console: Console) -> Result<()> {
        let mut cmd = self.command(args);
        let prefix = self.prefix.clone();
        cmd.stdout = console
            .out
            .map(|out| Box::new(PrefixWriter::new(out, prefix.clone())) as OutStream);
        cmd.stderr = console
            .err
            .map(|err| Box::new(PrefixWriter::new(err, prefix)) as OutStream);
        cmd.stdin = console.input;

        self.execute(&mut cmd)
            .with_context(|| format!("{:#} failed", cmd))
    }
}

impl fmt::Debug for Homebrew {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Homebrew")
            .field("binary", &self.binary)
            .field("env", &self.env)
            .field("prefix", &self.prefix)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// -------------------------------------------------------------------
// Tests
// -------------------------------------------------------------------
