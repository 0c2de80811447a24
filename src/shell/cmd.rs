use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::process::Child;

use super::cancel::CancelToken;
use super::executor::{self, Process};
use crate::error::ShellError;

/// Writable stream slot on a [`Cmd`].
pub type OutStream = Box<dyn Write + Send>;

/// Readable stream slot on a [`Cmd`].
pub type InStream = Box<dyn Read + Send>;

/// The serializable part of a command: what would be executed, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// `KEY=VALUE` entries applied on top of the inherited environment.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Invocation {
    /// Copy/paste-safe rendering. Environment entries already present in the
    /// current process environment are left out.
    pub fn render(&self) -> String {
        self.render_against(&ambient_env())
    }

    /// Rendering wrapped in backticks, with the working directory appended.
    pub fn render_verbose(&self) -> String {
        let mut out = format!("`{}`", self.render());
        if let Some(dir) = &self.dir {
            out.push_str(&format!(" in {}", dir.display()));
        }
        out
    }

    fn render_against(&self, ambient: &BTreeSet<String>) -> String {
        let mut parts: Vec<&str> = new_env_vars(&self.env, ambient);
        parts.push(&self.program);
        parts.extend(self.args.iter().map(String::as_str));
        shell_words::join(parts)
    }
}

impl fmt::Display for Invocation {
    /// `{}` renders the command line; `{:#}` renders the verbose form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str(&self.render_verbose())
        } else {
            f.write_str(&self.render())
        }
    }
}

fn ambient_env() -> BTreeSet<String> {
    std::env::vars_os()
        .map(|(key, value)| format!("{}={}", key.to_string_lossy(), value.to_string_lossy()))
        .collect()
}

/// Entries of `env` that are not already part of `ambient`, in order.
fn new_env_vars<'a>(env: &'a [String], ambient: &BTreeSet<String>) -> Vec<&'a str> {
    env.iter()
        .filter(|entry| !ambient.contains(entry.as_str()))
        .map(String::as_str)
        .collect()
}

/// Groups the three standard streams to attach to a command.
///
/// A `None` slot means the stream is not redirected anywhere; the OS executor
/// connects it to the null device.
#[derive(Default)]
pub struct Console {
    pub out: Option<OutStream>,
    pub err: Option<OutStream>,
    pub input: Option<InStream>,
}

impl Console {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_out(mut self, out: impl Write + Send + 'static) -> Self {
        self.out = Some(Box::new(out));
        self
    }

    pub fn with_err(mut self, err: impl Write + Send + 'static) -> Self {
        self.err = Some(Box::new(err));
        self
    }

    pub fn with_input(mut self, input: impl Read + Send + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }
}

/// Cloneable in-memory sink. Every clone appends to the same buffer, so one
/// clone can be attached to a command while another reads the result.
#[derive(Debug, Clone, Default)]
pub struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    #[allow(dead_code)] // Sink inspection for tests and future callers.
    pub fn is_empty(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
    }
}

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A single external-process invocation.
///
/// Built with [`Cmd::new`], given streams and environment, then handed by
/// `&mut` to an [`Executor`](super::Executor). The executor borrows the stream
/// slots while the process runs and puts them back once it has finished, so
/// the caller can inspect them (and the process state) afterwards.
pub struct Cmd {
    invocation: Invocation,
    pub stdout: Option<OutStream>,
    pub stderr: Option<OutStream>,
    pub stdin: Option<InStream>,
    cancel: Option<CancelToken>,
    pub(super) process: Option<Process>,
}

impl Cmd {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            invocation: Invocation {
                program: program.into(),
                args: args.into_iter().map(Into::into).collect(),
                env: Vec::new(),
                dir: None,
            },
            stdout: None,
            stderr: None,
            stdin: None,
            cancel: None,
            process: None,
        }
    }

    /// Like [`Cmd::new`], but execution is aborted once `cancel` fires, even
    /// when run through [`Executor::run`](super::Executor::run).
    #[allow(dead_code)] // Library surface; the CLI passes its token to run_cancellable instead.
    pub fn with_cancel<I, S>(cancel: CancelToken, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cmd = Self::new(program, args);
        cmd.cancel = Some(cancel);
        cmd
    }

    pub fn program(&self) -> &str {
        &self.invocation.program
    }

    pub fn args(&self) -> &[String] {
        &self.invocation.args
    }

    pub fn env(&self) -> &[String] {
        &self.invocation.env
    }

    pub fn dir(&self) -> Option<&Path> {
        self.invocation.dir.as_deref()
    }

    #[allow(dead_code)] // Recorded by the test executor; serializable for callers that log it.
    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    /// Replace the environment overrides with `KEY=VALUE` entries.
    pub fn set_env<I, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invocation.env = entries.into_iter().map(Into::into).collect();
    }

    #[allow(dead_code)] // Library surface; brew and exec set the whole environment at once.
    pub fn push_env(&mut self, key: &str, value: &str) {
        self.invocation.env.push(format!("{}={}", key, value));
    }

    #[allow(dead_code)] // Library surface; no subcommand changes directory yet.
    pub fn set_dir(&mut self, dir: impl Into<PathBuf>) {
        self.invocation.dir = Some(dir.into());
    }

    /// Attach all three streams of `console`, replacing whatever was set.
    pub fn set_console(&mut self, console: Console) {
        self.stdout = console.out;
        self.stderr = console.err;
        self.stdin = console.input;
    }

    pub fn render(&self) -> String {
        self.invocation.render()
    }

    pub fn render_verbose(&self) -> String {
        self.invocation.render_verbose()
    }

    /// Process id once the command has been started.
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(Process::pid)
    }

    /// Exit status once the command has been waited on.
    #[allow(dead_code)] // Process state is inspected by library callers and tests.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.process.as_ref().and_then(Process::status)
    }

    /// The OS child handle, for callers that need direct control over a
    /// started process. Ownership stays with the command.
    #[allow(dead_code)] // Escape hatch for callers driving a started process themselves.
    pub fn native(&mut self) -> Option<&mut Child> {
        self.process.as_mut().and_then(Process::child_mut)
    }

    pub fn has_started(&self) -> bool {
        self.process.is_some()
    }

    /// Record a process id without an OS process behind it.
    #[allow(dead_code)] // Used by the in-memory test executor.
    pub fn set_synthetic_pid(&mut self, pid: u32) {
        self.process = Some(Process::synthetic(pid));
    }

    /// Wait for a command begun with [`Executor::start`](super::Executor::start).
    ///
    /// Honors the command's own cancel token. Returns `Ok(())` immediately for
    /// commands without an OS process behind them. After a cancelled wait,
    /// every later wait reports the same cancellation.
    #[allow(dead_code)] // Pairs with Executor::start, which the CLI does not use.
    pub fn wait(&mut self) -> Result<(), ShellError> {
        executor::wait(self, None)
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.invocation, f)
    }
}

impl fmt::Debug for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cmd")
            .field("invocation", &self.invocation)
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .field("stdin", &self.stdin.is_some())
            .field("pid", &self.pid())
            .finish()
    }
}
