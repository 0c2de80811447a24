use std::io::{self, Read, Write};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, trace, warn};

use super::cancel::{first_cancelled, CancelReason, CancelToken};
use super::cmd::{Cmd, InStream, OutStream};
use crate::error::ShellError;

const PUMP_BUFFER: usize = 8 * 1024;

/// Runs a [`Cmd`]. Object-safe.
///
/// Implementations never panic on expected failures (missing binary, failing
/// exit status, cancellation); all of those come back as a [`ShellError`].
pub trait Executor: Send + Sync {
    /// Run to completion. Fails when the process cannot be started or exits
    /// with a non-zero status.
    fn run(&self, cmd: &mut Cmd) -> Result<(), ShellError>;

    /// Begin execution without waiting. Only start-up failures are reported;
    /// finish with [`Cmd::wait`].
    fn start(&self, cmd: &mut Cmd) -> Result<(), ShellError>;

    /// Like [`Executor::run`], but returns [`ShellError::Cancelled`] or
    /// [`ShellError::TimedOut`] as soon as `cancel` fires.
    fn run_cancellable(&self, cancel: &CancelToken, cmd: &mut Cmd) -> Result<(), ShellError>;
}

/// Executor backed by `tokio::process`.
///
/// The blocking [`Executor`] calls drive an owned runtime. Attached writers
/// are fed from the child's pipes by pump tasks and handed back to the
/// [`Cmd`] after the process exits and its pipes close. Commands that can be
/// cancelled are placed in their own process group and killed on drop, so a
/// cancel takes down the whole tree even while descendants hold the pipes.
#[derive(Debug, Clone)]
pub struct OsExecutor {
    runtime: Arc<Runtime>,
}

impl OsExecutor {
    pub fn new() -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("carafe-exec")
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    /// Cancel `token` when this process receives Ctrl-C.
    pub fn cancel_on_interrupt(&self, token: &CancelToken) {
        let token = token.clone();
        self.runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received, cancelling");
                token.cancel();
            }
        });
    }
}

impl Executor for OsExecutor {
    fn run(&self, cmd: &mut Cmd) -> Result<(), ShellError> {
        let isolate = cmd.cancel_token().is_some();
        spawn(&self.runtime, cmd, isolate)?;
        wait(cmd, None)
    }

    fn start(&self, cmd: &mut Cmd) -> Result<(), ShellError> {
        let isolate = cmd.cancel_token().is_some();
        spawn(&self.runtime, cmd, isolate)
    }

    fn run_cancellable(&self, cancel: &CancelToken, cmd: &mut Cmd) -> Result<(), ShellError> {
        if let Some(reason) = cancel.reason() {
            return Err(cancelled(cmd.render_verbose(), reason));
        }
        trace!(deadline = ?cancel.deadline(), "cancellable run");
        spawn(&self.runtime, cmd, true)?;
        wait(cmd, Some(cancel))
    }
}

/// OS-level state of a started command.
pub struct Process {
    pid: u32,
    child: Option<Child>,
    status: Option<ExitStatus>,
    cancelled: Option<CancelReason>,
    isolated: bool,
    runtime: Option<Arc<Runtime>>,
    stdout_pump: Option<JoinHandle<Pumped>>,
    stderr_pump: Option<JoinHandle<Pumped>>,
}

struct Pumped {
    sink: OutStream,
    result: io::Result<()>,
}

type PumpOutcome = Option<(Option<OutStream>, io::Result<()>)>;

impl Process {
    pub(super) fn synthetic(pid: u32) -> Self {
        Self {
            pid,
            child: None,
            status: None,
            cancelled: None,
            isolated: false,
            runtime: None,
            stdout_pump: None,
            stderr_pump: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    pub fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }
}

fn spawn(runtime: &Arc<Runtime>, cmd: &mut Cmd, isolate: bool) -> Result<(), ShellError> {
    if cmd.has_started() {
        return Err(io::Error::other(format!("{} has already been started", cmd.render_verbose())).into());
    }

    let mut command = std::process::Command::new(cmd.program());
    command.args(cmd.args());
    for entry in cmd.env() {
        match entry.split_once('=') {
            Some((key, value)) => {
                command.env(key, value);
            }
            None => warn!(entry = %entry, "ignoring environment entry without '='"),
        }
    }
    if let Some(dir) = cmd.dir() {
        command.current_dir(dir);
    }
    command
        .stdin(stdio_for(cmd.stdin.is_some()))
        .stdout(stdio_for(cmd.stdout.is_some()))
        .stderr(stdio_for(cmd.stderr.is_some()));

    #[cfg(unix)]
    if isolate {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let mut command = tokio::process::Command::from(command);
    command.kill_on_drop(isolate);

    debug!(command = %cmd.render(), dir = ?cmd.dir(), "starting command");
    let _guard = runtime.enter();
    let mut child = command
        .spawn()
        .map_err(|e| ShellError::start(cmd.program(), e))?;
    let pid = child
        .id()
        .ok_or_else(|| io::Error::other("started command has no pid"))?;
    trace!(pid, "command started");

    if let (Some(input), Some(pipe)) = (cmd.stdin.take(), child.stdin.take()) {
        feed_stdin(runtime, input, pipe);
    }
    let stdout_pump = match (cmd.stdout.take(), child.stdout.take()) {
        (Some(sink), Some(pipe)) => Some(pump(runtime, pipe, sink)),
        (sink, _) => {
            cmd.stdout = sink;
            None
        }
    };
    let stderr_pump = match (cmd.stderr.take(), child.stderr.take()) {
        (Some(sink), Some(pipe)) => Some(pump(runtime, pipe, sink)),
        (sink, _) => {
            cmd.stderr = sink;
            None
        }
    };

    cmd.process = Some(Process {
        pid,
        child: Some(child),
        status: None,
        cancelled: None,
        isolated: isolate,
        runtime: Some(Arc::clone(runtime)),
        stdout_pump,
        stderr_pump,
    });
    Ok(())
}

fn stdio_for(attached: bool) -> Stdio {
    if attached {
        Stdio::piped()
    } else {
        Stdio::null()
    }
}

fn pump<R>(runtime: &Runtime, mut pipe: R, mut sink: OutStream) -> JoinHandle<Pumped>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    runtime.spawn(async move {
        let mut buf = vec![0u8; PUMP_BUFFER];
        let result = loop {
            match pipe.read(&mut buf).await {
                Ok(0) => break sink.flush(),
                Ok(n) => {
                    if let Err(e) = sink.write_all(&buf[..n]) {
                        break Err(e);
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        Pumped { sink, result }
    })
}

fn feed_stdin(runtime: &Runtime, mut input: InStream, mut pipe: ChildStdin) {
    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(4);

    // `input` is a blocking reader
    thread::spawn(move || {
        let mut buf = vec![0u8; PUMP_BUFFER];
        loop {
            match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.blocking_send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    debug!(error = %e, "failed to read input for command");
                    break;
                }
            }
        }
    });

    runtime.spawn(async move {
        while let Some(chunk) = rx.recv().await {
            match pipe.write_all(&chunk).await {
                Ok(()) => {}
                // the child may exit without reading all of its input
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => return,
                Err(e) => {
                    debug!(error = %e, "failed to feed stdin");
                    return;
                }
            }
        }
        trace!("stdin closed");
    });
}

/// Wait for a started command, honoring its own token and `extra`.
///
/// Completion means the process exited and both pipes reached end of stream.
/// The tokens are watched for the whole of that, so a descendant keeping a
/// pipe open cannot hold a cancelled wait.
pub(super) fn wait(cmd: &mut Cmd, extra: Option<&CancelToken>) -> Result<(), ShellError> {
    let rendered = cmd.render_verbose();
    let tokens: Vec<CancelToken> = cmd
        .cancel_token()
        .cloned()
        .into_iter()
        .chain(extra.cloned())
        .collect();

    let Some(process) = cmd.process.as_mut() else {
        return Err(io::Error::other(format!("{} has not been started", rendered)).into());
    };
    if let Some(reason) = process.cancelled {
        return Err(cancelled(rendered, reason));
    }
    if let Some(status) = process.status {
        return check_status(rendered, status);
    }
    let Some(runtime) = process.runtime.clone() else {
        return Ok(());
    };
    let Some(mut child) = process.child.take() else {
        return Err(io::Error::other(format!("{} has no process to wait on", rendered)).into());
    };

    let stdout_pump = process.stdout_pump.take();
    let stderr_pump = process.stderr_pump.take();
    let aborts: Vec<AbortHandle> = [&stdout_pump, &stderr_pump]
        .into_iter()
        .flatten()
        .map(JoinHandle::abort_handle)
        .collect();
    let (pid, isolated) = (process.pid, process.isolated);

    let finished = async move {
        let status = child.wait().await?;
        let stdout = join_pump(stdout_pump).await;
        let stderr = join_pump(stderr_pump).await;
        Ok::<_, io::Error>((status, stdout, stderr))
    };
    let outcome = runtime.block_on(async {
        tokio::select! {
            biased;
            reason = first_cancelled(&tokens) => {
                terminate(pid, isolated);
                Err(reason)
            }
            result = finished => Ok(result),
        }
    });

    let (status, stdout, stderr) = match outcome {
        Err(reason) => {
            aborts.iter().for_each(AbortHandle::abort);
            warn!(command = %rendered, pid, ?reason, "cancelled command");
            process.cancelled = Some(reason);
            return Err(cancelled(rendered, reason));
        }
        Ok(result) => result?,
    };
    process.status = Some(status);
    debug!(command = %rendered, pid, %status, "command exited");

    let mut pump_error = None;
    if let Some((sink, result)) = stdout {
        cmd.stdout = sink;
        pump_error = result.err();
    }
    if let Some((sink, result)) = stderr {
        cmd.stderr = sink;
        pump_error = pump_error.or(result.err());
    }
    if let Some(e) = pump_error {
        return Err(e.into());
    }

    check_status(rendered, status)
}

async fn join_pump(handle: Option<JoinHandle<Pumped>>) -> PumpOutcome {
    let handle = handle?;
    Some(match handle.await {
        Ok(Pumped { sink, result }) => (Some(sink), result),
        Err(e) => (None, Err(io::Error::other(format!("output pump failed: {}", e)))),
    })
}

/// Kill the command's process group. The child itself is killed when its
/// handle is dropped.
#[cfg(unix)]
fn terminate(pid: u32, isolated: bool) {
    if !isolated {
        return;
    }
    // SAFETY: killpg only sends a signal. The group id is the pid of a child
    // we spawned with process_group(0), so it leads its own group.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(pid, error = %io::Error::last_os_error(), "killpg failed");
    }
}

#[cfg(not(unix))]
fn terminate(_pid: u32, _isolated: bool) {}

fn check_status(rendered: String, status: ExitStatus) -> Result<(), ShellError> {
    if status.success() {
        Ok(())
    } else {
        Err(ShellError::exit(rendered, status.code()))
    }
}

fn cancelled(command: String, reason: CancelReason) -> ShellError {
    match reason {
        CancelReason::Cancelled => ShellError::Cancelled { command },
        CancelReason::DeadlineExceeded => ShellError::TimedOut { command },
    }
}
