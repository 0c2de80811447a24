//! Configurable fake executors for tests.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};

use regex::Regex;

use super::cancel::CancelToken;
use super::cmd::{Cmd, Console, Invocation, OutStream};
use super::executor::Executor;
use crate::error::ShellError;

/// Shared list a [`TestExecutor`] appends to.
pub type Captured<T> = Arc<Mutex<Vec<T>>>;

pub fn captured<T>() -> Captured<T> {
    Arc::new(Mutex::new(Vec::new()))
}

/// Payloads keyed by a pattern matched against the rendered command.
/// Evaluated in registration order; the first match wins.
type Mapped = Vec<(Regex, String)>;

#[derive(Default)]
struct State {
    captured: Option<Captured<Invocation>>,
    inputs: Option<Captured<Option<Vec<u8>>>>,
    stdout: Option<Vec<String>>,
    stderr: Option<Vec<String>>,
    mapped_stdout: Mapped,
    mapped_stderr: Mapped,
    pid: Option<u32>,
    error: Option<(ShellError, Option<usize>)>,
    calls: usize,
}

/// Builds a [`TestExecutor`]. Every option combines freely with the others.
#[derive(Default)]
pub struct ExecutorBuilder {
    state: State,
}

impl ExecutorBuilder {
    /// Record every submitted command in `list`.
    pub fn capture_to(mut self, list: &Captured<Invocation>) -> Self {
        self.state.captured = Some(Arc::clone(list));
        self
    }

    /// Record every submitted command's stdin (`None` when none was attached).
    pub fn capture_inputs_to(mut self, list: &Captured<Option<Vec<u8>>>) -> Self {
        self.state.inputs = Some(Arc::clone(list));
        self
    }

    /// One stdout payload per call, in call order.
    pub fn with_stdout<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.stdout = Some(outputs.into_iter().map(Into::into).collect());
        self
    }

    /// One stderr payload per call, in call order.
    pub fn with_stderr<I, S>(mut self, outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.stderr = Some(outputs.into_iter().map(Into::into).collect());
        self
    }

    /// Write `output` to stdout for any command whose rendering matches
    /// `pattern`. Takes precedence over positional payloads.
    pub fn with_mapped_stdout(mut self, pattern: Regex, output: impl Into<String>) -> Self {
        self.state.mapped_stdout.push((pattern, output.into()));
        self
    }

    pub fn with_mapped_stderr(mut self, pattern: Regex, output: impl Into<String>) -> Self {
        self.state.mapped_stderr.push((pattern, output.into()));
        self
    }

    /// Fail every call with `err`.
    pub fn always_error(mut self, err: ShellError) -> Self {
        self.state.error = Some((err, None));
        self
    }

    /// Fail only the `index`th call (1-based) with `err`.
    pub fn always_error_on_command_index(mut self, err: ShellError, index: usize) -> Self {
        self.state.error = Some((err, Some(index)));
        self
    }

    /// Report `pid` as the process id of every run.
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.state.pid = Some(pid);
        self
    }

    pub fn build(self) -> TestExecutor {
        TestExecutor {
            state: Mutex::new(self.state),
        }
    }
}

/// Deterministic stand-in for the OS executor.
///
/// Each call is handled under a lock: the command is recorded, canned output
/// is written to its attached streams, and the call counter advances exactly
/// once before the configured error (if any) is returned.
pub struct TestExecutor {
    state: Mutex<State>,
}

impl TestExecutor {
    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::default()
    }

    /// Number of calls handled so far.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn handle(&mut self, cmd: &mut Cmd) -> Result<(), ShellError> {
        let index = self.calls;
        self.calls += 1;

        if let Some(list) = &self.captured {
            list.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(cmd.invocation().clone());
        }
        if let Some(list) = &self.inputs {
            let input = match cmd.stdin.take() {
                Some(mut reader) => {
                    let mut buf = Vec::new();
                    reader.read_to_end(&mut buf)?;
                    Some(buf)
                }
                None => None,
            };
            list.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(input);
        }

        let rendered = cmd.render();
        let stdout = payload(&self.mapped_stdout, self.stdout.as_deref(), &rendered, index, "stdout")?;
        let stderr = payload(&self.mapped_stderr, self.stderr.as_deref(), &rendered, index, "stderr")?;
        write_to(cmd.stdout.as_mut(), stdout)?;
        write_to(cmd.stderr.as_mut(), stderr)?;

        if let Some(pid) = self.pid {
            cmd.set_synthetic_pid(pid);
        }

        match &self.error {
            Some((err, None)) => Err(err.clone()),
            Some((err, Some(n))) if *n == index + 1 => Err(err.clone()),
            _ => Ok(()),
        }
    }
}

fn payload<'a>(
    mapped: &'a Mapped,
    positional: Option<&'a [String]>,
    rendered: &str,
    index: usize,
    stream: &str,
) -> Result<Option<&'a str>, ShellError> {
    if let Some((_, output)) = mapped.iter().find(|(re, _)| re.is_match(rendered)) {
        return Ok(Some(output.as_str()));
    }
    match positional {
        None => Ok(None),
        Some(outputs) => outputs.get(index).map(|s| Some(s.as_str())).ok_or_else(|| {
            ShellError::Fixture(format!(
                "test executor did not have enough registered {}s ({} registered, call {})",
                stream,
                outputs.len(),
                index + 1
            ))
        }),
    }
}

fn write_to(sink: Option<&mut OutStream>, payload: Option<&str>) -> io::Result<()> {
    match (sink, payload) {
        (Some(sink), Some(payload)) => {
            sink.write_all(payload.as_bytes())?;
            sink.flush()
        }
        _ => Ok(()),
    }
}

impl Executor for TestExecutor {
    fn run(&self, cmd: &mut Cmd) -> Result<(), ShellError> {
        self.lock().handle(cmd)
    }

    fn start(&self, cmd: &mut Cmd) -> Result<(), ShellError> {
        self.run(cmd)
    }

    /// Bookkeeping happens even when `cancel` has already fired; the
    /// cancellation then replaces whatever the call would have returned.
    fn run_cancellable(&self, cancel: &CancelToken, cmd: &mut Cmd) -> Result<(), ShellError> {
        let result = self.run(cmd);
        if cancel.is_cancelled() {
            return Err(ShellError::Cancelled {
                command: cmd.render_verbose(),
            });
        }
        result
    }
}

/// Executor that records every command it is given.
pub fn capturing_executor() -> (TestExecutor, Captured<Invocation>) {
    let list = captured();
    let executor = TestExecutor::builder().capture_to(&list).build();
    (executor, list)
}

/// Executor that writes `outputs` to stdout, one per call.
pub fn output_executor<I, S>(outputs: I) -> TestExecutor
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    TestExecutor::builder().with_stdout(outputs).build()
}

/// Console that discards output and supplies empty input.
pub fn null_console() -> Console {
    Console::new()
        .with_out(io::sink())
        .with_err(io::sink())
        .with_input(io::empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::Capture;

    fn exec_err() -> ShellError {
        ShellError::exit("`bad-command`", Some(1))
    }

    fn len<T>(list: &Captured<T>) -> usize {
        list.lock().unwrap().len()
    }

    #[test]
    fn test_capture_to() {
        let (executor, captured) = capturing_executor();
        let mut cmd = Cmd::new("command-that-does-not-exist", Vec::<String>::new());
        executor.run(&mut cmd).unwrap();
        assert_eq!(len(&captured), 1);
        assert_eq!(&captured.lock().unwrap()[0], cmd.invocation());
    }

    #[test]
    fn test_always_error() {
        let captured = captured();
        let executor = TestExecutor::builder()
            .capture_to(&captured)
            .always_error(exec_err())
            .build();
        let mut cmd = Cmd::new("command-that-does-not-exist", Vec::<String>::new());
        let err = executor.run(&mut cmd).unwrap_err();
        assert_eq!(len(&captured), 1);
        assert_eq!(err.to_string(), exec_err().to_string());
        assert!(executor.run(&mut cmd).is_err());
    }

    #[test]
    fn test_always_error_on_command_index() {
        let captured = captured();
        let executor = TestExecutor::builder()
            .capture_to(&captured)
            .always_error_on_command_index(exec_err(), 3)
            .build();

        let r1 = executor.run(&mut Cmd::new("good-command", Vec::<String>::new()));
        let r2 = executor.run(&mut Cmd::new("good-command", Vec::<String>::new()));
        let r3 = executor.run(&mut Cmd::new("bad-command", Vec::<String>::new()));
        let r4 = executor.run(&mut Cmd::new("good-command", Vec::<String>::new()));

        assert_eq!(len(&captured), 4);
        assert!(r1.is_ok());
        assert!(r2.is_ok());
        assert_eq!(r3.unwrap_err().exit_code(), Some(1));
        assert!(r4.is_ok());
    }

    #[test]
    fn test_multiple_with_stdout() {
        let captured = captured();
        let executor = TestExecutor::builder()
            .capture_to(&captured)
            .with_stdout(["a", "b", "c"])
            .build();
        let buffers = [Capture::new(), Capture::new(), Capture::new()];

        for buffer in &buffers {
            let mut cmd = Cmd::new("command-that-does-not-exist", Vec::<String>::new());
            cmd.stdout = Some(Box::new(buffer.clone()));
            executor.run(&mut cmd).unwrap();
        }

        assert_eq!(len(&captured), 3);
        assert_eq!(buffers[0].text(), "a");
        assert_eq!(buffers[1].text(), "b");
        assert_eq!(buffers[2].text(), "c");
    }

    #[test]
    fn test_output_executor_in_call_order() {
        let executor = output_executor(["a", "b", "c"]);
        let outputs: Vec<String> = (0..3)
            .map(|_| {
                let buffer = Capture::new();
                let mut cmd = Cmd::new("brew", ["info"]);
                cmd.stdout = Some(Box::new(buffer.clone()));
                executor.run(&mut cmd).unwrap();
                buffer.text()
            })
            .collect();
        assert_eq!(outputs, ["a", "b", "c"]);
    }

    #[test]
    fn test_multiple_with_stdout_too_few() {
        let executor = output_executor(["a"]);
        let mut cmd = Cmd::new("command-that-does-not-exist", Vec::<String>::new());
        executor.run(&mut cmd).unwrap();
        let err = executor.run(&mut cmd).unwrap_err();
        assert!(matches!(err, ShellError::Fixture(_)));
        assert_eq!(executor.calls(), 2);
    }

    #[test]
    fn test_with_stderr() {
        let executor = TestExecutor::builder().with_stderr(["a", "b", "c"]).build();
        let buffers = [Capture::new(), Capture::new(), Capture::new()];

        for buffer in &buffers {
            let mut cmd = Cmd::new("command-that-does-not-exist", Vec::<String>::new());
            cmd.stderr = Some(Box::new(buffer.clone()));
            executor.run(&mut cmd).unwrap();
        }

        assert_eq!(buffers[0].text(), "a");
        assert_eq!(buffers[1].text(), "b");
        assert_eq!(buffers[2].text(), "c");
    }

    #[test]
    fn test_mapped_stdout_takes_precedence() {
        let executor = TestExecutor::builder()
            .with_stdout(["positional"])
            .with_mapped_stdout(Regex::new(r"^brew info").unwrap(), "mapped")
            .build();

        let first = Capture::new();
        let mut cmd = Cmd::new("brew", ["info", "htop"]);
        cmd.stdout = Some(Box::new(first.clone()));
        executor.run(&mut cmd).unwrap();
        assert_eq!(first.text(), "mapped");

        // the positional list is indexed by call number, so call 2 has none left
        let mut other = Cmd::new("brew", ["list"]);
        assert!(executor.run(&mut other).is_err());
    }

    #[test]
    fn test_mapped_first_match_wins() {
        let executor = TestExecutor::builder()
            .with_mapped_stdout(Regex::new("htop").unwrap(), "first")
            .with_mapped_stdout(Regex::new("info").unwrap(), "second")
            .with_mapped_stderr(Regex::new("info").unwrap(), "warning")
            .build();
        let out = Capture::new();
        let err = Capture::new();
        let mut cmd = Cmd::new("brew", ["info", "htop"]);
        cmd.set_console(Console::new().with_out(out.clone()).with_err(err.clone()));
        executor.run(&mut cmd).unwrap();
        assert_eq!(out.text(), "first");
        assert_eq!(err.text(), "warning");
    }

    #[test]
    fn test_unmatched_mapping_writes_nothing() {
        let executor = TestExecutor::builder()
            .with_mapped_stdout(Regex::new("^git").unwrap(), "git output")
            .build();
        let out = Capture::new();
        let mut cmd = Cmd::new("brew", ["info"]);
        cmd.stdout = Some(Box::new(out.clone()));
        executor.run(&mut cmd).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_capture_inputs() {
        let inputs = captured();
        let executor = TestExecutor::builder().capture_inputs_to(&inputs).build();

        let mut with_input = Cmd::new("cat", Vec::<String>::new());
        with_input.stdin = Some(Box::new(io::Cursor::new(b"payload".to_vec())));
        executor.run(&mut with_input).unwrap();
        executor.run(&mut Cmd::new("true", Vec::<String>::new())).unwrap();

        let inputs = inputs.lock().unwrap();
        assert_eq!(inputs[0].as_deref(), Some(&b"payload"[..]));
        assert_eq!(inputs[1], None);
    }

    #[test]
    fn test_with_pid() {
        let executor = TestExecutor::builder().with_pid(1234).build();
        let mut cmd = Cmd::new("brew", ["info"]);
        executor.run(&mut cmd).unwrap();
        assert_eq!(cmd.pid(), Some(1234));
    }

    #[test]
    fn test_start_and_run_cancellable_delegate() {
        let (executor, captured) = capturing_executor();
        executor.start(&mut Cmd::new("a", Vec::<String>::new())).unwrap();
        executor
            .run_cancellable(&CancelToken::new(), &mut Cmd::new("b", Vec::<String>::new()))
            .unwrap();
        assert_eq!(len(&captured), 2);
        assert_eq!(captured.lock().unwrap()[1].program, "b");
    }

    #[test]
    fn test_run_cancellable_with_fired_token() {
        let executor = output_executor(["ignored"]);
        let token = CancelToken::new();
        token.cancel();
        let err = executor
            .run_cancellable(&token, &mut Cmd::new("brew", ["info"]))
            .unwrap_err();
        assert!(matches!(err, ShellError::Cancelled { .. }));
        assert_eq!(executor.calls(), 1);
    }

    #[test]
    fn test_null_console() {
        let executor = output_executor(["discarded"]);
        let mut cmd = Cmd::new("brew", ["info"]);
        cmd.set_console(null_console());
        executor.run(&mut cmd).unwrap();
        assert!(cmd.stdout.is_some());
    }

    #[test]
    fn test_concurrent_calls_are_all_counted() {
        let executor = Arc::new(output_executor(vec!["x"; 8]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let executor = Arc::clone(&executor);
                std::thread::spawn(move || executor.run(&mut Cmd::new("brew", ["info"])))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(executor.calls(), 8);
    }
}
