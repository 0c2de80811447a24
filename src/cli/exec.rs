use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use tracing::debug;

use crate::cli::output;
use crate::error::ShellError;
use crate::shell::{CancelToken, Cmd, Console, Executor, OsExecutor, PrefixWriter};

/// Exit status used when the command was cancelled or timed out, matching
/// coreutils `timeout`.
pub const EXIT_TIMED_OUT: i32 = 124;

/// Arguments for the `carafe exec` subcommand.
#[derive(ClapArgs)]
pub struct Args {
    /// Text put in front of every output line
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Kill the command after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Program and arguments to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Run a program with stdout and stderr passed through [`PrefixWriter`]s.
/// Ctrl-C kills the program and exits like a timeout.
pub fn run(args: Args) -> Result<()> {
    let executor = OsExecutor::new().context("failed to create tokio runtime")?;
    let cancel = token(args.timeout);
    executor.cancel_on_interrupt(&cancel);

    if let Err(e) = execute(&executor, &cancel, &args) {
        debug!(error = %e, exit_code = ?e.exit_code(), "command failed");
        output::error(&e.to_string());
        std::process::exit(exit_code(&e));
    }
    Ok(())
}

fn token(timeout: Option<u64>) -> CancelToken {
    match timeout {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    }
}

fn execute(executor: &dyn Executor, cancel: &CancelToken, args: &Args) -> Result<(), ShellError> {
    let Some((program, rest)) = args.command.split_first() else {
        return Err(io::Error::other("no program given").into());
    };

    let mut cmd = Cmd::new(program.as_str(), rest.iter().map(String::as_str));
    cmd.set_console(
        Console::new()
            .with_out(PrefixWriter::new(io::stdout(), args.prefix.clone()))
            .with_err(PrefixWriter::new(io::stderr(), args.prefix.clone()))
            .with_input(io::stdin()),
    );
    executor.run_cancellable(cancel, &mut cmd)
}

fn exit_code(err: &ShellError) -> i32 {
    if err.is_cancelled() {
        EXIT_TIMED_OUT
    } else {
        1
    }
}
