//! Running external commands.
//!
//! A [`Cmd`] describes an invocation; an [`Executor`] runs it. Output streams
//! are plain `io::Write` values, so a [`PrefixWriter`] can be attached to turn
//! a child's raw output into clean, prefixed log lines as it arrives.

pub mod cancel;
pub mod cmd;
pub mod executor;
pub mod prefix;

#[cfg(test)]
pub mod testshell;

#[allow(unused_imports)]
pub use cancel::{CancelReason, CancelToken};
#[allow(unused_imports)]
pub use cmd::{Capture, Cmd, Console, InStream, Invocation, OutStream};
#[allow(unused_imports)]
pub use executor::{Executor, OsExecutor};
#[allow(unused_imports)]
pub use prefix::{strip_line, PrefixWriter};
