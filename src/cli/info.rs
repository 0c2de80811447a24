use std::io;

use anyhow::Result;
use clap::Args as ClapArgs;

use crate::platform::{info, Homebrew};
use crate::shell::Console;

/// Arguments for the `carafe info` subcommand.
#[derive(ClapArgs)]
pub struct Args {
    /// Formula or cask to describe; everything installed when omitted
    pub item: Option<String>,
}

/// Stream brew's JSON description onto stdout, one prefixed line at a time.
/// Brew's own diagnostics go to stderr with the same prefix.
pub fn run(args: Args, brew: &Homebrew) -> Result<()> {
    let console = Console::new().with_out(io::stdout()).with_err(io::stderr());
    match args.item {
        Some(item) => info::info(brew, &item, console),
        None => info::all_info(brew, console),
    }
}
