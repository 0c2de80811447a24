use anyhow::Result;
use clap::Args as ClapArgs;

use crate::cli::output;
use crate::platform::{info, Homebrew};

/// Arguments for the `carafe version` subcommand.
#[derive(ClapArgs)]
pub struct Args {
    /// Formula or cask to look up
    pub item: String,
}

/// Print the installed version, or nothing when the item is not installed.
pub fn run(args: Args, brew: &Homebrew) -> Result<()> {
    let version = output::with_spinner(&format!("Reading {} version...", args.item), || {
        info::installed_version(brew, &args.item)
    })?;

    if version.is_empty() {
        output::warning(&format!("{} is not installed", args.item));
    } else {
        println!("{}", version);
    }
    Ok(())
}
