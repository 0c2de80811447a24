use anyhow::Result;
use clap::Args as ClapArgs;

use crate::cli::output;
use crate::platform::{info, Homebrew};

/// Arguments for the `carafe installed` subcommand.
#[derive(ClapArgs)]
pub struct Args {
    /// Formula or cask to look up
    pub item: String,
}

/// Print `true` or `false`. Exits with status 1 when the item is not
/// installed so the command composes in shell conditionals.
pub fn run(args: Args, brew: &Homebrew) -> Result<()> {
    let installed = output::with_spinner(&format!("Checking {}...", args.item), || {
        info::is_installed(brew, &args.item)
    })?;

    println!("{}", installed);
    if !installed {
        std::process::exit(1);
    }
    Ok(())
}
