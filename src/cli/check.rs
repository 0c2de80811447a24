use anyhow::Result;
use clap::Args as ClapArgs;

use crate::cli::output;
use crate::platform::{info, Homebrew};

/// Arguments for the `carafe check` subcommand.
#[derive(ClapArgs)]
pub struct Args {
    /// Formula or cask to check
    pub item: String,

    /// Lowest acceptable version, e.g. 2.45.2
    #[arg(long)]
    pub minimum: String,
}

/// Compare the installed version against `--minimum`.
///
/// An item that cannot be checked (brew failed, not installed, unparseable
/// version) passes with a warning; only a version known to be lower fails.
pub fn run(args: Args, brew: &Homebrew) -> Result<()> {
    let (meets, err) = output::with_spinner(&format!("Checking {}...", args.item), || {
        info::version_meets_or_exceeds_minimum(brew, &args.item, &args.minimum)
    });

    if let Some(e) = err {
        output::warning(&format!("could not check {}: {:#}", args.item, e));
    }

    if meets {
        output::success(&format!("{} meets minimum version {}", args.item, args.minimum));
        Ok(())
    } else {
        output::error(&format!("{} is older than {}", args.item, args.minimum));
        std::process::exit(1);
    }
}
