mod cli;
mod config;
mod error;
mod logging;
mod platform;
mod shell;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    let log_level = cli.log_level.as_deref().or(config.log_level.as_deref());
    logging::init(cli.verbose, log_level);

    let brew_flag = cli.brew.as_deref();
    match cli.command {
        Command::Exec(args) => cli::exec::run(args),
        Command::Info(args) => cli::info::run(args, &cli::homebrew(brew_flag, &config)?),
        Command::Installed(args) => {
            cli::installed::run(args, &cli::homebrew(brew_flag, &config)?)
        }
        Command::Version(args) => cli::version::run(args, &cli::homebrew(brew_flag, &config)?),
        Command::Check(args) => cli::check::run(args, &cli::homebrew(brew_flag, &config)?),
    }
}
