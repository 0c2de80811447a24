pub mod check;
pub mod exec;
pub mod info;
pub mod installed;
pub mod output;
pub mod version;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::CarafeConfig;
use crate::platform::{default_brew_path, detect_architecture, Homebrew};
use crate::shell::OsExecutor;

/// Query Homebrew and run commands with clean, prefixed output
#[derive(Parser)]
#[command(name = "carafe", version, about, long_about = None)]
pub struct Cli {
    /// Path to a carafe.toml (discovered in the current directory or its parents otherwise)
    #[arg(long, global = true, env = "CARAFE_CONFIG")]
    pub config: Option<String>,

    /// Path to the brew binary
    #[arg(long, global = true, env = "CARAFE_BREW")]
    pub brew: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show `brew info --json` for an item, or for everything installed
    Info(info::Args),

    /// Report whether an item is installed
    Installed(installed::Args),

    /// Print the installed version of an item
    Version(version::Args),

    /// Check that an installed item meets a minimum version
    Check(check::Args),

    /// Run a program with its output cleaned up and prefixed line by line
    Exec(exec::Args),
}

/// Build the brew runner from config and flags. Flags win over the file.
pub fn homebrew(brew_flag: Option<&str>, config: &CarafeConfig) -> Result<Homebrew> {
    let binary = match brew_flag.or(config.brew.path.as_deref()) {
        Some(path) => PathBuf::from(path),
        None => default_brew_path(detect_architecture()),
    };
    if !binary.is_file() {
        bail!("brew not found at {}", binary.display());
    }
    let executor = OsExecutor::new().context("failed to create tokio runtime")?;
    let mut brew = Homebrew::new(Arc::new(executor), binary).with_timeout(config.brew.timeout());
    if let Some(prefix) = &config.brew.prefix {
        brew = brew.with_prefix(prefix.clone());
    }
    if let Some(env) = &config.brew.env {
        brew = brew.with_env(env.clone());
    }
    debug!(
        binary = %brew.binary().display(),
        prefix = brew.prefix(),
        timeout = ?brew.timeout(),
        "using brew"
    );
    Ok(brew)
}
