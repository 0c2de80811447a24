//! Queries built on `brew info --json`.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::package_manager::Homebrew;
use super::version::{strip_brew_revision, PackageVersion};
use crate::shell::Console;

/// One entry of the array printed by `brew info --json`. Only the fields we
/// read are modelled; everything else is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomebrewFormula {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub installed: Vec<Installed>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Installed {
    #[serde(default)]
    pub version: String,
}

/// Stream `brew info --json --installed` onto `console`.
pub fn all_info(brew: &Homebrew, console: Console) -> Result<()> {
    brew.run_with_output(&["info", "--json", "--installed"], console)
}

/// Stream `brew info --json <item>` onto `console`.
pub fn info(brew: &Homebrew, item: &str, console: Console) -> Result<()> {
    brew.run_with_output(&["info", "--json", item], console)
}

/// Captured output of `brew info --json <item>`.
pub fn info_output(brew: &Homebrew, item: &str) -> Result<String> {
    brew.run(&["info", "--json", item])
}

fn parse(output: &str) -> Result<Vec<HomebrewFormula>> {
    serde_json::from_str(output).context("failed to parse brew info JSON")
}

/// Whether the first formula in `output` has any installed version.
/// An empty array is an error: brew printed nothing about the item.
pub fn installed(output: &str) -> Result<bool> {
    let info = parse(output)?;
    match info.first() {
        None => bail!("empty JSON array"),
        Some(formula) => Ok(!formula.installed.is_empty()),
    }
}

/// Version of the first installed entry, or an empty string when nothing is
/// installed.
pub fn get_version(output: &str) -> Result<String> {
    let info = parse(output)?;
    Ok(info
        .first()
        .and_then(|formula| formula.installed.first())
        .map(|installed| installed.version.clone())
        .unwrap_or_default())
}

pub fn is_installed(brew: &Homebrew, item: &str) -> Result<bool> {
    let output = info_output(brew, item)?;
    installed(&output)
}

pub fn installed_version(brew: &Homebrew, item: &str) -> Result<String> {
    let output = info_output(brew, item)?;
    get_version(&output)
}

/// Whether the installed version of `item` is at least `minimum`.
///
/// The boolean leans towards `true` whenever the answer is unknown: a failed
/// query, unparseable output, an item that is not installed, or an empty
/// version all report `true`, with the error (if any) alongside it.
pub fn version_meets_or_exceeds_minimum(
    brew: &Homebrew,
    item: &str,
    minimum: &str,
) -> (bool, Option<anyhow::Error>) {
    match check_minimum(brew, item, minimum) {
        Ok(meets) => (meets, None),
        Err(e) => (true, Some(e)),
    }
}

fn check_minimum(brew: &Homebrew, item: &str, minimum: &str) -> Result<bool> {
    let output = info_output(brew, item)?;
    if !installed(&output)? {
        debug!(item, "not installed, treating minimum as met");
        return Ok(true);
    }

    let installed_version = get_version(&output)?;
    if installed_version.is_empty() {
        return Ok(true);
    }

    let parsed_installed = PackageVersion::parse(&strip_brew_revision(&installed_version))
        .with_context(|| {
            format!(
                "failed to parse installed version {:?} for item {:?}",
                installed_version, item
            )
        })?;
    let parsed_minimum = PackageVersion::parse(minimum).with_context(|| {
        format!(
            "failed to parse minimum version {:?} for item {:?}",
            minimum, item
        )
    })?;

    debug!(item, installed = %parsed_installed, minimum = %parsed_minimum, "comparing versions");
    Ok(parsed_installed >= parsed_minimum)
}
