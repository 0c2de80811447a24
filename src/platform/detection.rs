use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// CPU architecture, named the way Homebrew's install prefixes are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    Arm64,
    X86_64,
    Unknown,
}

impl Architecture {
    /// Accepts both the Apple (`arm64`) and Rust/Linux (`aarch64`) spellings.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "arm64" | "aarch64" => Architecture::Arm64,
            "x86_64" | "amd64" | "x64" => Architecture::X86_64,
            _ => Architecture::Unknown,
        }
    }

    /// Where Homebrew installs its binary on macOS for this architecture.
    pub fn brew_prefix_binary(&self) -> &'static str {
        match self {
            Architecture::Arm64 => "/opt/homebrew/bin/brew",
            Architecture::X86_64 | Architecture::Unknown => "/usr/local/bin/brew",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::Arm64 => write!(f, "arm64"),
            Architecture::X86_64 => write!(f, "x86_64"),
            Architecture::Unknown => write!(f, "unknown"),
        }
    }
}

/// Detect CPU architecture from `std::env::consts::ARCH`.
pub fn detect_architecture() -> Architecture {
    Architecture::parse(std::env::consts::ARCH)
}

/// Locate the `brew` binary for `arch`.
///
/// Prefers the architecture's install prefix, then whatever `brew` is on
/// `$PATH`. Falls back to the prefix path so error messages name a concrete
/// location.
pub fn default_brew_path(arch: Architecture) -> PathBuf {
    resolve_brew_path(arch, &SystemLookup)
}

/// Host lookups needed to locate binaries; swapped out in tests.
trait HostLookup {
    fn path_exists(&self, path: &Path) -> bool;
    fn which(&self, name: &str) -> Option<PathBuf>;
}

struct SystemLookup;

impl HostLookup for SystemLookup {
    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn which(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }
}

fn resolve_brew_path(arch: Architecture, host: &dyn HostLookup) -> PathBuf {
    let prefixed = PathBuf::from(arch.brew_prefix_binary());
    if host.path_exists(&prefixed) {
        return prefixed;
    }
    host.which("brew").unwrap_or(prefixed)
}
