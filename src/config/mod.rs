pub mod schema;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

#[allow(unused_imports)]
pub use schema::{BrewConfig, CarafeConfig, ConfigMessage};

pub const CONFIG_FILE: &str = "carafe.toml";

/// Load configuration from the specified path, or from a discovered
/// `carafe.toml`. With no explicit path and nothing discovered, the default
/// configuration is returned.
///
/// Validation warnings are printed to stderr; validation errors cause the
/// load to fail with a descriptive message.
pub fn load(path: Option<&str>) -> Result<CarafeConfig> {
    let config_path = match path {
        Some(p) => PathBuf::from(p),
        None => match discover_config()? {
            Some(found) => found,
            None => {
                debug!("no {} found, using defaults", CONFIG_FILE);
                return Ok(CarafeConfig::default());
            }
        },
    };
    load_file(&config_path)
}

fn load_file(config_path: &Path) -> Result<CarafeConfig> {
    debug!(path = %config_path.display(), "loading config");
    let contents = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let config: CarafeConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;

    for msg in config.validate() {
        match msg {
            ConfigMessage::Warning(w) => {
                eprintln!("config warning: {}", w);
            }
            ConfigMessage::Error(e) => {
                anyhow::bail!("config error in {}: {}", config_path.display(), e);
            }
        }
    }

    Ok(config)
}

/// Search for carafe.toml in the current directory and its parents, then in
/// the user config directory.
pub fn discover_config() -> Result<Option<PathBuf>> {
    let cwd = std::env::current_dir()?;
    let global = config_dir().ok().map(|d| d.join(CONFIG_FILE));
    Ok(discover_from(&cwd, global))
}

fn discover_from(start: &Path, global: Option<PathBuf>) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
        .or_else(|| global.filter(|g| g.is_file()))
}

/// Return the platform-specific config directory (~/.config/carafe on Linux).
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join("carafe"))
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))
}
