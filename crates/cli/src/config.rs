//! Configuration file loading
//!
//! Looks for `.texer.toml` in the working directory, then in the home
//! directory. Command-line flags override whatever the file sets.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use watcher::{IgnoreConfig, WatcherConfig};

/// Config file name, in the working directory or the home directory
pub const CONFIG_FILE: &str = ".texer.toml";

/// Complete texer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Polling settings
    #[serde(default)]
    pub watch: WatcherConfig,

    /// Which paths are watched
    #[serde(default = "default_ignore")]
    pub ignore: IgnoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch: WatcherConfig::default(),
            ignore: default_ignore(),
        }
    }
}

/// LaTeX sources only, unless told otherwise
fn default_ignore() -> IgnoreConfig {
    IgnoreConfig {
        suffixes: vec![".tex".to_string()],
        ..IgnoreConfig::default()
    }
}

impl Config {
    /// Parse TOML text
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid texer configuration")
    }

    /// Read and parse a config file
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("In {}", path.display()))
    }

    /// Apply command-line overrides
    pub fn apply_overrides(&mut self, interval_ms: Option<u64>, suffixes: &[String]) {
        if let Some(ms) = interval_ms {
            self.watch.poll_interval = Duration::from_millis(ms);
        }
        if !suffixes.is_empty() {
            self.ignore.suffixes = suffixes.to_vec();
        }
    }
}

/// Locate and load the configuration
///
/// An explicit path must exist. Otherwise the first of `./.texer.toml` and
/// `~/.texer.toml` that exists is used, falling back to defaults. Returns the
/// file that was read, if any.
pub fn load(explicit: Option<&Path>) -> Result<(Config, Option<PathBuf>)> {
    if let Some(path) = explicit {
        return Ok((Config::read(path)?, Some(path.to_path_buf())));
    }

    let local = std::env::current_dir()
        .context("Failed to get current directory")?
        .join(CONFIG_FILE);
    let global = dirs::home_dir().map(|home| home.join(CONFIG_FILE));

    for candidate in std::iter::once(local).chain(global) {
        if candidate.is_file() {
            return Ok((Config::read(&candidate)?, Some(candidate)));
        }
    }

    Ok((Config::default(), None))
}
