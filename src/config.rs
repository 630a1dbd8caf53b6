//! farmtrace configuration.
//!
//! Loaded from `~/.farmtrace/config.toml`. Every key is optional and a
//! missing file means defaults:
//!
//! ```toml
//! identity = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"
//! database = "/var/lib/farmtrace/ledger.sqlite"
//! log-level = "info"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// farmtrace configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Default acting address, used when neither `--as` nor `FARMTRACE_IDENTITY` is set.
    pub identity: Option<String>,

    /// Ledger database file. Defaults to `~/.farmtrace/ledger.sqlite`.
    pub database: Option<PathBuf>,

    /// Log filter directive (e.g. `info`, `farmtrace=debug`).
    pub log_level: Option<String>,
}

impl Config {
    /// Load config from `~/.farmtrace/config.toml`, or defaults if it doesn't exist.
    pub fn load() -> Result<Self, String> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from a specific file, or defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// The config file path: `~/.farmtrace/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".farmtrace").join("config.toml"))
    }
}
