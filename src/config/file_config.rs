//! TOML file configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Raw values from the optional TOML configuration file.
///
/// Every field is optional; anything absent falls back to the CLI value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// Directory containing the dinner database file.
    pub db_dir: Option<String>,
}

impl FileConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {:?}", path.as_ref()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path.as_ref()))
    }
}
