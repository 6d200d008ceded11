//! Registry configuration via `lattice.toml`
//!
//! On first open of a directory, a default `lattice.toml` is written there.
//! To change settings, edit the file and restart.

use lattice_core::{LatticeError, LatticeResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name placed in the registry's base directory.
pub const CONFIG_FILE_NAME: &str = "lattice.toml";

/// Registry configuration loaded from `lattice.toml`.
///
/// # Example
///
/// ```toml
/// data_dir = "data"
/// default_database = "default"
/// file_extension = "db"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatticeConfig {
    /// Directory holding database files and settings.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Name resolved by `default_instance()`.
    #[serde(default = "default_database")]
    pub default_database: String,
    /// Extension of database files.
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_database() -> String {
    "default".to_string()
}

fn default_file_extension() -> String {
    "db".to_string()
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_database: default_database(),
            file_extension: default_file_extension(),
        }
    }
}

impl LatticeConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Lattice configuration
#
# Directory holding database files and index settings.
# Relative paths are resolved against the directory containing this file.
data_dir = "data"

# Database returned by default_instance()
default_database = "default"

# Extension of database files: <data_dir>/<name>.<file_extension>
file_extension = "db"
"#
    }

    /// Parse config from TOML text.
    pub fn from_toml_str(content: &str) -> LatticeResult<Self> {
        let config: LatticeConfig = toml::from_str(content)
            .map_err(|e| LatticeError::config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> LatticeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LatticeError::config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| {
            LatticeError::config(format!("in '{}': {}", path.display(), e))
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> LatticeResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                LatticeError::config(format!(
                    "failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> LatticeResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LatticeError::config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            LatticeError::config(format!(
                "failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Resolve a relative `data_dir` against `base`.
    pub fn resolve_against(mut self, base: &Path) -> Self {
        if self.data_dir.is_relative() {
            self.data_dir = base.join(&self.data_dir);
        }
        self
    }

    /// File backing the database called `name`.
    pub fn database_path(&self, name: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", name, self.file_extension))
    }

    fn validate(&self) -> LatticeResult<()> {
        if self.default_database.is_empty() {
            return Err(LatticeError::config("default_database must not be empty"));
        }
        if self.file_extension.is_empty() || self.file_extension.contains(['.', '/', '\\']) {
            return Err(LatticeError::config(format!(
                "invalid file_extension '{}'",
                self.file_extension
            )));
        }
        Ok(())
    }
}
