//! Configuration directory handling for Parley applications
//!
//! Settings live as JSON files inside a single directory, `~/.config/parley/`
//! by default. [`ConfigDir`] wraps that directory so callers (and tests) can
//! point it anywhere.
//!
//! Call [`init`] at application startup to bootstrap the default directory.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the directory created under the platform config root
const APP_DIR_NAME: &str = "parley";

/// Initialize the default config directory, creating it if needed.
pub fn init() -> Result<ConfigDir> {
    let dir = ConfigDir::default_location().context("Could not determine config directory")?;
    dir.ensure_exists()?;
    Ok(dir)
}

/// A directory holding JSON configuration files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDir {
    root: PathBuf,
}

impl ConfigDir {
    /// The platform default (`~/.config/parley/` on Linux)
    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|p| Self::at(p.join(APP_DIR_NAME)))
    }

    /// Use an explicit directory
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a file inside this directory
    pub fn path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    pub fn exists(&self, filename: &str) -> bool {
        self.path(filename).exists()
    }

    /// Create the directory (and parents) if missing
    pub fn ensure_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).with_context(|| {
            format!("Failed to create config directory: {}", self.root.display())
        })
    }

    /// Load and parse a JSON file from this directory
    pub fn load_json<T: DeserializeOwned>(&self, filename: &str) -> Result<T> {
        load_json_file(&self.path(filename))
    }

    /// Load a JSON file, falling back to `T::default()` when the file is absent.
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_json_or_default<T: DeserializeOwned + Default>(&self, filename: &str) -> Result<T> {
        if !self.exists(filename) {
            return Ok(T::default());
        }
        self.load_json(filename)
    }

    /// Serialize `value` as pretty JSON into `filename`.
    ///
    /// Writes to a sibling temp file first and renames it into place so a
    /// crash never leaves a truncated config behind.
    pub fn save_json<T: Serialize>(&self, filename: &str, value: &T) -> Result<()> {
        self.ensure_exists()?;
        let path = self.path(filename);
        let tmp = self.path(&format!(".{filename}.tmp"));
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write config file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move config file into place: {}", path.display()))?;
        Ok(())
    }
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
