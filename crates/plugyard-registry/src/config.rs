//! Registry configuration.
//!
//! Loaded from a `plugyard.toml` file and handed to the builder and the
//! publication pipeline at construction. Every field has a default, so an
//! empty or missing file yields a working configuration.
//!
//! ```toml
//! version_name_pattern = '^[a-zA-Z0-9\-_.+]+$'
//! archive_extensions = [".zip", ".jar"]
//! validate_duplicate_artifacts = true
//! verification = "strict"
//!
//! [storage]
//! staging_dir = "staging"
//! artifact_dir = "plugins"
//! database = "registry.json"
//! ```

use std::path::{Path, PathBuf};

use plugyard_core::is_path_safe;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How the pipeline treats an I/O error while re-reading a staged artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// The read failure fails the publish.
    #[default]
    Strict,
    /// The read failure is logged and verification counts as passed.
    Lenient,
}

/// Top-level registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Regular expression a slugified version string must match.
    pub version_name_pattern: String,
    /// File name suffixes accepted for uploads.
    pub archive_extensions: Vec<String>,
    /// Reject an upload whose hash and version string match an existing
    /// version of the same project.
    pub validate_duplicate_artifacts: bool,
    pub verification: VerificationMode,
    pub storage: StorageConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            version_name_pattern: r"^[a-zA-Z0-9\-_.+]+$".to_string(),
            archive_extensions: vec![".zip".to_string(), ".jar".to_string()],
            validate_duplicate_artifacts: true,
            verification: VerificationMode::Strict,
            storage: StorageConfig::default(),
        }
    }
}

/// Filesystem locations, relative to the data directory unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub staging_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            staging_dir: PathBuf::from("staging"),
            artifact_dir: PathBuf::from("plugins"),
            database: PathBuf::from("registry.json"),
        }
    }
}

impl StorageConfig {
    pub fn staging_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.staging_dir)
    }

    pub fn artifact_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.artifact_dir)
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database)
    }
}

impl RegistryConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Load a configuration file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(RegistryConfig::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Compile the version name pattern.
    pub fn version_pattern(&self) -> Result<VersionNamePattern> {
        Ok(VersionNamePattern(Regex::new(&self.version_name_pattern)?))
    }

    /// Whether `file_name` ends in one of the accepted archive suffixes.
    pub fn is_archive(&self, file_name: &str) -> bool {
        self.archive_extensions
            .iter()
            .any(|ext| file_name.ends_with(ext.as_str()))
    }
}

/// A compiled version name pattern.
#[derive(Debug, Clone)]
pub struct VersionNamePattern(Regex);

impl VersionNamePattern {
    /// Versions name a storage directory, so empty, dot-only and
    /// separator-containing strings never match.
    pub fn matches(&self, version: &str) -> bool {
        is_path_safe(version) && self.0.is_match(version)
    }
}
