//! Reading the declared metadata block out of an uploaded archive.
//!
//! Plugin archives (`.zip`, and `.jar` which is a zip) carry a `plugin.toml`
//! at their root:
//!
//! ```toml
//! [plugin]
//! version = "2.4.0"
//! description = "Teleport pads"
//!
//! [platforms.paper]
//! versions = ["1.20", "1.21"]
//!
//! [[platforms.paper.dependencies]]
//! name = "Vault"
//! required = true
//! ```
//!
//! Nothing else inside the archive is inspected.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use plugyard_core::{
    ContentHash, Platform, PlatformDependencies, PluginDependencies, PluginDependency, UserId,
};

use crate::error::{RegistryError, Result};

/// Name of the metadata entry inside an archive.
pub const METADATA_FILE: &str = "plugin.toml";

/// What an artifact declares about itself, plus its hash and size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMetadata {
    /// Version string as declared, before slugification.
    pub version: String,
    pub description: Option<String>,
    pub platform_dependencies: PlatformDependencies,
    pub plugin_dependencies: PluginDependencies,
    pub hash: ContentHash,
    pub size_bytes: u64,
}

/// Extracts declared metadata from a staged artifact.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, artifact: &Path, uploader_id: UserId) -> Result<ExtractedMetadata>;
}

#[derive(Debug, Deserialize)]
struct DeclaredMetadata {
    plugin: PluginSection,
    #[serde(default)]
    platforms: BTreeMap<String, PlatformSection>,
}

#[derive(Debug, Deserialize)]
struct PluginSection {
    version: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlatformSection {
    #[serde(default)]
    versions: BTreeSet<String>,
    #[serde(default)]
    dependencies: Vec<PluginDependency>,
}

/// Reads `plugin.toml` from zip-format archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveMetadataExtractor;

impl ArchiveMetadataExtractor {
    /// Parse the contents of a `plugin.toml` block.
    pub fn parse_block(
        input: &str,
    ) -> Result<(String, Option<String>, PlatformDependencies, PluginDependencies)> {
        let declared: DeclaredMetadata = toml::from_str(input).map_err(|e| {
            RegistryError::MetadataParse {
                detail: e.to_string(),
            }
        })?;

        let mut platform_dependencies = BTreeMap::new();
        let mut plugin_dependencies = BTreeMap::new();
        for (name, section) in declared.platforms {
            let platform: Platform = name.parse().map_err(|_| RegistryError::MetadataParse {
                detail: format!("unknown platform '{name}'"),
            })?;
            platform_dependencies.insert(platform, section.versions);
            if !section.dependencies.is_empty() {
                plugin_dependencies.insert(
                    platform,
                    section.dependencies.into_iter().collect::<BTreeSet<_>>(),
                );
            }
        }

        Ok((
            declared.plugin.version,
            declared.plugin.description,
            platform_dependencies,
            plugin_dependencies,
        ))
    }
}

impl MetadataExtractor for ArchiveMetadataExtractor {
    fn extract(&self, artifact: &Path, uploader_id: UserId) -> Result<ExtractedMetadata> {
        let mut archive = zip::ZipArchive::new(BufReader::new(File::open(artifact)?))?;
        let mut block = String::new();
        match archive.by_name(METADATA_FILE) {
            Ok(mut entry) => {
                entry.read_to_string(&mut block)?;
            }
            Err(zip::result::ZipError::FileNotFound) => {
                return Err(RegistryError::MetadataParse {
                    detail: format!("archive has no {METADATA_FILE}"),
                });
            }
            Err(e) => return Err(e.into()),
        }

        let (version, description, platform_dependencies, plugin_dependencies) =
            Self::parse_block(&block)?;
        let (hash, size_bytes) = ContentHash::compute_file(artifact)?;
        debug!(
            uploader_id,
            path = %artifact.display(),
            %version,
            "extracted plugin metadata"
        );

        Ok(ExtractedMetadata {
            version,
            description,
            platform_dependencies,
            plugin_dependencies,
            hash,
            size_bytes,
        })
    }
}
