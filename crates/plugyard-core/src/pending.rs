//! Pending versions: drafts built from an upload or an external URL that the
//! uploader can inspect and edit before publishing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::hash::ContentHash;
use crate::platform::Platform;
use crate::project::{Channel, ProjectId};

/// Platform → required platform-version strings.
pub type PlatformDependencies = BTreeMap<Platform, BTreeSet<String>>;

/// Platform → plugin dependencies declared for that platform.
pub type PluginDependencies = BTreeMap<Platform, BTreeSet<PluginDependency>>;

/// A declared dependency of a plugin on another plugin.
///
/// A dependency is resolved when it links to a project in this registry,
/// or points somewhere else through `external_url`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginDependency {
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    #[serde(default)]
    pub external_url: Option<String>,
}

impl PluginDependency {
    /// A dependency known only by name.
    pub fn named(name: impl Into<String>, required: bool) -> Self {
        PluginDependency {
            name: name.into(),
            required,
            project_id: None,
            external_url: None,
        }
    }
}

/// Name, size and hash of a staged artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name inside the uploader's staging area.
    pub name: String,
    pub size_bytes: u64,
    pub hash: ContentHash,
}

/// Where the bytes of a version come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactSource {
    /// An uploaded archive waiting in the staging area.
    File(FileInfo),
    /// A download hosted elsewhere.
    External { url: String },
}

/// The release channel a pending version targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub non_reviewed: bool,
}

impl From<&Channel> for ChannelRef {
    fn from(channel: &Channel) -> Self {
        ChannelRef {
            name: channel.name.clone(),
            color: channel.color.clone(),
            non_reviewed: channel.non_reviewed,
        }
    }
}

/// An uncommitted draft of a new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVersion {
    /// Slugified version identifier. Empty for URL drafts until the
    /// uploader fills it in.
    pub version_string: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub platform_dependencies: PlatformDependencies,
    #[serde(default)]
    pub plugin_dependencies: PluginDependencies,
    pub source: ArtifactSource,
    pub channel: ChannelRef,
    #[serde(default)]
    pub forum_sync: bool,
    #[serde(default)]
    pub unstable: bool,
    #[serde(default)]
    pub recommended: bool,
}

impl PendingVersion {
    /// Draft for a version whose artifact is hosted at `url`.
    ///
    /// Version string and platforms are left for the uploader to fill in.
    pub fn external(url: impl Into<String>, channel: ChannelRef, forum_sync: bool) -> Self {
        PendingVersion {
            version_string: String::new(),
            description: None,
            platform_dependencies: BTreeMap::new(),
            plugin_dependencies: BTreeMap::new(),
            source: ArtifactSource::External { url: url.into() },
            channel,
            forum_sync,
            unstable: false,
            recommended: false,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.source, ArtifactSource::File(_))
    }

    pub fn file_info(&self) -> Option<&FileInfo> {
        match &self.source {
            ArtifactSource::File(info) => Some(info),
            ArtifactSource::External { .. } => None,
        }
    }

    pub fn external_url(&self) -> Option<&str> {
        match &self.source {
            ArtifactSource::External { url } => Some(url),
            ArtifactSource::File(_) => None,
        }
    }

    /// Platforms this version declares support for.
    pub fn platforms(&self) -> BTreeSet<Platform> {
        self.platform_dependencies.keys().copied().collect()
    }
}
