//! Row types and the table set held by [`RegistryStore`](super::RegistryStore).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use plugyard_core::{
    Channel, ChannelId, ContentHash, Platform, PlatformVersionId, Project, ProjectId, UserId,
    VersionId,
};

/// A committed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRow {
    pub id: VersionId,
    pub created_at: DateTime<Utc>,
    pub version_string: String,
    pub description: Option<String>,
    pub project_id: ProjectId,
    pub channel_id: ChannelId,
    /// File columns are `None` for versions hosted at an external URL.
    pub file_size: Option<u64>,
    pub file_hash: Option<ContentHash>,
    pub file_name: Option<String>,
    pub author_id: UserId,
    pub forum_sync: bool,
    pub external_url: Option<String>,
}

/// Column values for a version insert; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub version_string: String,
    pub description: Option<String>,
    pub project_id: ProjectId,
    pub channel_id: ChannelId,
    pub file_size: Option<u64>,
    pub file_hash: Option<ContentHash>,
    pub file_name: Option<String>,
    pub author_id: UserId,
    pub forum_sync: bool,
    pub external_url: Option<String>,
}

/// A display tag attached to a version.
///
/// Platform tags carry the platform and its required versions; other tags
/// (such as `Unstable`) have no platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRow {
    pub version_id: VersionId,
    pub name: String,
    pub data: Vec<String>,
    pub color: String,
    pub platform: Option<Platform>,
}

/// An entry of the platform-version catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformVersionRow {
    pub id: PlatformVersionId,
    pub platform: Platform,
    pub version: String,
}

/// Links a version to one concrete platform version it supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDependencyRow {
    pub version_id: VersionId,
    pub platform_version_id: PlatformVersionId,
}

/// A plugin dependency declared by a version for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRow {
    pub version_id: VersionId,
    pub platform: Platform,
    pub name: String,
    pub required: bool,
    pub project_id: Option<ProjectId>,
    pub external_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedRow {
    pub project_id: ProjectId,
    pub platform: Platform,
    pub version_id: VersionId,
}

/// One entry of the user action log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRow {
    pub created_at: DateTime<Utc>,
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub version_id: Option<VersionId>,
    pub action: String,
    pub detail: String,
}

/// All tables of the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    /// Last id handed out; ids are shared across tables.
    pub last_id: u64,
    pub projects: BTreeMap<ProjectId, Project>,
    pub channels: Vec<Channel>,
    pub platform_versions: Vec<PlatformVersionRow>,
    pub versions: BTreeMap<VersionId, VersionRow>,
    pub tags: Vec<TagRow>,
    pub platform_dependencies: Vec<PlatformDependencyRow>,
    pub dependencies: Vec<DependencyRow>,
    pub recommended: Vec<RecommendedRow>,
    pub audit_log: Vec<AuditRow>,
}

impl Tables {
    pub(crate) fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    pub(crate) fn platform_version(
        &self,
        platform: Platform,
        version: &str,
    ) -> Option<&PlatformVersionRow> {
        self.platform_versions
            .iter()
            .find(|pv| pv.platform == platform && pv.version == version)
    }

    /// Platforms linked to any committed version of `project_id` named
    /// `version_string`, through its platform-dependency rows.
    pub(crate) fn platforms_for_version_string(
        &self,
        project_id: ProjectId,
        version_string: &str,
    ) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = self
            .versions
            .values()
            .filter(|v| v.project_id == project_id && v.version_string == version_string)
            .flat_map(|v| {
                self.platform_dependencies
                    .iter()
                    .filter(move |pd| pd.version_id == v.id)
            })
            .filter_map(|pd| {
                self.platform_versions
                    .iter()
                    .find(|pv| pv.id == pd.platform_version_id)
                    .map(|pv| pv.platform)
            })
            .collect();
        platforms.sort();
        platforms.dedup();
        platforms
    }

    /// Whether a platform tag for (`project_id`, `version_string`, `platform`)
    /// already exists.
    pub(crate) fn has_platform_tag(
        &self,
        project_id: ProjectId,
        version_string: &str,
        platform: Platform,
    ) -> bool {
        self.tags.iter().any(|tag| {
            tag.platform == Some(platform)
                && self.versions.get(&tag.version_id).is_some_and(|v| {
                    v.project_id == project_id && v.version_string == version_string
                })
        })
    }

    /// Delete a version and every row that references it.
    pub(crate) fn delete_version(&mut self, id: VersionId) -> bool {
        if self.versions.remove(&id).is_none() {
            return false;
        }
        self.tags.retain(|t| t.version_id != id);
        self.platform_dependencies.retain(|pd| pd.version_id != id);
        self.dependencies.retain(|d| d.version_id != id);
        self.recommended.retain(|r| r.version_id != id);
        true
    }
}
