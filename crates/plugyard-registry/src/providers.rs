//! Collaborator services the publication pipeline calls into, and their
//! store-backed implementations.
//!
//! The pipeline only depends on the traits, so deployments can back them
//! with other systems. [`RegistryStore`] implements the ones whose state it
//! already holds.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::info;

use plugyard_core::{
    Channel, Platform, PlatformVersionId, Project, ProjectId, UserId, VersionId, Visibility,
};

use crate::error::{RegistryError, Result};
use crate::store::{AuditRow, RecommendedRow, RegistryStore, VersionRow};

/// Release channel lookup and creation.
pub trait ChannelProvider: Send + Sync {
    /// The channel new drafts target by default.
    fn first_channel(&self, project_id: ProjectId) -> Result<Channel>;

    /// Find the channel named `name`, creating it if absent.
    fn resolve_or_create(
        &self,
        project_id: ProjectId,
        name: &str,
        color: &str,
        non_reviewed: bool,
    ) -> Result<Channel>;
}

/// The managed catalog of platform versions.
pub trait PlatformCatalog: Send + Sync {
    fn versions_for_platform(&self, platform: Platform) -> Result<BTreeSet<String>>;

    /// Fails with [`RegistryError::PlatformVersionNotFound`] if absent.
    fn lookup(&self, platform: Platform, version: &str) -> Result<PlatformVersionId>;
}

pub trait ProjectProvider: Send + Sync {
    fn project(&self, id: ProjectId) -> Result<Project>;

    fn change_visibility(&self, id: ProjectId, visibility: Visibility, comment: &str)
        -> Result<()>;
}

pub trait RecommendedVersions: Send + Sync {
    fn set_recommended(
        &self,
        project_id: ProjectId,
        version_id: VersionId,
        platform: Platform,
    ) -> Result<()>;
}

/// Tells a project's watchers about a new version.
pub trait NotificationSink: Send + Sync {
    fn notify_new_version(&self, project: &Project, version: &VersionRow) -> Result<()>;
}

/// A user action worth keeping in the action log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub user_id: UserId,
    pub project_id: ProjectId,
    pub version_id: Option<VersionId>,
    pub action: String,
    pub detail: String,
}

impl AuditEvent {
    pub const VERSION_UPLOADED: &'static str = "version_uploaded";

    pub fn version_uploaded(user_id: UserId, project_id: ProjectId, version_id: VersionId) -> Self {
        AuditEvent {
            user_id,
            project_id,
            version_id: Some(version_id),
            action: Self::VERSION_UPLOADED.to_string(),
            detail: "published".to_string(),
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent) -> Result<()>;
}

/// Drops cached views that include version or author listings.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self) -> Result<()>;
}

impl ChannelProvider for RegistryStore {
    fn first_channel(&self, project_id: ProjectId) -> Result<Channel> {
        self.channels(project_id)
            .into_iter()
            .min_by_key(|c| c.id)
            .ok_or(RegistryError::ChannelNotFound { project_id })
    }

    fn resolve_or_create(
        &self,
        project_id: ProjectId,
        name: &str,
        color: &str,
        non_reviewed: bool,
    ) -> Result<Channel> {
        self.transaction(|tx| {
            if !tx.tables().projects.contains_key(&project_id) {
                return Err(RegistryError::ProjectNotFound { id: project_id });
            }
            let existing = tx
                .tables()
                .channels
                .iter()
                .find(|c| c.project_id == project_id && c.name.eq_ignore_ascii_case(name))
                .cloned();
            match existing {
                Some(channel) => Ok(channel),
                None => {
                    info!(project_id, channel = name, "creating channel");
                    Ok(tx.insert_channel(project_id, name, color, non_reviewed))
                }
            }
        })
    }
}

impl PlatformCatalog for RegistryStore {
    fn versions_for_platform(&self, platform: Platform) -> Result<BTreeSet<String>> {
        Ok(self.read(|t| {
            t.platform_versions
                .iter()
                .filter(|pv| pv.platform == platform)
                .map(|pv| pv.version.clone())
                .collect()
        }))
    }

    fn lookup(&self, platform: Platform, version: &str) -> Result<PlatformVersionId> {
        self.read(|t| t.platform_version(platform, version).map(|pv| pv.id))
            .ok_or_else(|| RegistryError::PlatformVersionNotFound {
                platform,
                version: version.to_string(),
            })
    }
}

impl ProjectProvider for RegistryStore {
    fn project(&self, id: ProjectId) -> Result<Project> {
        RegistryStore::project(self, id)
    }

    fn change_visibility(
        &self,
        id: ProjectId,
        visibility: Visibility,
        comment: &str,
    ) -> Result<()> {
        self.set_visibility(id, visibility)?;
        info!(project_id = id, %visibility, comment, "project visibility changed");
        Ok(())
    }
}

impl RecommendedVersions for RegistryStore {
    fn set_recommended(
        &self,
        project_id: ProjectId,
        version_id: VersionId,
        platform: Platform,
    ) -> Result<()> {
        self.transaction(|tx| {
            let tables = tx.tables_mut();
            tables
                .recommended
                .retain(|r| !(r.project_id == project_id && r.platform == platform));
            tables.recommended.push(RecommendedRow {
                project_id,
                platform,
                version_id,
            });
            Ok(())
        })
    }
}

impl AuditSink for RegistryStore {
    fn record(&self, event: AuditEvent) -> Result<()> {
        self.transaction(|tx| {
            tx.tables_mut().audit_log.push(AuditRow {
                created_at: Utc::now(),
                user_id: event.user_id,
                project_id: event.project_id,
                version_id: event.version_id,
                action: event.action,
                detail: event.detail,
            });
            Ok(())
        })
    }
}

/// Notification sink that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify_new_version(&self, project: &Project, version: &VersionRow) -> Result<()> {
        info!(
            project_id = project.id,
            project = %project.name,
            version = %version.version_string,
            "new version available"
        );
        Ok(())
    }
}
