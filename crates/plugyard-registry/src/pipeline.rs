//! Publishing a pending version.
//!
//! A publish runs through these stages:
//!
//! ```text
//! Verifying -> Committing -> Relocating -> SideEffects -> Published
//!                   \______________/
//!                          | failure
//!                          v
//!                    RollingBack -> Failed
//! ```
//!
//! Verification and validation failures happen before anything is written.
//! The commit inserts the version row and all of its child rows in one
//! store transaction. If relocating the artifact fails afterwards, the
//! version is deleted again together with any copies already made, and the
//! staged file is left in place so the uploader can retry. Side effects run
//! once the version is durable; their failures are logged and otherwise
//! ignored.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};

use plugyard_core::{
    slugify, ArtifactSource, ContentHash, FileInfo, PendingVersion, Platform, PlatformVersionId,
    Project, ProjectId, Uploader, VersionId, Visibility,
};

use crate::builder::{project_error, sanitize_file_name};
use crate::config::{RegistryConfig, VerificationMode, VersionNamePattern};
use crate::detector::DuplicateDetector;
use crate::error::{PublishError, RegistryError, Result};
use crate::providers::AuditEvent;
use crate::services::Services;
use crate::store::{
    DependencyRow, NewVersion, PlatformDependencyRow, RegistryStore, TagRow, VersionRow,
};

/// Name and color of the tag attached to versions marked unstable.
pub const UNSTABLE_TAG: &str = "Unstable";
pub const UNSTABLE_TAG_COLOR: &str = "#ffda6a";

/// Visibility change comment used when a project's first version lands.
pub const FIRST_VERSION_COMMENT: &str = "First version";

/// Where a publish attempt currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    Verifying,
    Committing,
    Relocating,
    SideEffects,
    Published,
    RollingBack,
    Failed,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublishStage::Verifying => "verifying",
            PublishStage::Committing => "committing",
            PublishStage::Relocating => "relocating",
            PublishStage::SideEffects => "side_effects",
            PublishStage::Published => "published",
            PublishStage::RollingBack => "rolling_back",
            PublishStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A successfully published version.
#[derive(Debug, Clone)]
pub struct PublishedVersion {
    pub version: VersionRow,
    pub tags: Vec<TagRow>,
    /// Permanent copies of the artifact, one per platform. Empty for
    /// external versions.
    pub artifact_paths: Vec<PathBuf>,
}

pub struct PublicationPipeline {
    config: Arc<RegistryConfig>,
    pattern: VersionNamePattern,
    store: Arc<RegistryStore>,
    detector: DuplicateDetector,
    services: Services,
}

type PublishResult<T> = std::result::Result<T, PublishError>;

impl PublicationPipeline {
    /// Fails only if the configured version pattern does not compile.
    pub fn new(
        config: Arc<RegistryConfig>,
        store: Arc<RegistryStore>,
        services: Services,
    ) -> Result<Self> {
        let pattern = config.version_pattern()?;
        Ok(PublicationPipeline {
            config,
            pattern,
            detector: DuplicateDetector::new(store.clone()),
            store,
            services,
        })
    }

    /// Publish `pending` as a new version of `project_id`.
    pub fn publish(
        &self,
        project_id: ProjectId,
        uploader: &Uploader,
        pending: &PendingVersion,
    ) -> PublishResult<PublishedVersion> {
        let span = info_span!("publish", project_id, uploader = %uploader.name);
        let _enter = span.enter();

        let project = self.services.projects.project(project_id).map_err(project_error)?;
        let version = slugify(&pending.version_string);
        if !self.pattern.matches(&version) {
            return Err(PublishError::InvalidVersionString { version });
        }

        transition(PublishStage::Verifying);
        let staged = match &pending.source {
            ArtifactSource::File(info) => Some(self.verify(uploader, info)?),
            ArtifactSource::External { url } => {
                if url.trim().is_empty() {
                    return Err(PublishError::MissingExternalUrl);
                }
                None
            }
        };

        let platforms = pending.platforms();
        if self.detector.exists(project_id, &version, &platforms) {
            return Err(PublishError::DuplicateNameAndPlatform { version });
        }
        let links = self.resolve_platform_versions(pending, &version)?;
        let channel = self
            .services
            .channels
            .resolve_or_create(
                project_id,
                &pending.channel.name,
                &pending.channel.color,
                pending.channel.non_reviewed,
            )
            .map_err(|e| unknown_publish(&version, e))?;

        transition(PublishStage::Committing);
        let new = NewVersion {
            version_string: version.clone(),
            description: pending.description.clone(),
            project_id,
            channel_id: channel.id,
            file_size: pending.file_info().map(|f| f.size_bytes),
            file_hash: pending.file_info().map(|f| f.hash.clone()),
            file_name: pending.file_info().map(|f| f.name.clone()),
            author_id: uploader.id,
            forum_sync: pending.forum_sync,
            external_url: pending.external_url().map(|url| url.trim().to_string()),
        };
        let (row, tags) = self
            .store
            .transaction(|tx| {
                let id = tx.insert_version(new);
                let tags = version_tags(id, pending);
                tx.insert_tags(tags.clone())?;
                tx.insert_platform_dependencies(
                    links
                        .iter()
                        .map(|&platform_version_id| PlatformDependencyRow {
                            version_id: id,
                            platform_version_id,
                        })
                        .collect(),
                )?;
                tx.insert_dependencies(dependency_rows(id, pending))?;
                let row = tx
                    .tables()
                    .versions
                    .get(&id)
                    .cloned()
                    .ok_or(RegistryError::VersionNotFound { id })?;
                Ok((row, tags))
            })
            .map_err(|e| match e {
                RegistryError::Constraint { detail } => {
                    warn!(%version, %detail, "commit lost a race for this version");
                    PublishError::DuplicateNameAndPlatform {
                        version: version.clone(),
                    }
                }
                other => transaction_error(&version, other),
            })?;
        info!(version_id = row.id, %version, "version committed");

        let artifact_paths = match &staged {
            Some(staged) => {
                transition(PublishStage::Relocating);
                self.relocate(&project, &version, row.id, staged, pending)?
            }
            None => Vec::new(),
        };

        transition(PublishStage::SideEffects);
        self.run_side_effects(&project, uploader, &row, &platforms, pending.recommended);

        transition(PublishStage::Published);
        info!(version_id = row.id, %version, "version published");
        Ok(PublishedVersion {
            version: row,
            tags,
            artifact_paths,
        })
    }

    /// Check the staged file against its descriptor and return its path.
    fn verify(&self, uploader: &Uploader, info: &FileInfo) -> PublishResult<PathBuf> {
        let missing = || PublishError::MissingFile {
            file_name: info.name.clone(),
        };
        if sanitize_file_name(&info.name) != Some(info.name.as_str()) {
            return Err(missing());
        }
        let artifacts = &self.services.artifacts;
        let staged = artifacts.staged_path(&uploader.name, &info.name);
        if !artifacts.exists(&staged) {
            return Err(missing());
        }

        let measured = artifacts
            .open(&staged)
            .and_then(ContentHash::compute_reader);
        match measured {
            Ok((hash, size)) => {
                if size != info.size_bytes {
                    return Err(PublishError::SizeMismatch {
                        expected: info.size_bytes,
                        actual: size,
                    });
                }
                if hash != info.hash {
                    return Err(PublishError::HashMismatch {
                        expected: info.hash.to_string(),
                        actual: hash.to_string(),
                    });
                }
            }
            Err(e) => match self.config.verification {
                VerificationMode::Strict => {
                    error!(path = %staged.display(), error = %e, "could not read staged file");
                    return Err(PublishError::Unverifiable {
                        file_name: info.name.clone(),
                        source: e,
                    });
                }
                VerificationMode::Lenient => {
                    error!(
                        path = %staged.display(),
                        error = %e,
                        "could not read staged file; accepting it unverified"
                    );
                }
            },
        }
        Ok(staged)
    }

    /// Catalog ids for every declared (platform, version) pair.
    fn resolve_platform_versions(
        &self,
        pending: &PendingVersion,
        version: &str,
    ) -> PublishResult<Vec<PlatformVersionId>> {
        let catalog = &self.services.catalog;
        let mut links = Vec::new();
        for (&platform, required) in &pending.platform_dependencies {
            let known = catalog
                .versions_for_platform(platform)
                .map_err(|e| unknown_publish(version, e))?;
            for platform_version in required {
                if !known.contains(platform_version) {
                    return Err(PublishError::InvalidPlatformVersion {
                        platform,
                        version: platform_version.clone(),
                    });
                }
                let id = catalog
                    .lookup(platform, platform_version)
                    .map_err(|e| match e {
                        RegistryError::PlatformVersionNotFound {
                            platform,
                            version: missing,
                        } => PublishError::InvalidPlatformVersion {
                            platform,
                            version: missing,
                        },
                        other => unknown_publish(version, other),
                    })?;
                links.push(id);
            }
        }
        Ok(links)
    }

    /// Copy the staged artifact to every platform that declares a version,
    /// then drop the staged copy. Rolls the version back on failure.
    fn relocate(
        &self,
        project: &Project,
        version: &str,
        version_id: VersionId,
        staged: &Path,
        pending: &PendingVersion,
    ) -> PublishResult<Vec<PathBuf>> {
        let artifacts = &self.services.artifacts;
        let mut copies = Vec::new();
        for (&platform, required) in &pending.platform_dependencies {
            if required.is_empty() {
                continue;
            }
            let relocated =
                artifacts.relocate(staged, &project.owner_name, &project.name, version, platform);
            match relocated {
                Ok(path) => copies.push(path),
                Err(e) => {
                    error!(%platform, error = %e, "relocation failed");
                    self.roll_back(version_id, &copies);
                    return Err(transaction_error(version, e));
                }
            }
        }
        if let Err(e) = artifacts.delete(staged) {
            warn!(path = %staged.display(), error = %e, "could not remove staged file");
        }
        Ok(copies)
    }

    fn roll_back(&self, version_id: VersionId, copies: &[PathBuf]) {
        transition(PublishStage::RollingBack);
        match self.store.delete_version(version_id) {
            Ok(_) => info!(version_id, "version rolled back"),
            Err(e) => error!(version_id, error = %e, "could not delete version during rollback"),
        }
        for copy in copies {
            if let Err(e) = self.services.artifacts.delete(copy) {
                warn!(path = %copy.display(), error = %e, "could not remove relocated copy");
            }
        }
        transition(PublishStage::Failed);
    }

    fn run_side_effects(
        &self,
        project: &Project,
        uploader: &Uploader,
        row: &VersionRow,
        platforms: &BTreeSet<Platform>,
        recommended: bool,
    ) {
        let services = &self.services;
        if project.visibility == Visibility::New {
            if let Err(e) =
                services
                    .projects
                    .change_visibility(project.id, Visibility::Public, FIRST_VERSION_COMMENT)
            {
                warn!(error = %e, "could not make project public");
            }
        }
        if recommended {
            for &platform in platforms {
                if let Err(e) = services.recommended.set_recommended(project.id, row.id, platform) {
                    warn!(%platform, error = %e, "could not mark version recommended");
                }
            }
        }
        if let Err(e) = services.notifications.notify_new_version(project, row) {
            warn!(error = %e, "could not notify watchers");
        }
        let event = AuditEvent::version_uploaded(uploader.id, project.id, row.id);
        if let Err(e) = services.audit.record(event) {
            warn!(error = %e, "could not record audit event");
        }
        for cache in &services.caches {
            if let Err(e) = cache.invalidate() {
                warn!(error = %e, "could not invalidate cache");
            }
        }
    }
}

fn transition(stage: PublishStage) {
    debug!(%stage, "publish stage");
}

fn transaction_error(version: &str, source: RegistryError) -> PublishError {
    if source.is_io() {
        PublishError::FileIo {
            version: version.to_string(),
            source,
        }
    } else {
        unknown_publish(version, source)
    }
}

fn unknown_publish(version: &str, source: RegistryError) -> PublishError {
    PublishError::UnknownPublish {
        version: version.to_string(),
        source,
    }
}

/// One tag per declared platform, plus the unstable tag if requested.
fn version_tags(version_id: VersionId, pending: &PendingVersion) -> Vec<TagRow> {
    let mut tags: Vec<TagRow> = pending
        .platform_dependencies
        .iter()
        .map(|(&platform, required)| TagRow {
            version_id,
            name: platform.name().to_string(),
            data: required.iter().cloned().collect(),
            color: platform.tag_color().to_string(),
            platform: Some(platform),
        })
        .collect();
    if pending.unstable {
        tags.push(TagRow {
            version_id,
            name: UNSTABLE_TAG.to_string(),
            data: Vec::new(),
            color: UNSTABLE_TAG_COLOR.to_string(),
            platform: None,
        });
    }
    tags
}

fn dependency_rows(version_id: VersionId, pending: &PendingVersion) -> Vec<DependencyRow> {
    pending
        .plugin_dependencies
        .iter()
        .flat_map(|(&platform, deps)| {
            deps.iter().map(move |dep| DependencyRow {
                version_id,
                platform,
                name: dep.name.clone(),
                required: dep.required,
                project_id: dep.project_id,
                external_url: dep.external_url.clone(),
            })
        })
        .collect()
}
