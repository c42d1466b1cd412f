//! Building pending versions from uploads and external URLs.
//!
//! Staging never touches the registry tables: it writes the upload into the
//! uploader's staging area, reads its metadata, and runs the checks that can
//! be answered before publishing. The resulting [`PendingVersion`] is handed
//! back to the uploader for review.

use std::io::Read;
use std::sync::Arc;

use tracing::{debug, error, info};

use plugyard_core::{
    slugify, ArtifactSource, ChannelRef, FileInfo, PendingVersion, Project, ProjectId, Uploader,
};

use crate::config::{RegistryConfig, VersionNamePattern};
use crate::detector::DuplicateDetector;
use crate::error::{PublishError, RegistryError, Result};
use crate::services::Services;
use crate::store::RegistryStore;

/// Last path component of an uploaded file name, or `None` if nothing
/// usable remains.
pub(crate) fn sanitize_file_name(file_name: &str) -> Option<&str> {
    let name = file_name.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name)
    }
}

/// Map a project lookup failure onto a caller-facing error.
pub(crate) fn project_error(err: RegistryError) -> PublishError {
    match err {
        RegistryError::ProjectNotFound { id } => PublishError::ProjectNotFound { id },
        other => PublishError::UnexpectedUpload(other),
    }
}

pub struct PendingVersionBuilder {
    config: Arc<RegistryConfig>,
    pattern: VersionNamePattern,
    store: Arc<RegistryStore>,
    detector: DuplicateDetector,
    services: Services,
}

impl PendingVersionBuilder {
    /// Fails only if the configured version pattern does not compile.
    pub fn new(
        config: Arc<RegistryConfig>,
        store: Arc<RegistryStore>,
        services: Services,
    ) -> Result<Self> {
        let pattern = config.version_pattern()?;
        Ok(PendingVersionBuilder {
            config,
            pattern,
            detector: DuplicateDetector::new(store.clone()),
            store,
            services,
        })
    }

    /// Stage an uploaded archive and draft a version from its metadata.
    pub fn stage_upload(
        &self,
        project_id: ProjectId,
        uploader: &Uploader,
        file_name: &str,
        reader: &mut dyn Read,
    ) -> std::result::Result<PendingVersion, PublishError> {
        let name = sanitize_file_name(file_name)
            .filter(|name| self.config.is_archive(name))
            .ok_or_else(|| PublishError::InvalidExtension {
                file_name: file_name.to_string(),
                expected: self.config.archive_extensions.join(", "),
            })?;
        let project = self.services.projects.project(project_id).map_err(project_error)?;

        let staged = self
            .services
            .artifacts
            .stage(&uploader.name, name, reader)
            .map_err(|e| {
                error!(uploader = %uploader.name, file = name, error = %e, "staging write failed");
                PublishError::StagingIo(e)
            })?;

        let metadata = self
            .services
            .extractor
            .extract(&staged, uploader.id)
            .map_err(|e| {
                error!(
                    uploader = %uploader.name,
                    path = %staged.display(),
                    error = %e,
                    "metadata extraction failed"
                );
                PublishError::UnexpectedUpload(e)
            })?;

        let version = slugify(&metadata.version);
        if !self.pattern.matches(&version) {
            return Err(PublishError::InvalidVersionString { version });
        }

        let platforms = metadata.platform_dependencies.keys().copied().collect();
        if self.detector.exists(project_id, &version, &platforms) {
            return Err(PublishError::DuplicateNameAndPlatform { version });
        }
        if self.config.validate_duplicate_artifacts
            && self
                .store
                .version_by_hash(project_id, &metadata.hash, &version)
                .is_some()
        {
            return Err(PublishError::DuplicateArtifact { version });
        }

        let channel = self.default_channel(&project)?;
        info!(
            project_id,
            uploader = %uploader.name,
            %version,
            file = name,
            "upload staged"
        );
        Ok(PendingVersion {
            version_string: version,
            description: metadata.description,
            platform_dependencies: metadata.platform_dependencies,
            plugin_dependencies: metadata.plugin_dependencies,
            source: ArtifactSource::File(FileInfo {
                name: name.to_string(),
                size_bytes: metadata.size_bytes,
                hash: metadata.hash,
            }),
            channel,
            forum_sync: project.forum_sync,
            unstable: false,
            recommended: false,
        })
    }

    /// Draft a version hosted at an external URL. The uploader supplies
    /// the version string and platforms before publishing.
    pub fn stage_url(
        &self,
        project_id: ProjectId,
        url: &str,
    ) -> std::result::Result<PendingVersion, PublishError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(PublishError::MissingExternalUrl);
        }
        let project = self.services.projects.project(project_id).map_err(project_error)?;
        let channel = self.default_channel(&project)?;
        debug!(project_id, url, "external version drafted");
        Ok(PendingVersion::external(url, channel, project.forum_sync))
    }

    fn default_channel(&self, project: &Project) -> std::result::Result<ChannelRef, PublishError> {
        self.services
            .channels
            .first_channel(project.id)
            .map(|channel| ChannelRef::from(&channel))
            .map_err(PublishError::UnexpectedUpload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{plugin_jar, Harness};
    use plugyard_core::{ContentHash, Platform};

    #[test]
    fn sanitize_keeps_last_component() {
        assert_eq!(sanitize_file_name("dir/sub/pads.jar"), Some("pads.jar"));
        assert_eq!(sanitize_file_name(r"C:\uploads\pads.jar"), Some("pads.jar"));
        assert_eq!(sanitize_file_name("../"), None);
        assert_eq!(sanitize_file_name(".."), None);
    }

    #[test]
    fn stage_upload_drafts_version() {
        let h = Harness::new();
        let bytes = plugin_jar("2.4 beta", &[("paper", &["1.21"])]);
        let pending = h.stage("pads.jar", &bytes).unwrap();

        assert_eq!(pending.version_string, "2.4-beta");
        assert_eq!(pending.channel.name, "Release");
        assert!(!pending.unstable);
        let info = pending.file_info().unwrap();
        assert_eq!(info.name, "pads.jar");
        assert_eq!(info.size_bytes, bytes.len() as u64);
        assert_eq!(info.hash, ContentHash::compute(&bytes));
        assert_eq!(pending.platforms().into_iter().collect::<Vec<_>>(), vec![Platform::Paper]);
        assert!(h.store.versions(h.project.id).is_empty());
    }

    #[test]
    fn bad_extension_writes_nothing() {
        let h = Harness::new();
        let err = h.stage("pads.exe", &plugin_jar("1.0", &[])).unwrap_err();
        assert!(matches!(err, PublishError::InvalidExtension { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!h.staging_root().exists());
    }

    #[test]
    fn unknown_project() {
        let h = Harness::new();
        let err = h
            .builder()
            .stage_upload(999, &h.uploader, "pads.jar", &mut &plugin_jar("1.0", &[])[..])
            .unwrap_err();
        assert!(matches!(err, PublishError::ProjectNotFound { id: 999 }));
    }

    #[test]
    fn unreadable_archive_is_unexpected_upload() {
        let h = Harness::new();
        let err = h.stage("pads.jar", b"not an archive").unwrap_err();
        assert!(matches!(err, PublishError::UnexpectedUpload(_)));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn staging_write_failure_is_infrastructure() {
        struct Reset;
        impl Read for Reset {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("connection reset"))
            }
        }

        let h = Harness::new();
        let err = h
            .builder()
            .stage_upload(h.project.id, &h.uploader, "pads.jar", &mut Reset)
            .unwrap_err();
        assert!(matches!(err, PublishError::StagingIo(_)));
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        let leftovers = std::fs::read_dir(h.staging_root().join("alice")).unwrap().count();
        assert_eq!(leftovers, 0);
        assert!(h.store.versions(h.project.id).is_empty());
    }

    #[test]
    fn uploader_name_cannot_leave_staging() {
        let h = Harness::new();
        let err = h
            .builder()
            .stage_upload(
                h.project.id,
                &Uploader::new(8, ".."),
                "pads.jar",
                &mut &plugin_jar("1.0", &[])[..],
            )
            .unwrap_err();
        assert!(matches!(err, PublishError::StagingIo(_)));
        assert!(!h.dir.path().join("pads.jar").exists());
    }

    #[test]
    fn version_must_match_pattern() {
        let h = Harness::new();
        let err = h.stage("pads.jar", &plugin_jar("1.0/evil", &[])).unwrap_err();
        assert!(matches!(
            err,
            PublishError::InvalidVersionString { ref version } if version == "1.0/evil"
        ));

        let err = h.stage("pads.jar", &plugin_jar("   ", &[])).unwrap_err();
        assert!(matches!(err, PublishError::InvalidVersionString { .. }));
    }

    #[test]
    fn duplicate_name_and_platform_at_staging() {
        let h = Harness::new();
        h.publish_jar("pads.jar", &plugin_jar("1.0", &[("paper", &["1.21"])]))
            .unwrap();

        let err = h
            .stage("pads-v2.jar", &plugin_jar("1.0", &[("paper", &["1.20"])]))
            .unwrap_err();
        assert!(matches!(err, PublishError::DuplicateNameAndPlatform { .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // A different platform under the same name is allowed.
        h.stage("pads-velocity.jar", &plugin_jar("1.0", &[("velocity", &["3.3"])]))
            .unwrap();
    }

    #[test]
    fn duplicate_artifact_guard_can_be_disabled() {
        let h = Harness::new();
        let bytes = plugin_jar("1.0", &[]);
        h.publish_jar("pads.jar", &bytes).unwrap();

        let err = h.stage("pads.jar", &bytes).unwrap_err();
        assert!(matches!(err, PublishError::DuplicateArtifact { .. }));

        let mut config = RegistryConfig::default();
        config.validate_duplicate_artifacts = false;
        let lenient = Harness::with_config(config);
        lenient.publish_jar("pads.jar", &bytes).unwrap();
        lenient.stage("pads.jar", &bytes).unwrap();
    }

    #[test]
    fn stage_url_draft() {
        let h = Harness::new();
        let pending = h
            .builder()
            .stage_url(h.project.id, " https://example.com/pads.jar ")
            .unwrap();
        assert_eq!(pending.external_url(), Some("https://example.com/pads.jar"));
        assert!(pending.version_string.is_empty());
        assert_eq!(pending.channel.name, "Release");

        let err = h.builder().stage_url(h.project.id, "  ").unwrap_err();
        assert!(matches!(err, PublishError::MissingExternalUrl));
    }

    #[test]
    fn forum_sync_follows_project() {
        let h = Harness::new();
        let synced = h.store.create_project("alice", "Synced", true).unwrap();
        let pending = h
            .builder()
            .stage_url(synced.id, "https://example.com/s.jar")
            .unwrap();
        assert!(pending.forum_sync);
    }
}
