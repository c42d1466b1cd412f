//! Fixtures shared by the unit tests.

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use plugyard_core::{PendingVersion, Platform, Project, ProjectId, Uploader};

use crate::artifacts::{ArtifactStore, LocalArtifactStore};
use crate::builder::PendingVersionBuilder;
use crate::config::RegistryConfig;
use crate::error::{PublishError, Result};
use crate::pipeline::{PublicationPipeline, PublishedVersion};
use crate::providers::NotificationSink;
use crate::services::Services;
use crate::store::{RegistryStore, VersionRow};
use crate::views::ViewCache;

/// Build a zip archive in memory.
pub(crate) fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        writer.start_file(*name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A plugin jar declaring `version` and the given platform versions.
pub(crate) fn plugin_jar(version: &str, platforms: &[(&str, &[&str])]) -> Vec<u8> {
    let mut block = format!("[plugin]\nversion = \"{version}\"\n");
    for (platform, versions) in platforms {
        let list = versions
            .iter()
            .map(|v| format!("\"{v}\""))
            .collect::<Vec<_>>()
            .join(", ");
        block.push_str(&format!("\n[platforms.{platform}]\nversions = [{list}]\n"));
    }
    zip_archive(&[("plugin.toml", block.as_str()), ("Main.class", "bytecode")])
}

/// Notification sink that remembers what it was told.
#[derive(Debug, Default)]
pub(crate) struct RecordingNotifier {
    seen: Mutex<Vec<(ProjectId, String)>>,
}

impl RecordingNotifier {
    pub(crate) fn seen(&self) -> Vec<(ProjectId, String)> {
        self.seen.lock().clone()
    }
}

impl NotificationSink for RecordingNotifier {
    fn notify_new_version(&self, project: &Project, version: &VersionRow) -> Result<()> {
        self.seen
            .lock()
            .push((project.id, version.version_string.clone()));
        Ok(())
    }
}

/// A registry in a temp directory with one project, a seeded platform
/// catalog and an uploader named `alice`.
pub(crate) struct Harness {
    pub dir: TempDir,
    pub config: Arc<RegistryConfig>,
    pub store: Arc<RegistryStore>,
    pub artifacts: Arc<LocalArtifactStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub views: Arc<ViewCache>,
    pub project: Project,
    pub uploader: Uploader,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RegistryStore::in_memory());
        for (platform, version) in [
            (Platform::Paper, "1.20"),
            (Platform::Paper, "1.21"),
            (Platform::Waterfall, "1.20"),
            (Platform::Velocity, "3.3"),
        ] {
            store.add_platform_version(platform, version).unwrap();
        }
        let project = store.create_project("alice", "Gadget", false).unwrap();
        let artifacts = Arc::new(LocalArtifactStore::new(
            dir.path().join("staging"),
            dir.path().join("plugins"),
        ));

        Harness {
            views: Arc::new(ViewCache::new(store.clone())),
            dir,
            config: Arc::new(config),
            store,
            artifacts,
            notifier: Arc::new(RecordingNotifier::default()),
            project,
            uploader: Uploader::new(7, "alice"),
        }
    }

    /// A fresh handle on the same directories as `artifacts`.
    pub fn local_artifacts(&self) -> LocalArtifactStore {
        (*self.artifacts).clone()
    }

    pub fn staging_root(&self) -> PathBuf {
        self.dir.path().join("staging")
    }

    pub fn services(&self) -> Services {
        let artifacts: Arc<dyn ArtifactStore> = self.artifacts.clone();
        let mut services =
            Services::local(self.store.clone(), artifacts).with_cache(self.views.clone());
        services.notifications = self.notifier.clone();
        services
    }

    pub fn builder(&self) -> PendingVersionBuilder {
        PendingVersionBuilder::new(self.config.clone(), self.store.clone(), self.services())
            .unwrap()
    }

    pub fn pipeline(&self) -> PublicationPipeline {
        PublicationPipeline::new(self.config.clone(), self.store.clone(), self.services())
            .unwrap()
    }

    pub fn stage(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> std::result::Result<PendingVersion, PublishError> {
        self.builder()
            .stage_upload(self.project.id, &self.uploader, file_name, &mut &bytes[..])
    }

    pub fn publish_jar(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> std::result::Result<PublishedVersion, PublishError> {
        let pending = self.stage(file_name, bytes)?;
        self.pipeline()
            .publish(self.project.id, &self.uploader, &pending)
    }
}
