//! Wiring of collaborators into the builder and the pipeline.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::artifacts::{ArtifactStore, LocalArtifactStore};
use crate::builder::PendingVersionBuilder;
use crate::config::RegistryConfig;
use crate::error::Result;
use crate::extractor::{ArchiveMetadataExtractor, MetadataExtractor};
use crate::pipeline::PublicationPipeline;
use crate::providers::{
    AuditSink, CacheInvalidator, ChannelProvider, NotificationSink, PlatformCatalog,
    ProjectProvider, RecommendedVersions, TracingNotifier,
};
use crate::store::RegistryStore;
use crate::views::ViewCache;

/// The collaborators staging and publishing call into.
#[derive(Clone)]
pub struct Services {
    pub artifacts: Arc<dyn ArtifactStore>,
    pub extractor: Arc<dyn MetadataExtractor>,
    pub channels: Arc<dyn ChannelProvider>,
    pub catalog: Arc<dyn PlatformCatalog>,
    pub projects: Arc<dyn ProjectProvider>,
    pub recommended: Arc<dyn RecommendedVersions>,
    pub notifications: Arc<dyn NotificationSink>,
    pub audit: Arc<dyn AuditSink>,
    pub caches: Vec<Arc<dyn CacheInvalidator>>,
}

impl Services {
    /// Store-backed collaborators, the archive extractor and a log-only
    /// notifier. No caches are registered.
    pub fn local(store: Arc<RegistryStore>, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Services {
            artifacts,
            extractor: Arc::new(ArchiveMetadataExtractor),
            channels: store.clone(),
            catalog: store.clone(),
            projects: store.clone(),
            recommended: store.clone(),
            notifications: Arc::new(TracingNotifier),
            audit: store,
            caches: Vec::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheInvalidator>) -> Self {
        self.caches.push(cache);
        self
    }
}

/// A registry rooted at a local data directory.
pub struct Registry {
    pub config: Arc<RegistryConfig>,
    pub store: Arc<RegistryStore>,
    pub views: Arc<ViewCache>,
    pub builder: PendingVersionBuilder,
    pub pipeline: PublicationPipeline,
}

impl Registry {
    /// Open (or create) the registry under `data_dir`.
    pub fn open(data_dir: &Path, config: RegistryConfig) -> Result<Self> {
        let config = Arc::new(config);
        let store = Arc::new(RegistryStore::open(
            config.storage.database_path(data_dir),
        )?);
        let artifacts: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(
            config.storage.staging_path(data_dir),
            config.storage.artifact_path(data_dir),
        ));
        let views = Arc::new(ViewCache::new(store.clone()));
        let services = Services::local(store.clone(), artifacts).with_cache(views.clone());

        let builder = PendingVersionBuilder::new(config.clone(), store.clone(), services.clone())?;
        let pipeline = PublicationPipeline::new(config.clone(), store.clone(), services)?;
        info!(data_dir = %data_dir.display(), "registry opened");

        Ok(Registry {
            config,
            store,
            views,
            builder,
            pipeline,
        })
    }
}
