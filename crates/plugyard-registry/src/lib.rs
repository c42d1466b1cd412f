//! Version registry engine for plugyard.
//!
//! Publishing a plugin version is a two-phase flow:
//!
//! 1. **Stage**: [`PendingVersionBuilder`] writes an uploaded archive into
//!    the uploader's staging area, extracts its declared metadata and returns
//!    a [`PendingVersion`](plugyard_core::PendingVersion) draft. A draft can
//!    also reference an externally hosted download instead of a file.
//! 2. **Publish**: [`PublicationPipeline`] verifies the staged artifact,
//!    commits the version with its tags, platform links and dependencies in
//!    one store transaction, moves the artifact into permanent storage and
//!    runs post-commit side effects. Failures after the commit roll the
//!    version back.
//!
//! # Architecture
//!
//! The pipeline talks to its collaborators through traits in [`providers`],
//! [`artifacts`] and [`extractor`]. [`RegistryStore`] is a JSON-persisted
//! table store that implements the store-backed ones; [`Registry`] wires a
//! complete local registry under one data directory.

pub mod artifacts;
pub mod builder;
pub mod config;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod providers;
pub mod services;
pub mod store;
pub mod views;

#[cfg(test)]
mod test_support;

// Re-exports for convenience.
pub use artifacts::{ArtifactStore, LocalArtifactStore};
pub use builder::PendingVersionBuilder;
pub use config::{RegistryConfig, StorageConfig, VerificationMode, VersionNamePattern};
pub use detector::DuplicateDetector;
pub use error::{ErrorKind, PublishError, RegistryError, Result};
pub use extractor::{ArchiveMetadataExtractor, ExtractedMetadata, MetadataExtractor};
pub use pipeline::{PublicationPipeline, PublishStage, PublishedVersion};
pub use providers::{
    AuditEvent, AuditSink, CacheInvalidator, ChannelProvider, NotificationSink, PlatformCatalog,
    ProjectProvider, RecommendedVersions, TracingNotifier,
};
pub use services::{Registry, Services};
pub use store::RegistryStore;
pub use views::{AuthorSummary, ViewCache};
