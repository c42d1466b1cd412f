//! Domain types for the plugyard plugin version registry.
//!
//! Shared vocabulary between the registry engine and its front ends:
//! platforms, projects and channels, content hashes, and the pending
//! version draft that is staged, inspected, and then published.

pub mod error;
pub mod hash;
pub mod pending;
pub mod platform;
pub mod project;
pub mod slug;

pub use error::CoreError;
pub use hash::ContentHash;
pub use pending::{
    ArtifactSource, ChannelRef, FileInfo, PendingVersion, PlatformDependencies,
    PluginDependencies, PluginDependency,
};
pub use platform::Platform;
pub use project::{
    Channel, ChannelId, PlatformVersionId, Project, ProjectId, Uploader, UserId, VersionId,
    Visibility,
};
pub use slug::{is_path_safe, slugify};
