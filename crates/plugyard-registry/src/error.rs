//! Registry error types.

use std::path::PathBuf;

use plugyard_core::{Platform, ProjectId, VersionId};

/// Errors raised by the store, the artifact store and other collaborators.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("project {id} not found")]
    ProjectNotFound { id: ProjectId },

    #[error("project {project_id} has no channels")]
    ChannelNotFound { project_id: ProjectId },

    #[error("version {id} not found")]
    VersionNotFound { id: VersionId },

    /// A (platform, version string) pair missing from the platform catalog.
    #[error("platform version {platform} {version} is not in the catalog")]
    PlatformVersionNotFound { platform: Platform, version: String },

    /// A name that cannot be used as a storage path component.
    #[error("'{name}' is not a valid name")]
    InvalidName { name: String },

    /// A store constraint rejected a transaction.
    #[error("constraint violation: {detail}")]
    Constraint { detail: String },

    /// The artifact's declared metadata block is missing or malformed.
    #[error("could not read plugin metadata: {detail}")]
    MetadataParse { detail: String },

    /// A relocated artifact did not appear at its destination.
    #[error("artifact was not written to {path}")]
    NotRelocated { path: PathBuf },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Whether the failure originated in filesystem I/O.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            RegistryError::Io(_) | RegistryError::NotRelocated { .. }
        )
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Coarse classification of staging and publishing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input; nothing was written.
    Validation,
    /// Collides with an existing version; nothing was written.
    Conflict,
    /// The staged artifact does not match its descriptor.
    Integrity,
    /// Failed during or after the commit; the version was rolled back.
    Transaction,
    /// Staging or extraction broke; details are in the server log.
    Infrastructure,
}

/// Outcome of a failed stage or publish, as reported to the uploader.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("'{file_name}' is not a supported archive; expected one of {expected}")]
    InvalidExtension { file_name: String, expected: String },

    #[error("version string '{version}' is not allowed")]
    InvalidVersionString { version: String },

    #[error("{platform} {version} is not a known platform version")]
    InvalidPlatformVersion { platform: Platform, version: String },

    #[error("an external URL is required")]
    MissingExternalUrl,

    #[error("project {id} not found")]
    ProjectNotFound { id: ProjectId },

    #[error("version '{version}' already exists for one of the selected platforms")]
    DuplicateNameAndPlatform { version: String },

    #[error("this file was already published as version '{version}'")]
    DuplicateArtifact { version: String },

    #[error("staged file '{file_name}' is missing; upload it again")]
    MissingFile { file_name: String },

    #[error("staged file size {actual} does not match the declared {expected} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("staged file hash {actual} does not match the declared {expected}")]
    HashMismatch { expected: String, actual: String },

    #[error("could not write the uploaded file")]
    StagingIo(#[source] std::io::Error),

    #[error("unexpected error while reading the upload")]
    UnexpectedUpload(#[source] RegistryError),

    #[error("staged file '{file_name}' could not be read for verification")]
    Unverifiable {
        file_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file error while publishing version '{version}'")]
    FileIo {
        version: String,
        #[source]
        source: RegistryError,
    },

    #[error("unknown error while publishing version '{version}'")]
    UnknownPublish {
        version: String,
        #[source]
        source: RegistryError,
    },
}

impl PublishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::InvalidExtension { .. }
            | PublishError::InvalidVersionString { .. }
            | PublishError::InvalidPlatformVersion { .. }
            | PublishError::MissingExternalUrl
            | PublishError::ProjectNotFound { .. } => ErrorKind::Validation,
            PublishError::DuplicateNameAndPlatform { .. }
            | PublishError::DuplicateArtifact { .. } => ErrorKind::Conflict,
            PublishError::MissingFile { .. }
            | PublishError::SizeMismatch { .. }
            | PublishError::HashMismatch { .. }
            | PublishError::Unverifiable { .. } => ErrorKind::Integrity,
            PublishError::FileIo { .. } | PublishError::UnknownPublish { .. } => {
                ErrorKind::Transaction
            }
            PublishError::StagingIo(_) | PublishError::UnexpectedUpload(_) => {
                ErrorKind::Infrastructure
            }
        }
    }
}
