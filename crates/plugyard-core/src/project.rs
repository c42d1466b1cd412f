//! Projects, channels and the people uploading to them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub type ProjectId = u64;
pub type ChannelId = u64;
pub type VersionId = u64;
pub type PlatformVersionId = u64;
pub type UserId = u64;

/// Moderation visibility of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Created, but no version published yet.
    New,
    Public,
    NeedsChanges,
    NeedsApproval,
    SoftDelete,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Visibility::New => "new",
            Visibility::Public => "public",
            Visibility::NeedsChanges => "needs_changes",
            Visibility::NeedsApproval => "needs_approval",
            Visibility::SoftDelete => "soft_delete",
        };
        f.write_str(s)
    }
}

impl FromStr for Visibility {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Visibility::New),
            "public" => Ok(Visibility::Public),
            "needs_changes" => Ok(Visibility::NeedsChanges),
            "needs_approval" => Ok(Visibility::NeedsApproval),
            "soft_delete" => Ok(Visibility::SoftDelete),
            other => Err(CoreError::UnknownVisibility(other.to_string())),
        }
    }
}

/// A registry project that versions are published under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// Name of the owning user or organization.
    pub owner_name: String,
    pub name: String,
    pub visibility: Visibility,
    /// Whether new versions are mirrored to the project's forum thread.
    #[serde(default)]
    pub forum_sync: bool,
}

/// A named release track of a project (e.g. "Release", "Beta").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub project_id: ProjectId,
    pub name: String,
    pub color: String,
    /// Versions in this channel skip review.
    pub non_reviewed: bool,
}

/// The identity performing an upload or publish.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uploader {
    pub id: UserId,
    /// Login name; the staging area is keyed by it.
    pub name: String,
}

impl Uploader {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        Uploader {
            id,
            name: name.into(),
        }
    }
}
