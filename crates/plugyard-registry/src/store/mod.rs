//! The registry store.
//!
//! A set of relational-style tables behind a single lock, optionally
//! persisted as a JSON snapshot after every committed transaction.
//! Writes go through [`RegistryStore::transaction`], which runs against a
//! working copy and swaps it in only if the closure succeeds and the
//! snapshot was written, so readers never see a partial commit.

mod tables;

pub use tables::{
    AuditRow, DependencyRow, NewVersion, PlatformDependencyRow, PlatformVersionRow,
    RecommendedRow, Tables, TagRow, VersionRow,
};

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use plugyard_core::{
    is_path_safe, Channel, ContentHash, Platform, PlatformVersionId, Project, ProjectId,
    Visibility, VersionId,
};

use crate::error::{RegistryError, Result};

/// Name and color of the channel every new project starts with.
pub const DEFAULT_CHANNEL_NAME: &str = "Release";
pub const DEFAULT_CHANNEL_COLOR: &str = "#009600";

/// Tables guarded by a mutex, with optional JSON persistence.
#[derive(Debug)]
pub struct RegistryStore {
    path: Option<PathBuf>,
    tables: Mutex<Tables>,
}

/// Write access to a working copy of the tables.
pub struct Transaction<'a> {
    tables: &'a mut Tables,
}

impl RegistryStore {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        RegistryStore {
            path: None,
            tables: Mutex::new(Tables::default()),
        }
    }

    /// Open a store persisted at `path`, loading the snapshot if present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tables = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            Tables::default()
        };
        Ok(RegistryStore {
            path: Some(path),
            tables: Mutex::new(tables),
        })
    }

    /// Run `f` against a working copy of the tables and commit it atomically.
    ///
    /// If `f` fails, or the snapshot cannot be written, nothing changes.
    pub fn transaction<T>(&self, f: impl FnOnce(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut guard = self.tables.lock();
        let mut working = guard.clone();
        let value = f(&mut Transaction {
            tables: &mut working,
        })?;
        self.persist(&working)?;
        *guard = working;
        Ok(value)
    }

    /// Run a read-only closure against the committed tables.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&self.tables.lock())
    }

    fn persist(&self, tables: &Tables) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(tables)?;

        // A crash mid-write leaves the previous snapshot intact.
        let part = path.with_extension(format!("{}.part", Uuid::new_v4()));
        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&part)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&part, path)
        })();
        if let Err(e) = written {
            let _ = fs::remove_file(&part);
            return Err(e.into());
        }
        debug!(path = %path.display(), "registry snapshot written");
        Ok(())
    }

    /// Create a project along with its default channel.
    pub fn create_project(
        &self,
        owner_name: &str,
        name: &str,
        forum_sync: bool,
    ) -> Result<Project> {
        for component in [owner_name, name] {
            if !is_path_safe(component) {
                return Err(RegistryError::InvalidName {
                    name: component.to_string(),
                });
            }
        }
        self.transaction(|tx| {
            let id = tx.tables.next_id();
            let project = Project {
                id,
                owner_name: owner_name.to_string(),
                name: name.to_string(),
                visibility: Visibility::New,
                forum_sync,
            };
            tx.tables.projects.insert(id, project.clone());
            tx.insert_channel(id, DEFAULT_CHANNEL_NAME, DEFAULT_CHANNEL_COLOR, false);
            Ok(project)
        })
    }

    pub fn project(&self, id: ProjectId) -> Result<Project> {
        self.read(|t| t.projects.get(&id).cloned())
            .ok_or(RegistryError::ProjectNotFound { id })
    }

    pub fn set_visibility(&self, id: ProjectId, visibility: Visibility) -> Result<()> {
        self.transaction(|tx| {
            let project = tx
                .tables
                .projects
                .get_mut(&id)
                .ok_or(RegistryError::ProjectNotFound { id })?;
            project.visibility = visibility;
            Ok(())
        })
    }

    pub fn channels(&self, project_id: ProjectId) -> Vec<Channel> {
        self.read(|t| {
            t.channels
                .iter()
                .filter(|c| c.project_id == project_id)
                .cloned()
                .collect()
        })
    }

    /// Add a platform version to the catalog. Adding an existing entry
    /// returns its id.
    pub fn add_platform_version(
        &self,
        platform: Platform,
        version: &str,
    ) -> Result<PlatformVersionId> {
        self.transaction(|tx| {
            if let Some(existing) = tx.tables.platform_version(platform, version) {
                return Ok(existing.id);
            }
            let id = tx.tables.next_id();
            tx.tables.platform_versions.push(PlatformVersionRow {
                id,
                platform,
                version: version.to_string(),
            });
            Ok(id)
        })
    }

    /// Platforms already linked to `version_string` within the project.
    pub fn platforms_for_version_string(
        &self,
        project_id: ProjectId,
        version_string: &str,
    ) -> Vec<Platform> {
        self.read(|t| t.platforms_for_version_string(project_id, version_string))
    }

    /// The committed version of `project_id` with this artifact hash and
    /// version string, if any.
    pub fn version_by_hash(
        &self,
        project_id: ProjectId,
        hash: &ContentHash,
        version_string: &str,
    ) -> Option<VersionRow> {
        self.read(|t| {
            t.versions
                .values()
                .find(|v| {
                    v.project_id == project_id
                        && v.version_string == version_string
                        && v.file_hash.as_ref() == Some(hash)
                })
                .cloned()
        })
    }

    /// Committed versions of a project, oldest first.
    pub fn versions(&self, project_id: ProjectId) -> Vec<VersionRow> {
        self.read(|t| {
            t.versions
                .values()
                .filter(|v| v.project_id == project_id)
                .cloned()
                .collect()
        })
    }

    pub fn tags(&self, version_id: VersionId) -> Vec<TagRow> {
        self.read(|t| {
            t.tags
                .iter()
                .filter(|tag| tag.version_id == version_id)
                .cloned()
                .collect()
        })
    }

    /// Concrete platform versions linked to a version.
    pub fn linked_platform_versions(&self, version_id: VersionId) -> Vec<PlatformVersionRow> {
        self.read(|t| {
            t.platform_dependencies
                .iter()
                .filter(|pd| pd.version_id == version_id)
                .filter_map(|pd| {
                    t.platform_versions
                        .iter()
                        .find(|pv| pv.id == pd.platform_version_id)
                        .cloned()
                })
                .collect()
        })
    }

    pub fn dependencies(&self, version_id: VersionId) -> Vec<DependencyRow> {
        self.read(|t| {
            t.dependencies
                .iter()
                .filter(|d| d.version_id == version_id)
                .cloned()
                .collect()
        })
    }

    pub fn recommended_version(
        &self,
        project_id: ProjectId,
        platform: Platform,
    ) -> Option<VersionId> {
        self.read(|t| {
            t.recommended
                .iter()
                .find(|r| r.project_id == project_id && r.platform == platform)
                .map(|r| r.version_id)
        })
    }

    pub fn audit_log(&self) -> Vec<AuditRow> {
        self.read(|t| t.audit_log.clone())
    }

    /// Delete a version and all rows referencing it. Returns whether the
    /// version existed.
    pub fn delete_version(&self, id: VersionId) -> Result<bool> {
        self.transaction(|tx| Ok(tx.tables.delete_version(id)))
    }
}

impl Transaction<'_> {
    /// Read access to the working copy.
    pub fn tables(&self) -> &Tables {
        &*self.tables
    }

    pub fn insert_version(&mut self, new: NewVersion) -> VersionId {
        let id = self.tables.next_id();
        self.tables.versions.insert(
            id,
            VersionRow {
                id,
                created_at: Utc::now(),
                version_string: new.version_string,
                description: new.description,
                project_id: new.project_id,
                channel_id: new.channel_id,
                file_size: new.file_size,
                file_hash: new.file_hash,
                file_name: new.file_name,
                author_id: new.author_id,
                forum_sync: new.forum_sync,
                external_url: new.external_url,
            },
        );
        id
    }

    /// Insert tag rows.
    ///
    /// Platform tags are unique per (project, version string, platform); a
    /// second tag for the same triple fails the transaction.
    pub fn insert_tags(&mut self, tags: Vec<TagRow>) -> Result<()> {
        for tag in tags {
            let version = self
                .tables
                .versions
                .get(&tag.version_id)
                .ok_or(RegistryError::VersionNotFound { id: tag.version_id })?;
            if let Some(platform) = tag.platform {
                if self
                    .tables
                    .has_platform_tag(version.project_id, &version.version_string, platform)
                {
                    return Err(RegistryError::Constraint {
                        detail: format!(
                            "version '{}' of project {} already exists for {platform}",
                            version.version_string, version.project_id
                        ),
                    });
                }
            }
            self.tables.tags.push(tag);
        }
        Ok(())
    }

    pub fn insert_platform_dependencies(&mut self, rows: Vec<PlatformDependencyRow>) -> Result<()> {
        for row in &rows {
            self.require_version(row.version_id)?;
        }
        self.tables.platform_dependencies.extend(rows);
        Ok(())
    }

    pub fn insert_dependencies(&mut self, rows: Vec<DependencyRow>) -> Result<()> {
        for row in &rows {
            self.require_version(row.version_id)?;
        }
        self.tables.dependencies.extend(rows);
        Ok(())
    }

    pub(crate) fn insert_channel(
        &mut self,
        project_id: ProjectId,
        name: &str,
        color: &str,
        non_reviewed: bool,
    ) -> Channel {
        let channel = Channel {
            id: self.tables.next_id(),
            project_id,
            name: name.to_string(),
            color: color.to_string(),
            non_reviewed,
        };
        self.tables.channels.push(channel.clone());
        channel
    }

    pub(crate) fn tables_mut(&mut self) -> &mut Tables {
        &mut *self.tables
    }

    fn require_version(&self, id: VersionId) -> Result<()> {
        if self.tables.versions.contains_key(&id) {
            Ok(())
        } else {
            Err(RegistryError::VersionNotFound { id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_version(project_id: ProjectId, channel_id: u64, version: &str) -> NewVersion {
        NewVersion {
            version_string: version.to_string(),
            description: None,
            project_id,
            channel_id,
            file_size: None,
            file_hash: None,
            file_name: None,
            author_id: 1,
            forum_sync: false,
            external_url: Some("https://example.com".to_string()),
        }
    }

    fn platform_tag(version_id: VersionId, platform: Platform) -> TagRow {
        TagRow {
            version_id,
            name: platform.name().to_string(),
            data: vec![],
            color: platform.tag_color().to_string(),
            platform: Some(platform),
        }
    }

    #[test]
    fn project_starts_new_with_default_channel() {
        let store = RegistryStore::in_memory();
        let project = store.create_project("alice", "Gadget", false).unwrap();
        assert_eq!(project.visibility, Visibility::New);

        let channels = store.channels(project.id);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, DEFAULT_CHANNEL_NAME);
    }

    #[test]
    fn failed_transaction_leaves_no_rows() {
        let store = RegistryStore::in_memory();
        let project = store.create_project("alice", "Gadget", false).unwrap();
        let channel = store.channels(project.id)[0].id;

        let result: Result<()> = store.transaction(|tx| {
            tx.insert_version(new_version(project.id, channel, "1.0"));
            Err(RegistryError::Constraint {
                detail: "forced".into(),
            })
        });
        assert!(result.is_err());
        assert!(store.versions(project.id).is_empty());
    }

    #[test]
    fn platform_tag_uniqueness() {
        let store = RegistryStore::in_memory();
        let project = store.create_project("alice", "Gadget", false).unwrap();
        let channel = store.channels(project.id)[0].id;

        store
            .transaction(|tx| {
                let id = tx.insert_version(new_version(project.id, channel, "1.0"));
                tx.insert_tags(vec![platform_tag(id, Platform::Paper)])
            })
            .unwrap();

        let second = store.transaction(|tx| {
            let id = tx.insert_version(new_version(project.id, channel, "1.0"));
            tx.insert_tags(vec![
                platform_tag(id, Platform::Velocity),
                platform_tag(id, Platform::Paper),
            ])
        });
        assert!(matches!(second, Err(RegistryError::Constraint { .. })));
        assert_eq!(store.versions(project.id).len(), 1);

        // Another platform under the same version string is fine.
        store
            .transaction(|tx| {
                let id = tx.insert_version(new_version(project.id, channel, "1.0"));
                tx.insert_tags(vec![platform_tag(id, Platform::Waterfall)])
            })
            .unwrap();
        assert_eq!(store.versions(project.id).len(), 2);
    }

    #[test]
    fn delete_version_cascades() {
        let store = RegistryStore::in_memory();
        let project = store.create_project("alice", "Gadget", false).unwrap();
        let channel = store.channels(project.id)[0].id;
        let pv = store.add_platform_version(Platform::Paper, "1.21").unwrap();

        let id = store
            .transaction(|tx| {
                let id = tx.insert_version(new_version(project.id, channel, "2.0"));
                tx.insert_tags(vec![platform_tag(id, Platform::Paper)])?;
                tx.insert_platform_dependencies(vec![PlatformDependencyRow {
                    version_id: id,
                    platform_version_id: pv,
                }])?;
                tx.insert_dependencies(vec![DependencyRow {
                    version_id: id,
                    platform: Platform::Paper,
                    name: "Vault".into(),
                    required: true,
                    project_id: None,
                    external_url: None,
                }])?;
                Ok(id)
            })
            .unwrap();
        assert_eq!(
            store.platforms_for_version_string(project.id, "2.0"),
            vec![Platform::Paper]
        );

        assert!(store.delete_version(id).unwrap());
        assert!(store.versions(project.id).is_empty());
        assert!(store.tags(id).is_empty());
        assert!(store.linked_platform_versions(id).is_empty());
        assert!(store.dependencies(id).is_empty());
        assert!(store.platforms_for_version_string(project.id, "2.0").is_empty());
        assert!(!store.delete_version(id).unwrap());
    }

    #[test]
    fn child_rows_need_a_version() {
        let store = RegistryStore::in_memory();
        let result = store.transaction(|tx| {
            tx.insert_dependencies(vec![DependencyRow {
                version_id: 99,
                platform: Platform::Paper,
                name: "Vault".into(),
                required: false,
                project_id: None,
                external_url: None,
            }])
        });
        assert!(matches!(result, Err(RegistryError::VersionNotFound { id: 99 })));
    }

    #[test]
    fn add_platform_version_is_idempotent() {
        let store = RegistryStore::in_memory();
        let a = store.add_platform_version(Platform::Velocity, "3.3").unwrap();
        let b = store.add_platform_version(Platform::Velocity, "3.3").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.read(|t| t.platform_versions.len()), 1);
    }

    #[test]
    fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("registry.json");

        let project_id = {
            let store = RegistryStore::open(&path).unwrap();
            let project = store.create_project("bob", "Widget", true).unwrap();
            store.add_platform_version(Platform::Paper, "1.20").unwrap();
            project.id
        };

        let reopened = RegistryStore::open(&path).unwrap();
        let project = reopened.project(project_id).unwrap();
        assert_eq!(project.name, "Widget");
        assert!(project.forum_sync);
        assert_eq!(reopened.channels(project_id).len(), 1);
        assert_eq!(reopened.read(|t| t.platform_versions.len()), 1);

        let files: Vec<_> = std::fs::read_dir(dir.path().join("db"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("registry.json")]);
    }

    #[test]
    fn project_names_must_be_path_safe() {
        let store = RegistryStore::in_memory();
        for (owner, name) in [("..", "Gadget"), ("alice", "."), ("alice", "a/b"), ("", "x")] {
            assert!(matches!(
                store.create_project(owner, name, false),
                Err(RegistryError::InvalidName { .. })
            ));
        }
        assert!(store.read(|t| t.projects.is_empty()));
    }

    #[test]
    fn missing_project() {
        let store = RegistryStore::in_memory();
        assert!(matches!(
            store.project(7),
            Err(RegistryError::ProjectNotFound { id: 7 })
        ));
        assert!(store.set_visibility(7, Visibility::Public).is_err());
    }
}
