//! Memoized listings built from the store.
//!
//! The home page lists public projects and the authors page summarizes
//! every owner. Both are computed on first access and kept until a new
//! version is published.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use plugyard_core::{Project, Visibility};

use crate::error::Result;
use crate::providers::CacheInvalidator;
use crate::store::RegistryStore;

/// One row of the authors listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorSummary {
    pub owner_name: String,
    pub project_count: usize,
    pub version_count: usize,
}

#[derive(Debug)]
pub struct ViewCache {
    store: Arc<RegistryStore>,
    home: Mutex<Option<Arc<Vec<Project>>>>,
    authors: Mutex<Option<Arc<Vec<AuthorSummary>>>>,
}

impl ViewCache {
    pub fn new(store: Arc<RegistryStore>) -> Self {
        ViewCache {
            store,
            home: Mutex::new(None),
            authors: Mutex::new(None),
        }
    }

    /// Public projects, ordered by id.
    pub fn home_projects(&self) -> Arc<Vec<Project>> {
        let mut slot = self.home.lock();
        if let Some(cached) = slot.as_ref() {
            return cached.clone();
        }
        let projects: Vec<Project> = self.store.read(|t| {
            t.projects
                .values()
                .filter(|p| p.visibility == Visibility::Public)
                .cloned()
                .collect()
        });
        let projects = Arc::new(projects);
        *slot = Some(projects.clone());
        projects
    }

    /// Per-owner project and version counts, ordered by owner name.
    pub fn authors(&self) -> Arc<Vec<AuthorSummary>> {
        let mut slot = self.authors.lock();
        if let Some(cached) = slot.as_ref() {
            return cached.clone();
        }
        let summaries = self.store.read(|t| {
            let mut by_owner: BTreeMap<&str, AuthorSummary> = BTreeMap::new();
            for project in t.projects.values() {
                let entry = by_owner
                    .entry(project.owner_name.as_str())
                    .or_insert_with(|| AuthorSummary {
                        owner_name: project.owner_name.clone(),
                        project_count: 0,
                        version_count: 0,
                    });
                entry.project_count += 1;
                entry.version_count += t
                    .versions
                    .values()
                    .filter(|v| v.project_id == project.id)
                    .count();
            }
            by_owner.into_values().collect::<Vec<_>>()
        });
        let summaries = Arc::new(summaries);
        *slot = Some(summaries.clone());
        summaries
    }

    /// Whether either listing is currently cached.
    pub fn is_warm(&self) -> bool {
        self.home.lock().is_some() || self.authors.lock().is_some()
    }
}

impl CacheInvalidator for ViewCache {
    fn invalidate(&self) -> Result<()> {
        *self.home.lock() = None;
        *self.authors.lock() = None;
        debug!("listing caches cleared");
        Ok(())
    }
}
