//! Version-name collision checks.

use std::collections::BTreeSet;
use std::sync::Arc;

use plugyard_core::{Platform, ProjectId};

use crate::store::RegistryStore;

/// Answers whether a version string is already taken on any of a set of
/// platforms within a project.
#[derive(Debug, Clone)]
pub struct DuplicateDetector {
    store: Arc<RegistryStore>,
}

impl DuplicateDetector {
    pub fn new(store: Arc<RegistryStore>) -> Self {
        DuplicateDetector { store }
    }

    /// True iff a committed version of `project_id` named `version_string`
    /// is linked to at least one platform in `platforms`.
    pub fn exists(
        &self,
        project_id: ProjectId,
        version_string: &str,
        platforms: &BTreeSet<Platform>,
    ) -> bool {
        if platforms.is_empty() {
            return false;
        }
        self.store
            .platforms_for_version_string(project_id, version_string)
            .iter()
            .any(|p| platforms.contains(p))
    }
}
