//! `plugyard project`: create and list projects.

use anyhow::{Context, Result};
use plugyard_registry::Registry;

/// Run `plugyard project create <owner> <name>`.
pub fn create(registry: &Registry, owner: &str, name: &str, forum_sync: bool) -> Result<()> {
    let project = registry
        .store
        .create_project(owner, name, forum_sync)
        .with_context(|| format!("creating project {owner}/{name}"))?;
    println!(
        "Created project {}/{} (id {})",
        project.owner_name, project.name, project.id
    );
    Ok(())
}

/// Run `plugyard project list`.
pub fn list(registry: &Registry) -> Result<()> {
    let projects = registry.store.read(|t| t.projects.values().cloned().collect::<Vec<_>>());
    if projects.is_empty() {
        println!("No projects.");
        return Ok(());
    }
    for project in projects {
        println!(
            "  {:<6} {:<30} {}",
            project.id,
            format!("{}/{}", project.owner_name, project.name),
            project.visibility
        );
    }
    Ok(())
}

/// Run `plugyard project authors`.
pub fn authors(registry: &Registry) -> Result<()> {
    for author in registry.views.authors().iter() {
        println!(
            "  {:<20} {} project(s), {} version(s)",
            author.owner_name, author.project_count, author.version_count
        );
    }
    Ok(())
}
