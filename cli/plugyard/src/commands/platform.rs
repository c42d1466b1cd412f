//! `plugyard platform`: maintain the platform version catalog.

use anyhow::{Context, Result};
use plugyard_core::Platform;
use plugyard_registry::{PlatformCatalog, Registry};

/// Run `plugyard platform add <platform> <version>...`.
pub fn add(registry: &Registry, platform: Platform, versions: &[String]) -> Result<()> {
    for version in versions {
        registry
            .store
            .add_platform_version(platform, version)
            .with_context(|| format!("adding {platform} {version}"))?;
        println!("Added {platform} {version}");
    }
    Ok(())
}

/// Run `plugyard platform list [<platform>]`.
pub fn list(registry: &Registry, only: Option<Platform>) -> Result<()> {
    let platforms: Vec<Platform> = match only {
        Some(platform) => vec![platform],
        None => Platform::ALL.to_vec(),
    };
    for platform in platforms {
        let versions = registry.store.versions_for_platform(platform)?;
        let versions: Vec<&str> = versions.iter().map(String::as_str).collect();
        println!("  {:<10} {}", platform.name(), versions.join(", "));
    }
    Ok(())
}
