//! `plugyard stage`, `stage-url`, `publish` and `versions`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use plugyard_core::{PendingVersion, Platform, ProjectId, Uploader};
use plugyard_registry::Registry;

use crate::PublishOverrides;

/// Run `plugyard stage <project> <file>`.
pub fn stage(
    registry: &Registry,
    project: ProjectId,
    uploader: &Uploader,
    file: &Path,
    out: Option<&Path>,
) -> Result<()> {
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid file name: {}", file.display()))?;
    let mut reader = BufReader::new(
        File::open(file).with_context(|| format!("opening {}", file.display()))?,
    );
    let pending = registry
        .builder
        .stage_upload(project, uploader, file_name, &mut reader)
        .with_context(|| format!("staging {file_name}"))?;
    write_pending(&pending, out)
}

/// Run `plugyard stage-url <project> <url>`.
pub fn stage_url(
    registry: &Registry,
    project: ProjectId,
    url: &str,
    out: Option<&Path>,
) -> Result<()> {
    let pending = registry.builder.stage_url(project, url)?;
    write_pending(&pending, out)
}

/// Run `plugyard publish <project> <pending.json>`.
pub fn publish(
    registry: &Registry,
    project: ProjectId,
    uploader: &Uploader,
    pending_path: &Path,
    overrides: &PublishOverrides,
) -> Result<()> {
    let content = std::fs::read_to_string(pending_path)
        .with_context(|| format!("reading {}", pending_path.display()))?;
    let mut pending: PendingVersion = serde_json::from_str(&content)
        .with_context(|| format!("parsing {}", pending_path.display()))?;
    apply_overrides(&mut pending, overrides)?;

    let published = registry
        .pipeline
        .publish(project, uploader, &pending)
        .with_context(|| format!("publishing version '{}'", pending.version_string))?;

    println!(
        "Published {} (id {})",
        published.version.version_string, published.version.id
    );
    for path in &published.artifact_paths {
        println!("  {}", path.display());
    }
    Ok(())
}

/// Run `plugyard versions <project>`.
pub fn list(registry: &Registry, project: ProjectId) -> Result<()> {
    registry.store.project(project)?;
    let versions = registry.store.versions(project);
    if versions.is_empty() {
        println!("No versions.");
        return Ok(());
    }
    for version in versions {
        let tags: Vec<String> = registry
            .store
            .tags(version.id)
            .into_iter()
            .map(|tag| {
                if tag.data.is_empty() {
                    tag.name
                } else {
                    format!("{} {}", tag.name, tag.data.join("/"))
                }
            })
            .collect();
        let source = match (&version.file_name, &version.external_url) {
            (Some(name), _) => name.clone(),
            (None, Some(url)) => url.clone(),
            (None, None) => String::new(),
        };
        println!(
            "  {:<16} {:<20} [{}] {}",
            version.version_string,
            version.created_at.format("%Y-%m-%d %H:%M"),
            tags.join(", "),
            source
        );
    }
    Ok(())
}

fn write_pending(pending: &PendingVersion, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(pending)?;
    match out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            println!("Pending version written to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn apply_overrides(pending: &mut PendingVersion, overrides: &PublishOverrides) -> Result<()> {
    if let Some(version) = &overrides.version {
        pending.version_string = version.clone();
    }
    if let Some(channel) = &overrides.channel {
        pending.channel.name = channel.clone();
    }
    if let Some(color) = &overrides.channel_color {
        pending.channel.color = color.clone();
    }
    pending.channel.non_reviewed |= overrides.non_reviewed;
    for entry in &overrides.platforms {
        let Some((platform, version)) = entry.split_once(':') else {
            bail!("expected platform:version, got '{entry}'");
        };
        let platform: Platform = platform.parse()?;
        pending
            .platform_dependencies
            .entry(platform)
            .or_default()
            .insert(version.trim().to_string());
    }
    pending.unstable |= overrides.unstable;
    pending.recommended |= overrides.recommended;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugyard_core::ChannelRef;

    fn draft() -> PendingVersion {
        PendingVersion::external(
            "https://example.com/w.jar",
            ChannelRef {
                name: "Release".into(),
                color: "#009600".into(),
                non_reviewed: false,
            },
            false,
        )
    }

    #[test]
    fn overrides_edit_the_draft() {
        let mut pending = draft();
        let overrides = PublishOverrides {
            version: Some("1.2".into()),
            channel: Some("Beta".into()),
            platforms: vec!["paper:1.20".into(), "Paper: 1.21".into()],
            recommended: true,
            ..PublishOverrides::default()
        };
        apply_overrides(&mut pending, &overrides).unwrap();

        assert_eq!(pending.version_string, "1.2");
        assert_eq!(pending.channel.name, "Beta");
        assert_eq!(pending.channel.color, "#009600");
        assert_eq!(pending.platform_dependencies[&Platform::Paper].len(), 2);
        assert!(pending.recommended);
        assert!(!pending.unstable);
    }

    #[test]
    fn malformed_platform_override() {
        let mut pending = draft();
        let overrides = PublishOverrides {
            platforms: vec!["paper".into()],
            ..PublishOverrides::default()
        };
        assert!(apply_overrides(&mut pending, &overrides).is_err());

        let overrides = PublishOverrides {
            platforms: vec!["bukkit:1.8".into()],
            ..PublishOverrides::default()
        };
        assert!(apply_overrides(&mut pending, &overrides).is_err());
    }
}
