//! plugyard CLI: stage and publish plugin versions against a local registry.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use plugyard_core::{Platform, ProjectId, Uploader, UserId};

#[derive(Parser)]
#[command(name = "plugyard", version, about = "Plugin version registry")]
struct Cli {
    /// Registry data directory
    #[arg(long, global = true, default_value = ".plugyard")]
    data_dir: PathBuf,
    /// Configuration file (default: <data-dir>/plugyard.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },
    /// Manage the platform version catalog
    Platform {
        #[command(subcommand)]
        action: PlatformAction,
    },
    /// Stage a plugin archive and print the pending version as JSON
    Stage {
        /// Project id
        project: ProjectId,
        /// Archive to upload (.jar or .zip)
        file: PathBuf,
        #[command(flatten)]
        uploader: UploaderArgs,
        /// Write the pending version here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Draft a version hosted at an external URL
    StageUrl {
        /// Project id
        project: ProjectId,
        /// Download URL
        url: String,
        /// Write the pending version here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Publish a pending version
    Publish {
        /// Project id
        project: ProjectId,
        /// Pending version JSON produced by `stage` or `stage-url`
        pending: PathBuf,
        #[command(flatten)]
        uploader: UploaderArgs,
        #[command(flatten)]
        overrides: PublishOverrides,
    },
    /// List committed versions of a project
    Versions {
        /// Project id
        project: ProjectId,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Create a project
    Create {
        /// Owner name
        owner: String,
        /// Project name
        name: String,
        /// Mirror new versions to the project's forum thread
        #[arg(long)]
        forum_sync: bool,
    },
    /// List all projects
    List,
    /// Summarize projects and versions per owner
    Authors,
}

#[derive(Subcommand)]
enum PlatformAction {
    /// Add versions of a platform to the catalog
    Add {
        /// Platform (paper, waterfall, velocity)
        platform: Platform,
        /// Platform versions
        #[arg(required = true)]
        versions: Vec<String>,
    },
    /// List catalog entries
    List {
        /// Only this platform
        platform: Option<Platform>,
    },
}

#[derive(Args)]
struct UploaderArgs {
    /// Uploading user name
    #[arg(long)]
    user: String,
    /// Uploading user id
    #[arg(long, default_value_t = 1)]
    user_id: UserId,
}

impl UploaderArgs {
    fn uploader(&self) -> Uploader {
        Uploader::new(self.user_id, self.user.clone())
    }
}

/// Edits applied to a pending version before publishing.
#[derive(Args, Default)]
pub(crate) struct PublishOverrides {
    /// Version string (required for external versions)
    #[arg(long = "version-string")]
    pub version: Option<String>,
    /// Release channel name
    #[arg(long)]
    pub channel: Option<String>,
    /// Release channel color
    #[arg(long)]
    pub channel_color: Option<String>,
    /// Release channel skips review
    #[arg(long)]
    pub non_reviewed: bool,
    /// Platform versions for external drafts, as `platform:version`
    #[arg(long = "platform")]
    pub platforms: Vec<String>,
    /// Tag the version as unstable
    #[arg(long)]
    pub unstable: bool,
    /// Mark the version recommended on its platforms
    #[arg(long)]
    pub recommended: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "plugyard=debug,plugyard_registry=debug"
    } else {
        "plugyard=info,plugyard_registry=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli
        .config
        .unwrap_or_else(|| cli.data_dir.join(commands::CONFIG_FILE));
    let registry = commands::open_registry(&cli.data_dir, &config_path)?;

    match cli.command {
        Commands::Project { action } => match action {
            ProjectAction::Create {
                owner,
                name,
                forum_sync,
            } => commands::project::create(&registry, &owner, &name, forum_sync),
            ProjectAction::List => commands::project::list(&registry),
            ProjectAction::Authors => commands::project::authors(&registry),
        },

        Commands::Platform { action } => match action {
            PlatformAction::Add { platform, versions } => {
                commands::platform::add(&registry, platform, &versions)
            }
            PlatformAction::List { platform } => commands::platform::list(&registry, platform),
        },

        Commands::Stage {
            project,
            file,
            uploader,
            out,
        } => commands::version::stage(
            &registry,
            project,
            &uploader.uploader(),
            &file,
            out.as_deref(),
        ),

        Commands::StageUrl { project, url, out } => {
            commands::version::stage_url(&registry, project, &url, out.as_deref())
        }

        Commands::Publish {
            project,
            pending,
            uploader,
            overrides,
        } => commands::version::publish(
            &registry,
            project,
            &uploader.uploader(),
            &pending,
            &overrides,
        ),

        Commands::Versions { project } => commands::version::list(&registry, project),
    }
}
