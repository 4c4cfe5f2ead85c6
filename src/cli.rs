use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::{status_path_for, ClientConfig, FolderSourceKind, ProjectConfig};
use crate::server_client::SyncApi;
use crate::sync::{FolderSource, LocalFolderSource, OrchestratorOptions, SyncOrchestrator, SyncStats};
use crate::types::SyncError;

#[derive(Debug, Parser)]
#[command(name = "photo-sync", version, about = "Watch local folders and upload new photos")]
pub struct Cli {
    /// Path to config.json (defaults to $PHOTO_SYNC_CONFIG or ~/.photo-sync/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the server URL (and optional token) in the config file
    Setup {
        #[arg(long)]
        server_url: String,
        #[arg(long)]
        token: Option<String>,
    },
    /// Map a project to a local folder
    AddProject {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        folder: PathBuf,
        /// Keep the project configured but do not watch it
        #[arg(long)]
        inactive: bool,
    },
    /// Forget a configured project
    RemoveProject { id: String },
    /// List configured projects
    List,
    /// Show configuration and the last status written by `start`
    Status,
    /// Watch folders and upload new files until interrupted
    Start {
        /// Watch the projects from the config file instead of asking the server
        #[arg(long)]
        local: bool,
    },
}

impl Cli {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(ClientConfig::default_path)
    }
}

pub async fn run(cli: Cli) -> Result<(), SyncError> {
    let config_path = cli.config_path();
    match cli.command {
        Command::Setup { server_url, token } => setup(&config_path, server_url, token).await,
        Command::AddProject {
            id,
            name,
            folder,
            inactive,
        } => add_project(&config_path, id, name, folder, !inactive).await,
        Command::RemoveProject { id } => remove_project(&config_path, &id).await,
        Command::List => list(&config_path).await,
        Command::Status => status(&config_path).await,
        Command::Start { local } => start(&config_path, local).await,
    }
}

pub async fn setup(
    config_path: &Path,
    server_url: String,
    token: Option<String>,
) -> Result<(), SyncError> {
    let server_url = server_url.trim().trim_end_matches('/').to_string();
    if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
        return Err(SyncError::Config(format!(
            "server URL must start with http:// or https://, got {server_url:?}"
        )));
    }

    let mut config = ClientConfig::try_load(config_path).await?;
    config.server_url = Some(server_url.clone());
    if token.is_some() {
        config.auth_token = token;
    }
    config.save(config_path)?;
    println!("Server set to {server_url} ({})", config_path.display());
    Ok(())
}

pub async fn add_project(
    config_path: &Path,
    id: String,
    name: String,
    folder: PathBuf,
    active: bool,
) -> Result<(), SyncError> {
    let folder_path = std::fs::canonicalize(&folder).map_err(|err| {
        SyncError::Config(format!("folder {} is not accessible: {err}", folder.display()))
    })?;
    if !folder_path.is_dir() {
        return Err(SyncError::Config(format!(
            "{} is not a directory",
            folder_path.display()
        )));
    }

    let mut config = ClientConfig::try_load(config_path).await?;
    let replaced = config.upsert_project(ProjectConfig {
        id: id.clone(),
        name,
        folder_path: folder_path.clone(),
        active,
    });
    config.save(config_path)?;
    let verb = if replaced { "Updated" } else { "Added" };
    println!("{verb} project {id} -> {}", folder_path.display());
    Ok(())
}

pub async fn remove_project(config_path: &Path, id: &str) -> Result<(), SyncError> {
    let mut config = ClientConfig::try_load(config_path).await?;
    let removed = config
        .remove_project(id)
        .ok_or_else(|| SyncError::Config(format!("no project with id {id}")))?;
    config.save(config_path)?;
    println!("Removed project {} ({})", removed.id, removed.name);
    Ok(())
}

pub async fn list(config_path: &Path) -> Result<(), SyncError> {
    let config = ClientConfig::load_or_default(config_path).await;
    if config.projects.is_empty() {
        println!("No projects configured. Use `photo-sync add-project` to add one.");
        return Ok(());
    }
    for project in &config.projects {
        let marker = if project.active { "active" } else { "inactive" };
        println!(
            "{}  {}  {}  [{marker}]",
            project.id,
            project.name,
            project.folder_path.display()
        );
    }
    Ok(())
}

pub async fn status(config_path: &Path) -> Result<(), SyncError> {
    let config = ClientConfig::load_or_default(config_path).await;
    println!("Config:   {}", config_path.display());
    println!(
        "Server:   {}",
        config.server_url.as_deref().unwrap_or("(auto-detect)")
    );
    println!(
        "Projects: {} configured, {} active",
        config.projects.len(),
        config.projects.iter().filter(|p| p.active).count()
    );

    match SyncStats::read_from(&status_path_for(config_path)).await {
        Ok(Some(stats)) => {
            println!("Watching: {} project(s)", stats.watched_projects);
            println!(
                "Files:    {} detected, {} uploaded, {} failed, {} duplicate events skipped",
                stats.detected, stats.uploaded, stats.failed, stats.skipped_duplicates
            );
            if let Some(url) = &stats.server_url {
                println!("Using:    {url}");
            }
            if let Some(at) = stats.last_poll_at {
                println!("Polled:   {}", at.to_rfc3339());
            }
            if let Some(err) = &stats.last_poll_error {
                println!("Poll err: {err}");
            }
        }
        Ok(None) => println!("Status:   no sync has run yet"),
        Err(err) => warn!(error = %err, "Failed to read status file"),
    }
    Ok(())
}

/// Run the sync loop until Ctrl-C or SIGTERM. Config errors are fatal.
pub async fn start(config_path: &Path, force_local: bool) -> Result<(), SyncError> {
    let config = ClientConfig::try_load(config_path).await?;
    let mut options = OrchestratorOptions::from(&config.settings);
    options.status_path = Some(status_path_for(config_path));

    let (api, located) = SyncApi::discover(&config).await?;
    if !located.is_fallback() && api.health().await {
        info!(url = %api.base_url(), "Server healthy");
    }
    let api = Arc::new(api);

    let local = force_local || config.settings.folder_source == FolderSourceKind::Local;
    let source: Arc<dyn FolderSource> = if local {
        info!(path = %config_path.display(), "Using projects from local config");
        Arc::new(LocalFolderSource::new(config_path))
    } else {
        api.clone()
    };

    let mut orchestrator =
        SyncOrchestrator::new(source, api.clone(), options).with_server_url(api.base_url());
    orchestrator.run_until(shutdown_signal()).await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
