//! Command handlers for PyPack Mirror CLI
//!
//! This module implements the command handlers that connect CLI arguments
//! with the server and the artifact store.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncReadExt;
use tracing::{debug, info};

use crate::app::client::UpstreamClient;
use crate::app::store::{format_binary_size, ArtifactStore};
use crate::cli::{
    ConfigAction, ConfigArgs, FilesAction, FilesArgs, ProjectAction, ProjectArgs, ServeArgs,
};
use crate::config::AppConfig;
use crate::constants::files;
use crate::errors::{AppError, Result, StorageError};
use crate::server::{self, AppState};

/// Handle the serve command
///
/// Validates the configuration, opens the storage root and runs the HTTP
/// server until interrupted.
pub async fn handle_serve(args: ServeArgs, mut config: AppConfig) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(index_url) = args.index_url {
        config.mirror.index_url = Some(index_url);
    }
    if let Some(project_url) = args.project_url {
        config.mirror.project_url = Some(project_url);
    }

    let settings = config.server_settings()?;
    let client = UpstreamClient::new(&config.client_config()?)?;
    let store = ArtifactStore::open(&settings.storage_path).await?;
    let state = AppState::new(store, client, settings.project_url);

    println!("🚀 Serving {} on http://{}", settings.storage_path.display(), settings.listen);
    server::serve(settings.listen, state).await
}

/// Handle project management commands
pub async fn handle_project(args: ProjectArgs, config: &AppConfig) -> Result<()> {
    let store = ArtifactStore::open(config.storage_root()?).await?;

    match args.action {
        ProjectAction::List => {
            let projects = store.list_projects().await?;
            if projects.is_empty() {
                println!("ℹ️  No projects in {}", store.root().display());
            }
            for project in projects {
                println!("{project}");
            }
            Ok(())
        }
        ProjectAction::Create { name } => {
            store.create_project(&name).await?;
            println!("✅ Created project {name}");
            Ok(())
        }
        ProjectAction::Delete { name, yes } => {
            if !yes && !confirm(&format!("Delete project {name} and all of its files?"))? {
                println!("Cancelled");
                return Ok(());
            }
            store.delete_project(&name).await?;
            println!("🗑️  Deleted project {name}");
            Ok(())
        }
    }
}

/// Handle artifact management commands
pub async fn handle_files(args: FilesArgs, config: &AppConfig) -> Result<()> {
    let store = ArtifactStore::open(config.storage_root()?).await?;

    match args.action {
        FilesAction::List { project, json } => list_files(&store, &project, json).await,
        FilesAction::Upload { project, files } => {
            let names = FilesAction::validate_upload(&project, &files).map_err(AppError::generic)?;
            let start = Instant::now();
            let uploaded = upload_files(&store, &project, &files, &names, true).await?;

            println!("📦 Uploaded {} file(s) to {project}:", uploaded.len());
            for upload in &uploaded {
                println!(
                    "  {} ({}) sha256={}",
                    upload.filename,
                    format_binary_size(upload.size),
                    upload.digest
                );
            }
            debug!("Upload took {:?}", start.elapsed());
            Ok(())
        }
        FilesAction::Remove { project, filenames } => {
            for filename in &filenames {
                store.delete_artifact(&project, filename).await?;
                println!("🗑️  Removed {project}/{filename}");
            }
            Ok(())
        }
    }
}

async fn list_files(store: &ArtifactStore, project: &str, json: bool) -> Result<()> {
    let artifacts = store.list_artifacts(project).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&artifacts)
            .map_err(|e| AppError::generic(format!("Failed to render JSON: {e}")))?;
        println!("{rendered}");
        return Ok(());
    }

    if artifacts.is_empty() {
        println!("ℹ️  No files in project {project}");
        return Ok(());
    }

    let name_width = artifacts
        .iter()
        .map(|a| a.filename.len())
        .max()
        .unwrap_or(0)
        .max("File".len());
    println!("{:<name_width$}  {:>10}  {:<19}  SHA256", "File", "Size", "Modified");
    println!("{}", "─".repeat(name_width + 2 + 10 + 2 + 19 + 2 + 8));
    for artifact in &artifacts {
        println!(
            "{:<name_width$}  {:>10}  {:<19}  {}",
            artifact.filename,
            artifact.human_size(),
            artifact.modified.format("%Y-%m-%d %H:%M:%S"),
            artifact.digest.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// One uploaded artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub filename: String,
    pub size: u64,
    pub digest: String,
}

/// Copy local files into a project, writing a digest sidecar for each
///
/// Each file is streamed through a scoped writer while being hashed, so an
/// interrupted upload leaves no partial artifact behind.
///
/// # Arguments
///
/// * `store` - Destination store
/// * `project` - Destination project
/// * `files` - Local source files
/// * `names` - Artifact filenames, one per source file
/// * `show_progress` - Draw a progress bar on the terminal
pub async fn upload_files(
    store: &ArtifactStore,
    project: &str,
    files: &[PathBuf],
    names: &[String],
    show_progress: bool,
) -> Result<Vec<UploadedFile>> {
    let mut total = 0;
    for path in files {
        total += tokio::fs::metadata(path)
            .await
            .map_err(|e| StorageError::io(path, e))?
            .len();
    }

    let progress = if show_progress {
        ProgressBar::new(total)
    } else {
        ProgressBar::hidden()
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
            .map_err(|e| AppError::generic(format!("Progress bar template error: {e}")))?
            .progress_chars("##-"),
    );

    let mut uploaded = Vec::with_capacity(files.len());
    for (path, filename) in files.iter().zip(names) {
        progress.set_message(filename.clone());
        let upload = upload_one(store, project, path, filename, &progress).await?;
        info!(
            "Uploaded {}/{} ({} bytes, sha256 {})",
            project, upload.filename, upload.size, upload.digest
        );
        uploaded.push(upload);
    }
    progress.finish_and_clear();
    Ok(uploaded)
}

async fn upload_one(
    store: &ArtifactStore,
    project: &str,
    path: &Path,
    filename: &str,
    progress: &ProgressBar,
) -> Result<UploadedFile> {
    let mut source = tokio::fs::File::open(path)
        .await
        .map_err(|e| StorageError::io(path, e))?;
    let mut writer = store.open_for_write(project, filename).await?;
    let mut digest = store.digest_writer();

    let mut buf = vec![0u8; files::CHUNK_SIZE];
    loop {
        let read = source
            .read(&mut buf)
            .await
            .map_err(|e| StorageError::io(path, e))?;
        if read == 0 {
            break;
        }
        writer.write_chunk(&buf[..read]).await?;
        digest.update(&buf[..read]);
        progress.inc(read as u64);
    }

    let size = writer.commit().await?;
    let digest = digest.finalize_hex();
    store.write_digest(project, filename, &digest).await?;

    Ok(UploadedFile {
        filename: filename.to_string(),
        size,
        digest,
    })
}

/// Handle configuration commands
pub async fn handle_config(args: ConfigArgs, config: &AppConfig) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            print!("{}", config.to_display_toml()?);
            Ok(())
        }
        ConfigAction::Init { path, force } => {
            let written = AppConfig::write_default(path, force).await?;
            println!("📁 Created default configuration file:");
            println!("   {}", written.display());
            println!("   You can customize settings by editing this file.");
            Ok(())
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N]: ");
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase().starts_with('y'))
}
