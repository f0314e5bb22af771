//! Command-line argument parsing for PyPack Mirror
//!
//! This module defines the CLI structure using clap derive macros: the
//! mirror server itself plus the administrative operations on the local
//! artifact tree and the configuration file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// PyPack Mirror - caching mirror for Python package indexes
#[derive(Parser, Debug)]
#[command(
    name = "pypack_mirror",
    version,
    about = "Caching mirror for PyPI-style simple indexes",
    long_about = "Serves a simple index that merges locally stored artifacts with a live upstream index.
Artifacts are downloaded from their origin on first request and served from local storage afterwards."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Artifact storage root (overrides the config file)
    #[arg(long, global = true, value_name = "DIR")]
    pub storage: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the mirror server
    Serve(ServeArgs),

    /// Manage project directories
    Project(ProjectArgs),

    /// Manage the artifacts of a project
    Files(FilesArgs),

    /// Show or create the configuration file
    Config(ConfigArgs),
}

/// Arguments for the serve command
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Listen host (overrides the config file)
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port (overrides the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Upstream simple index URL, or "false" to serve local artifacts only
    #[arg(long, value_name = "URL")]
    pub index_url: Option<String>,

    /// Project home page template containing {}
    #[arg(long, value_name = "TEMPLATE")]
    pub project_url: Option<String>,
}

/// Arguments for project management
#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub action: ProjectAction,
}

/// Project management actions
#[derive(Subcommand, Debug)]
pub enum ProjectAction {
    /// List stored projects
    List,

    /// Create an empty project directory
    Create {
        /// Project name
        name: String,
    },

    /// Delete a project with all of its artifacts
    Delete {
        /// Project name
        name: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for artifact management
#[derive(Args, Debug)]
pub struct FilesArgs {
    #[command(subcommand)]
    pub action: FilesAction,
}

/// Artifact management actions
#[derive(Subcommand, Debug)]
pub enum FilesAction {
    /// List the artifacts of a project
    List {
        /// Project name
        project: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Upload local files into a project
    Upload {
        /// Project name
        project: String,

        /// Files to upload; every name must start with "<project>-"
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// Remove artifacts (and their digest sidecars) from a project
    Remove {
        /// Project name
        project: String,

        /// Artifact filenames
        #[arg(required = true, value_name = "FILENAME")]
        filenames: Vec<String>,
    },
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Write a commented default configuration file
    Init {
        /// Destination (defaults to the user config directory)
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level, falling back to the configured one
    pub fn log_level(&self, configured: &str) -> String {
        if self.global.quiet {
            "error".to_string()
        } else if self.global.very_verbose {
            "debug".to_string()
        } else if self.global.verbose {
            "info".to_string()
        } else {
            configured.to_string()
        }
    }
}

impl FilesAction {
    /// Check upload filenames before anything is written
    ///
    /// Every file must have a name starting with `<project>-`; a single
    /// mismatch cancels the whole upload.
    pub fn validate_upload(project: &str, files: &[PathBuf]) -> Result<Vec<String>, String> {
        let prefix = format!("{project}-");
        files
            .iter()
            .map(|path| {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| format!("{} has no usable file name", path.display()))?;
                if name.starts_with(&prefix) {
                    Ok(name.to_string())
                } else {
                    Err(format!(
                        "{name} does not start with \"{prefix}\"; upload cancelled"
                    ))
                }
            })
            .collect()
    }
}
