//! Command-line interface components
//!
//! This module contains CLI-specific code for PyPack Mirror, including
//! argument parsing and the command handlers.

pub mod args;
pub mod commands;

pub use args::{
    Cli, Commands, ConfigAction, ConfigArgs, FilesAction, FilesArgs, GlobalArgs, ProjectAction,
    ProjectArgs, ServeArgs,
};
pub use commands::{handle_config, handle_files, handle_project, handle_serve, upload_files};
