//! PyPack Mirror CLI application
//!
//! Command-line interface for running the caching mirror and administering
//! its local artifact tree.

use std::process;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use pypack_mirror::cli::{handle_config, handle_files, handle_project, handle_serve, Cli, Commands};
use pypack_mirror::config::AppConfig;
use pypack_mirror::errors::Result;

#[tokio::main]
async fn main() {
    // Initialize program
    let result = run().await;

    // Handle any errors that occurred
    if let Err(e) = result {
        // Logging may not be initialised yet, so report on stderr only
        eprintln!("{}", e.report());
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    // Parse command line arguments
    let cli = Cli::parse_args();

    let mut config = AppConfig::load(cli.global.config.clone()).await?;
    if let Some(storage) = &cli.global.storage {
        config.mirror.storage_path = Some(storage.clone());
    }

    // Initialize logging based on verbosity
    init_logging(&cli, &config);

    info!("PyPack Mirror v{} starting", env!("CARGO_PKG_VERSION"));

    // Execute the appropriate command
    match cli.command {
        Commands::Serve(args) => {
            info!("Executing serve command");
            handle_serve(args, config).await
        }
        Commands::Project(args) => handle_project(args, &config).await,
        Commands::Files(args) => handle_files(args, &config).await,
        Commands::Config(args) => handle_config(args, &config).await,
    }
}

/// Initialize logging based on CLI verbosity settings and the config file
fn init_logging(cli: &Cli, config: &AppConfig) {
    let log_level = cli.log_level(&config.logging.level);

    // Create environment filter
    let mut filter = EnvFilter::from_default_env();
    for target in ["pypack_mirror", "tower_http"] {
        match format!("{}={}", target, log_level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring invalid log level {:?}: {}", log_level, e),
        }
    }

    // Initialize subscriber
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose) // Show levels only in very verbose mode
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
