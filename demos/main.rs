use clap::{Parser, Subcommand};
use log::info;
use reef::config::{Config, ConfigError};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reef")]
#[command(about = "An async RESP client library for single-node, replicated, and clustered Redis deployments")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an example configuration file
    Config {
        /// Topology mode (standalone, replicated, or cluster)
        #[arg(short, long)]
        mode: String,
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Config { mode, output } => generate_config(mode, output)?,
        Commands::Validate { config } => validate_config(config)?,
        Commands::Version => show_version(),
    }

    Ok(())
}

fn generate_config(mode: String, output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("Generating {} configuration file: {:?}", mode, output);

    Config::create_example_config(&output, &mode)
        .map_err(|e| format!("Failed to generate config: {}", e))?;

    println!("Configuration file generated successfully!");
    println!("Edit the file to match your environment and load it with Config::load_from_file.");

    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration file: {:?}", config_path);

    match Config::load_from_file(&config_path) {
        Ok(config) => {
            println!("Configuration file is valid");
            println!("  Topology: {:?}", config.topology);
            println!("  Operation timeout: {}ms", config.client.operation_timeout_ms);
            println!("  Lock validity: {}s", config.lock.validity_sec);
        }
        Err(e) => {
            eprintln!("Configuration file validation failed:");
            match &e {
                ConfigError::IoError(msg) => eprintln!("  File error: {}", msg),
                ConfigError::ParseError(msg) => eprintln!("  Parse error: {}", msg),
                ConfigError::ValidationError(msg) => eprintln!("  Validation error: {}", msg),
                ConfigError::SerializeError(msg) => eprintln!("  Serialization error: {}", msg),
            }
            return Err(Box::new(e));
        }
    }

    Ok(())
}

fn show_version() {
    println!("reef v{}", env!("CARGO_PKG_VERSION"));
    println!("An async RESP client library for single-node, replicated, and clustered Redis deployments");
    println!();
    println!("Topologies:");
    println!("  - standalone: a single Redis node");
    println!("  - replicated: a master with read-only slaves");
    println!("  - cluster: Redis Cluster with MOVED/ASK-aware slot routing");
}

fn init_logging() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    info!("reef CLI starting");
}
