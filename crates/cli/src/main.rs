//! ctxmesh CLI — the main entry point.
//!
//! Commands:
//! - `gather`   — Gather a context bundle for a query and print it
//! - `sources`  — List sources with their enable flag and availability
//! - `config`   — Print the effective or default configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "ctxmesh",
    about = "ctxmesh — budgeted context bundles from many sources",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.ctxmesh/config.toml)
    #[arg(short, long, global = true, env = "CTXMESH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Gather context for a query
    Gather {
        /// The query to gather context for
        query: String,

        /// Token budget (default from config)
        #[arg(short, long)]
        max_tokens: Option<usize>,

        /// Only query these sources (repeatable)
        #[arg(short, long = "source", value_name = "NAME")]
        sources: Vec<String>,

        /// Skip reading files named in the query
        #[arg(long)]
        no_files: bool,

        /// Print the bundle as JSON instead of formatted text
        #[arg(long)]
        json: bool,
    },

    /// List sources and whether they are available
    Sources,

    /// Print the effective configuration as TOML
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing. Logs go to stderr so stdout stays clean for output.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    if let Commands::Config { default: true } = cli.command {
        commands::config_cmd::print_default();
        return Ok(());
    }

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Gather {
            query,
            max_tokens,
            sources,
            no_files,
            json,
        } => {
            let args = commands::gather::GatherArgs {
                query,
                max_tokens,
                sources,
                no_files,
                json,
            };
            commands::gather::run(&config, args).await?
        }
        Commands::Sources => commands::sources::run(&config).await?,
        Commands::Config { .. } => commands::config_cmd::print_effective(&config)?,
    }

    Ok(())
}
