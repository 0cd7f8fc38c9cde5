//! rtitiles CLI - Command-line interface
//!
//! Inspects tile pyramids described by image description files and prefetches
//! their tiles.

mod commands;
mod error;
mod logging;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use commands::{fetch, plan, urls};
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "rtitiles", version, about = "Inspect and prefetch reflectance tile pyramids")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the level table of a pyramid
    Plan {
        /// Image description file (JSON)
        description: PathBuf,
    },

    /// List the resource identifiers of one level
    Urls {
        /// Image description file (JSON)
        description: PathBuf,

        /// Pyramid level (0 is the single root tile)
        #[arg(long)]
        level: usize,

        /// Only list this layer
        #[arg(long)]
        layer: Option<usize>,
    },

    /// Fetch every tile of one level and report failures
    Fetch {
        /// Image description file (JSON)
        description: PathBuf,

        /// Pyramid level (0 is the single root tile)
        #[arg(long)]
        level: usize,

        /// Texture cache size in megabytes
        #[arg(long, default_value_t = 256)]
        cache_mb: u64,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    let _log_guard = match logging::init(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => exit_with(e),
    };

    let result = match cli.command {
        Commands::Plan { description } => plan::run(plan::PlanArgs { description }),
        Commands::Urls {
            description,
            level,
            layer,
        } => urls::run(urls::UrlsArgs {
            description,
            level,
            layer,
        }),
        Commands::Fetch {
            description,
            level,
            cache_mb,
            timeout,
        } => fetch::run(fetch::FetchArgs {
            description,
            level,
            cache_mb,
            timeout,
        }),
    };

    if let Err(e) = result {
        exit_with(e);
    }
}

fn exit_with(error: CliError) -> ! {
    eprintln!("Error: {}", error);
    std::process::exit(error.exit_code());
}
