//! CLU Extract CLI
//!
//! Downloads Common Land Unit polygons for an area of interest.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::{FormatArg, StrategyArg};
use commands::config::ConfigCommands;
use commands::extract::ExtractArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "cluextract")]
#[command(version = cluextract::VERSION)]
#[command(about = "Download Common Land Unit polygons for an area of interest", long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file with default settings
    Init,

    /// View or change configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Download the features inside an area of interest
    Extract {
        /// AOI file (GeoJSON, Esri JSON polygon or feature set)
        aoi: PathBuf,

        /// Output directory (default: output.directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Token sent with every query
        #[arg(long)]
        token: Option<String>,

        /// Portal user; the password is read from CLUEXTRACT_PASSWORD
        #[arg(short, long)]
        username: Option<String>,

        /// Feature layer URL
        #[arg(long)]
        layer_url: Option<String>,

        /// Requests fetched concurrently
        #[arg(short, long)]
        parallel: Option<usize>,

        /// HTTP timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Seconds to wait before resending a failed query
        #[arg(long)]
        retry_delay: Option<u64>,

        /// How oversized regions are split
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Divisor for the first split of the AOI
        #[arg(long)]
        split_margin: Option<u64>,

        /// Keep features that do not intersect the AOI
        #[arg(long)]
        keep_outside: bool,
    },

    /// Print the number of features inside an area of interest
    Count {
        /// AOI file (GeoJSON, Esri JSON polygon or feature set)
        aoi: PathBuf,

        /// Token sent with the query
        #[arg(long)]
        token: Option<String>,

        /// Portal user; the password is read from CLUEXTRACT_PASSWORD
        #[arg(short, long)]
        username: Option<String>,

        /// Feature layer URL
        #[arg(long)]
        layer_url: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Config { command } => commands::config::run(command),
        Commands::Extract {
            aoi,
            output,
            format,
            token,
            username,
            layer_url,
            parallel,
            timeout,
            retry_delay,
            strategy,
            split_margin,
            keep_outside,
        } => commands::extract::run(
            ExtractArgs {
                aoi,
                output,
                format,
                token,
                username,
                layer_url,
                parallel,
                timeout,
                retry_delay,
                strategy,
                split_margin,
                keep_outside,
            },
            cli.verbose,
        ),
        Commands::Count {
            aoi,
            token,
            username,
            layer_url,
        } => commands::count::run(aoi, token, username, layer_url, cli.verbose),
    }
}
