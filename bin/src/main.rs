//! candela CLI - Tick-to-OHLCV candle aggregation service.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod display;

#[derive(Parser)]
#[command(name = "candela")]
#[command(about = "Tick-to-OHLCV candle aggregation service", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the service with the tick simulator feeding it
    Run {
        /// TOML configuration file. Defaults to built-in settings.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// SQLite database path. Defaults to the platform data directory.
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Query persisted candles
    History {
        /// Trading symbol (e.g., BTC-USD)
        symbol: String,

        /// Candle interval (e.g., 1m, 1h)
        interval: String,

        /// Range start, epoch seconds (inclusive)
        #[arg(long)]
        from: i64,

        /// Range end, epoch seconds (inclusive)
        #[arg(long)]
        to: i64,

        /// SQLite database path. Defaults to the platform data directory.
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// List supported candle intervals
    Intervals,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    // RUST_LOG overrides the flags
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    init_tracing(cli.verbose, cli.quiet);

    match command {
        Commands::Run {
            config,
            database,
            duration,
        } => commands::run::run(config, database, duration).await,
        Commands::History {
            symbol,
            interval,
            from,
            to,
            database,
        } => commands::history::history(&symbol, &interval, from, to, database),
        Commands::Intervals => {
            commands::intervals::list_intervals();
            Ok(())
        }
    }
}
