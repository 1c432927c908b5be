use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::perf_type::PerfType;

/// Default config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "rating_candles.toml";

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the config file (rating_candles.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Build the daily candle series and print the path of the CSV file
    Fetch {
        /// Player handle (e.g. "german11")
        #[arg(short, long)]
        user: String,

        /// Rating category: bullet, blitz, rapid, classical, ...
        #[arg(short, long, default_value = "blitz")]
        perf: PerfType,

        /// Maximum number of games to fetch, newest first
        #[arg(long)]
        max: Option<u32>,

        /// Refetch even if a stored series exists
        #[arg(long)]
        update: bool,
    },

    /// Print a stored series
    Show {
        #[arg(short, long)]
        user: String,

        #[arg(short, long, default_value = "blitz")]
        perf: PerfType,

        /// Only the most recent N days
        #[arg(long)]
        last: Option<usize>,
    },
}
