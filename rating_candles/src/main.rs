use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use rating_candles::{
    board::{RatingBoard, RunOptions},
    cli::commands::{Cli, Commands, DEFAULT_CONFIG_FILE},
    config::{AppConfig, load_config_path},
    io::sink::{CsvSink, DataSink, SeriesKey},
    logging,
    models::series::Series,
};

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => load_config_path(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => load_config_path(DEFAULT_CONFIG_FILE),
        None => Ok(AppConfig::default()),
    }
}

fn print_series(series: &Series, last: Option<usize>) {
    let skip = last.map_or(0, |n| series.len().saturating_sub(n));
    println!(
        "{:<10}  {:>6}  {:>6}  {:>6}  {:>6}  {:>6}",
        "Datetime", "Open", "High", "Low", "Close", "Volume"
    );
    for bar in series.iter().skip(skip) {
        println!(
            "{:<10}  {:>6}  {:>6}  {:>6}  {:>6}  {:>6}",
            bar.date().to_string(),
            bar.open(),
            bar.high(),
            bar.low(),
            bar.close(),
            bar.volume()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // LICHESS_TOKEN may live in a .env file in the working directory.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    logging::init(&config.logging)?;

    let sink = CsvSink::new(&config.storage.data_dir);

    match cli.command {
        Commands::Fetch {
            user,
            perf,
            max,
            update,
        } => {
            let provider = config.build_provider()?;
            let board = RatingBoard::new(provider, sink, config.time_zone()?);
            let opts = RunOptions {
                user,
                perf_type: perf,
                max,
                update,
            };

            let outcome = board
                .build_series(&opts)
                .await
                .with_context(|| format!("build {perf} series for {}", opts.user))?;

            let path = board
                .sink()
                .path_for(&SeriesKey::new(opts.user.clone(), perf));
            println!("{}", path.display());

            // Summary to stderr so it doesn't interfere with machine parsing of the path
            eprintln!(
                "SUMMARY: {} days stored, {} games fetched, {} days rebuilt{}",
                outcome.series.len(),
                outcome.games,
                outcome.days,
                if outcome.saved.is_none() { " (reused stored series)" } else { "" }
            );
        }

        Commands::Show { user, perf, last } => {
            let key = SeriesKey::new(user, perf);
            let mut series = sink
                .read(&key)
                .await
                .with_context(|| format!("read {}", sink.path_for(&key).display()))?;
            if series.is_empty() {
                eprintln!("No stored series at {}", sink.path_for(&key).display());
                return Ok(());
            }
            series.finalize_order();
            print_series(&series, last);
        }
    }

    Ok(())
}
