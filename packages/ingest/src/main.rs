#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the popular taxi destinations pipeline.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use taxi_dest_cli_utils::IndicatifProgress;
use taxi_dest_history_models::{GapPolicy, Period};
use taxi_dest_ingest::config::PipelineConfig;
use taxi_dest_ingest::{Pipeline, load_regions, open_store};
use taxi_dest_ingest_models::RunSummary;
use taxi_dest_ranking_models::{DestinationRank, Granularity};

#[derive(Parser)]
#[command(
    name = "taxi_dest_ingest",
    about = "Ranks popular taxi destinations per zone and borough"
)]
struct Cli {
    /// TOML config file (overrides `TAXI_DEST_CONFIG`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// `DuckDB` database file (overrides config and `TAXI_DEST_DATABASE`)
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one month of trips and update the ranking tables
    Run {
        /// Trip CSV for the month (e.g. "2009-11.csv")
        input: PathBuf,
        /// Number of destinations to keep per origin
        #[arg(value_name = "K")]
        top_k: u32,
        /// Taxi zone `GeoJSON` file
        #[arg(long)]
        regions: Option<PathBuf>,
        /// Month being processed, as YYYY-MM (defaults to the one in the file name)
        #[arg(long)]
        period: Option<Period>,
        /// First month of history, as YYYY-MM
        #[arg(long)]
        history_start: Option<Period>,
        /// What to do when the previous month was never processed ("fail" or "bootstrap")
        #[arg(long)]
        on_gap: Option<GapPolicy>,
        /// Reject the file on the first malformed row
        #[arg(long)]
        strict: bool,
        /// Maximum number of trip rows to read
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Show the current ranking table ("zone" or "borough")
    Current { granularity: Granularity },
    /// Show recorded history ("zone" or "borough")
    History {
        granularity: Granularity,
        /// Only show rows recorded for this month
        #[arg(long)]
        period: Option<Period>,
    },
    /// List processed months
    Periods,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = taxi_dest_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }

    match cli.command {
        Commands::Run {
            input,
            top_k,
            regions,
            period,
            history_start,
            on_gap,
            strict,
            limit,
        } => {
            if let Some(regions) = regions {
                config.regions_path = regions;
            }
            if let Some(history_start) = history_start {
                config.history_start = history_start;
            }
            if let Some(on_gap) = on_gap {
                config.on_gap = on_gap;
            }
            config.strict |= strict;
            if limit.is_some() {
                config.limit = limit;
            }

            let index = load_regions(&config)?;
            let mut store = open_store(&config)?;
            let progress = IndicatifProgress::trips_bar(&multi, "Attributing trips");

            let summary = Pipeline::new(&config, &index, &mut store)
                .with_progress(progress)
                .run_file(&input, period, top_k)?;

            if cli.json {
                print_json(&summary)?;
            } else {
                print_summary(&summary);
            }
        }
        Commands::Current { granularity } => {
            let store = open_store(&config)?;
            let rows = store.current(granularity)?;
            if cli.json {
                print_json(&rows)?;
            } else {
                print_ranks(&rows);
            }
        }
        Commands::History {
            granularity,
            period,
        } => {
            let store = open_store(&config)?;
            let entries = store.history(granularity, period)?;
            if cli.json {
                print_json(&entries)?;
            } else {
                println!(
                    "{:<8} {:<32} {:<32} RANK",
                    "PERIOD", "ORIGIN", "DESTINATION"
                );
                println!("{}", "-".repeat(80));
                for entry in &entries {
                    println!(
                        "{:<8} {:<32} {:<32} {}",
                        entry.period,
                        entry.origin,
                        entry.destination,
                        entry.rank
                    );
                }
            }
        }
        Commands::Periods => {
            let store = open_store(&config)?;
            let periods = store.recorded_periods()?;
            if cli.json {
                print_json(&periods)?;
            } else {
                println!("{:<8} {:<12} RECORDED AT", "PERIOD", "MODE");
                println!("{}", "-".repeat(44));
                for recorded in &periods {
                    println!(
                        "{:<8} {:<12} {}",
                        recorded.period,
                        recorded.mode,
                        recorded.recorded_at
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_ranks(rows: &[DestinationRank]) {
    println!("{:<32} {:<32} RANK", "ORIGIN", "DESTINATION");
    println!("{}", "-".repeat(72));
    for row in rows {
        println!("{:<32} {:<32} {}", row.origin, row.destination, row.rank);
    }
}

fn print_summary(summary: &RunSummary) {
    println!("Period:       {} ({})", summary.period, summary.mode.label());
    println!("Top K:        {}", summary.top_k);
    println!(
        "Trips:        {} read, {} attributed, {} unattributed, {} malformed",
        summary.trips_read,
        summary.trips_attributed,
        summary.trips_unattributed(),
        summary.malformed
    );
    println!();
    println!(
        "{:<10} {:>8} {:>10} {:>10}  MODE",
        "TABLE", "ORIGINS", "CURRENT", "HISTORY"
    );
    println!("{}", "-".repeat(50));
    for table in &summary.tables {
        println!(
            "{:<10} {:>8} {:>10} {:>10}  {}",
            table.granularity.as_ref(),
            table.origins,
            table.current_rows,
            table.history_rows,
            table.write_mode
        );
    }
    println!();
    println!("Done in {:.1}s", summary.duration.as_secs_f64());
}
