//! One pipeline run: load, attribute, rank, reconcile, commit.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use taxi_dest_database::{DestinationStore, RunWrite, TableWrite};
use taxi_dest_history::{period_from_path, plan, reconcile};
use taxi_dest_history_models::{HistoryDelta, Period, ReconcileMode};
use taxi_dest_ingest_models::progress::{ProgressCallback, null_progress};
use taxi_dest_ingest_models::{GranularitySummary, RunSummary};
use taxi_dest_ranking::rank;
use taxi_dest_ranking_models::{Granularity, RankedDestination, RankingSpec};
use taxi_dest_spatial::RegionIndex;
use taxi_dest_trip::enrich::{EnrichmentStats, enrich};
use taxi_dest_trip::load::LoadedTrips;
use taxi_dest_trip_models::{EnrichedTrip, TripRecord};

use crate::PipelineError;
use crate::config::PipelineConfig;

/// Trips attributed between progress updates.
const PROGRESS_BATCH: u64 = 10_000;

/// Runs months through the pipeline against one region index and store.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    index: &'a RegionIndex,
    store: &'a mut DestinationStore,
    progress: Arc<dyn ProgressCallback>,
}

/// One granularity's ranking and the history rows reconciled from it.
struct TableResult {
    granularity: Granularity,
    ranked: Vec<RankedDestination>,
    delta: HistoryDelta,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline that reports no progress.
    #[must_use]
    pub fn new(
        config: &'a PipelineConfig,
        index: &'a RegionIndex,
        store: &'a mut DestinationStore,
    ) -> Self {
        Self {
            config,
            index,
            store,
            progress: null_progress(),
        }
    }

    /// Reports attribution progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Decides how `period` is reconciled, consulting the store's ledger
    /// for the preceding month.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the period precedes the history start,
    /// if the previous month is missing under the fail policy, or if the
    /// store cannot be queried.
    pub fn plan(&self, period: Period) -> Result<ReconcileMode, PipelineError> {
        let previous_recorded = self.store.is_recorded(period.previous())?;
        Ok(plan(
            period,
            self.config.history_start,
            previous_recorded,
            self.config.on_gap,
        )?)
    }

    /// Processes one monthly trip file.
    ///
    /// The period is taken from `period` or, when `None`, from the last
    /// `YYYY-MM` in the file name. Planning happens before the file is read,
    /// so a continuity gap fails without parsing any trips.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the period cannot be determined or
    /// planned, the file cannot be loaded, or the commit fails.
    pub fn run_file(
        &mut self,
        input: &Path,
        period: Option<Period>,
        top_k: u32,
    ) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();
        let period = match period {
            Some(period) => period,
            None => period_from_path(input)?,
        };
        log::info!("Processing {} as {period} (top {top_k})", input.display());

        let mode = self.plan(period)?;
        let loaded = self.config.trip_loader()?.read_path(input)?;
        self.execute(period, mode, loaded, top_k, start)
    }

    /// Processes trips that are already in memory.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if planning or the commit fails.
    pub fn run_trips(
        &mut self,
        period: Period,
        loaded: LoadedTrips,
        top_k: u32,
    ) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();
        let mode = self.plan(period)?;
        self.execute(period, mode, loaded, top_k, start)
    }

    fn execute(
        &mut self,
        period: Period,
        mode: ReconcileMode,
        loaded: LoadedTrips,
        top_k: u32,
        start: Instant,
    ) -> Result<RunSummary, PipelineError> {
        log::info!("{period}: {}", describe(mode));

        let LoadedTrips { trips, malformed } = loaded;
        let trips_read = trips.len() as u64;
        let (enriched, stats) = self.attribute(trips);

        let mut results = Vec::with_capacity(Granularity::ALL.len());
        for granularity in Granularity::ALL {
            let ranked = rank(&enriched, RankingSpec::for_granularity(granularity, top_k));
            let prior = match mode {
                ReconcileMode::Bootstrap => Vec::new(),
                ReconcileMode::Incremental { previous } => {
                    self.store.history_rows(granularity, previous)?
                }
            };
            let delta = reconcile(period, mode, &ranked, &prior);
            results.push(TableResult {
                granularity,
                ranked,
                delta,
            });
        }

        self.store.commit_run(&RunWrite {
            period,
            mode,
            tables: results
                .iter()
                .map(|r| TableWrite {
                    granularity: r.granularity,
                    current: &r.ranked,
                    history: &r.delta,
                })
                .collect(),
        })?;

        let summary = RunSummary {
            period,
            mode,
            top_k,
            trips_read,
            malformed,
            trips_attributed: stats.kept,
            origin_misses: stats.origin_misses,
            destination_misses: stats.destination_misses,
            tables: results.iter().map(TableResult::summary).collect(),
            duration: start.elapsed(),
        };

        log::info!(
            "{period}: {} trips, {} attributed, {} malformed, done in {:.1}s",
            summary.trips_read,
            summary.trips_attributed,
            summary.malformed,
            summary.duration.as_secs_f64()
        );

        Ok(summary)
    }

    fn attribute(
        &self,
        trips: Vec<TripRecord>,
    ) -> (Vec<EnrichedTrip<'a>>, EnrichmentStats) {
        self.progress.set_total(trips.len() as u64);
        self.progress.set_message("Attributing trips".to_string());

        let mut iter = enrich(trips, self.index);
        let mut enriched = Vec::new();
        let mut reported = 0;

        while let Some(trip) = iter.next() {
            enriched.push(trip);
            let seen = iter.stats().seen;
            if seen - reported >= PROGRESS_BATCH {
                self.progress.inc(seen - reported);
                reported = seen;
            }
        }

        let stats = iter.stats();
        self.progress.inc(stats.seen - reported);
        self.progress.finish(format!(
            "Attributed {} of {} trips",
            stats.kept, stats.seen
        ));

        if stats.dropped() > 0 {
            log::warn!(
                "Dropped {} trips outside every zone ({} pick-ups, {} drop-offs unattributed)",
                stats.dropped(),
                stats.origin_misses,
                stats.destination_misses
            );
        }

        (enriched, stats)
    }
}

impl TableResult {
    fn summary(&self) -> GranularitySummary {
        let origins: BTreeSet<&str> = self.ranked.iter().map(|r| r.origin.as_str()).collect();
        GranularitySummary {
            granularity: self.granularity,
            origins: origins.len(),
            current_rows: self.ranked.len(),
            history_rows: self.delta.entries.len(),
            write_mode: self.delta.write_mode,
        }
    }
}

fn describe(mode: ReconcileMode) -> String {
    match mode {
        ReconcileMode::Bootstrap => "bootstrapping history".to_string(),
        ReconcileMode::Incremental { previous } => format!("comparing against {previous}"),
    }
}
