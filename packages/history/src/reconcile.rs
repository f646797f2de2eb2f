//! Bootstrap/incremental planning and row reconciliation.

use std::collections::BTreeSet;

use taxi_dest_history_models::{GapPolicy, HistoryDelta, HistoryEntry, Period, ReconcileMode};
use taxi_dest_ranking_models::{DestinationRank, RankedDestination};

use crate::HistoryError;

/// Decides how `period` is reconciled.
///
/// `previous_recorded` says whether the month before `period` has been
/// committed to the store.
///
/// # Errors
///
/// Returns [`HistoryError::BeforeHistoryStart`] if `period` precedes
/// `start`, or [`HistoryError::ContinuityGap`] if the previous month is
/// missing and `on_gap` is [`GapPolicy::Fail`].
pub fn plan(
    period: Period,
    start: Period,
    previous_recorded: bool,
    on_gap: GapPolicy,
) -> Result<ReconcileMode, HistoryError> {
    if period == start {
        return Ok(ReconcileMode::Bootstrap);
    }
    if period < start {
        return Err(HistoryError::BeforeHistoryStart { period, start });
    }

    let previous = period.previous();
    if previous_recorded {
        return Ok(ReconcileMode::Incremental { previous });
    }

    match on_gap {
        GapPolicy::Fail => Err(HistoryError::ContinuityGap { period, previous }),
        GapPolicy::Bootstrap => {
            log::warn!("No history recorded for {previous}; restarting history at {period}");
            Ok(ReconcileMode::Bootstrap)
        }
    }
}

/// Computes the history rows to record for `period`.
///
/// In bootstrap mode every current row is returned for a full replace. In
/// incremental mode a current row is dropped when `prior` holds the same
/// (origin, destination, rank) tuple; all other current rows are returned
/// for appending. Rows only present in `prior` are superseded, not
/// retracted, so they produce nothing.
#[must_use]
pub fn reconcile(
    period: Period,
    mode: ReconcileMode,
    current: &[RankedDestination],
    prior: &[DestinationRank],
) -> HistoryDelta {
    let entries: Vec<HistoryEntry> = match mode {
        ReconcileMode::Bootstrap => current
            .iter()
            .map(|row| HistoryEntry::new(period, row.to_rank()))
            .collect(),
        ReconcileMode::Incremental { previous } => {
            let unchanged: BTreeSet<&DestinationRank> = prior.iter().collect();
            let entries: Vec<HistoryEntry> = current
                .iter()
                .map(RankedDestination::to_rank)
                .filter(|row| !unchanged.contains(row))
                .map(|row| HistoryEntry::new(period, row))
                .collect();
            log::debug!(
                "{period}: {} of {} rows changed since {previous}",
                entries.len(),
                current.len()
            );
            entries
        }
    };

    HistoryDelta {
        write_mode: mode.write_mode(),
        entries,
    }
}
