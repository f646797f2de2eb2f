//! Current and historical ranking tables plus the processed-period ledger.

use std::path::Path;

use duckdb::Connection;
use serde::{Deserialize, Serialize};
use taxi_dest_history_models::{HistoryDelta, HistoryEntry, Period, ReconcileMode, WriteMode};
use taxi_dest_ranking_models::{DestinationRank, Granularity, RankedDestination};

use crate::DbError;

/// A committed run, as recorded in the `processed_periods` ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedPeriod {
    /// The month that was processed.
    pub period: Period,
    /// `bootstrap` or `incremental`.
    pub mode: String,
    /// UTC commit time.
    pub recorded_at: String,
}

/// Rows to write for one granularity.
#[derive(Debug, Clone, Copy)]
pub struct TableWrite<'a> {
    /// Which pair of tables is written.
    pub granularity: Granularity,
    /// The full ranking; replaces the `current_*` table.
    pub current: &'a [RankedDestination],
    /// Reconciled rows for the `history_*` table.
    pub history: &'a HistoryDelta,
}

/// Everything one pipeline run commits.
#[derive(Debug, Clone)]
pub struct RunWrite<'a> {
    /// The processed month.
    pub period: Period,
    /// How the month was reconciled.
    pub mode: ReconcileMode,
    /// One entry per granularity.
    pub tables: Vec<TableWrite<'a>>,
}

/// `DuckDB`-backed store for destination rankings.
pub struct DestinationStore {
    conn: Connection,
}

impl DestinationStore {
    /// Opens (or creates) the store at `path` and ensures the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the parent directory cannot be created or the
    /// database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            crate::paths::ensure_dir(parent)?;
        }
        log::debug!("Opening destination store at {}", path.display());
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if `DuckDB` fails to start.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DbError> {
        create_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Returns `true` if `period` has a committed run.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn is_recorded(&self, period: Period) -> Result<bool, DbError> {
        let mut stmt = self
            .conn
            .prepare(r#"SELECT COUNT(*) FROM processed_periods WHERE "period" = ?"#)?;
        let count: i64 = stmt.query_row(duckdb::params![period.to_string()], |row| row.get(0))?;
        Ok(count > 0)
    }

    /// Lists committed runs in period order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a stored period is invalid.
    pub fn recorded_periods(&self) -> Result<Vec<RecordedPeriod>, DbError> {
        let mut stmt = self.conn.prepare(
            r#"SELECT "period", mode, CAST(recorded_at AS VARCHAR)
               FROM processed_periods
               ORDER BY "period""#,
        )?;
        let mut rows = stmt.query([])?;

        let mut periods = Vec::new();
        while let Some(row) = rows.next()? {
            periods.push(RecordedPeriod {
                period: parse_period(&row.get::<_, String>(0)?)?,
                mode: row.get(1)?,
                recorded_at: row.get(2)?,
            });
        }
        Ok(periods)
    }

    /// Reads the `current_*` table for `granularity`, ordered by origin then
    /// rank.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn current(&self, granularity: Granularity) -> Result<Vec<DestinationRank>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            r#"SELECT origin_label, destination_label, "rank"
               FROM {}
               ORDER BY origin_label, "rank""#,
            current_table(granularity)
        ))?;
        let mut rows = stmt.query([])?;

        let mut ranks = Vec::new();
        while let Some(row) = rows.next()? {
            ranks.push(DestinationRank {
                origin: row.get(0)?,
                destination: row.get(1)?,
                rank: to_rank(row.get(2)?)?,
            });
        }
        Ok(ranks)
    }

    /// Reads the history rows recorded for exactly `period`.
    ///
    /// These are the rows an incremental run compares against.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub fn history_rows(
        &self,
        granularity: Granularity,
        period: Period,
    ) -> Result<Vec<DestinationRank>, DbError> {
        Ok(self
            .history(granularity, Some(period))?
            .iter()
            .map(HistoryEntry::to_rank)
            .collect())
    }

    /// Reads the `history_*` table, optionally restricted to one period.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails or a stored period is invalid.
    pub fn history(
        &self,
        granularity: Granularity,
        period: Option<Period>,
    ) -> Result<Vec<HistoryEntry>, DbError> {
        let filter = if period.is_some() {
            r#"WHERE "period" = ?"#
        } else {
            ""
        };
        let mut stmt = self.conn.prepare(&format!(
            r#"SELECT "period", origin_label, destination_label, "rank"
               FROM {} {filter}
               ORDER BY "period", origin_label, "rank""#,
            history_table(granularity)
        ))?;
        let params: Vec<String> = period.iter().map(ToString::to_string).collect();
        let mut rows = stmt.query(duckdb::params_from_iter(params))?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(HistoryEntry {
                period: parse_period(&row.get::<_, String>(0)?)?,
                origin: row.get(1)?,
                destination: row.get(2)?,
                rank: to_rank(row.get(3)?)?,
            });
        }
        Ok(entries)
    }

    /// Commits a run in one transaction.
    ///
    /// Every `current_*` table named in `run` is replaced, history is
    /// replaced or appended per each delta's write mode, and the period is
    /// written to the ledger. History rows already stored for `run.period`
    /// are removed first, so committing the same month twice leaves one copy.
    /// A bootstrap run also clears the ledger. On any error nothing is
    /// written.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if any statement fails; the transaction is rolled
    /// back.
    pub fn commit_run(&mut self, run: &RunWrite<'_>) -> Result<(), DbError> {
        let period = run.period.to_string();
        let tx = self.conn.transaction()?;

        if run.mode == ReconcileMode::Bootstrap {
            tx.execute("DELETE FROM processed_periods", [])?;
        }

        for table in &run.tables {
            replace_current(&tx, table.granularity, table.current)?;
            write_history(&tx, table.granularity, &period, table.history)?;
            log::info!(
                "{period} {}: {} current rows, {} history rows ({})",
                table.granularity,
                table.current.len(),
                table.history.entries.len(),
                table.history.write_mode,
            );
        }

        tx.execute(
            r#"DELETE FROM processed_periods WHERE "period" = ?"#,
            duckdb::params![period],
        )?;
        let recorded_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        tx.execute(
            r#"INSERT INTO processed_periods ("period", mode, recorded_at) VALUES (?, ?, ?)"#,
            duckdb::params![period, run.mode.label(), recorded_at],
        )?;

        tx.commit()?;
        log::info!("Committed {period} ({})", run.mode.label());
        Ok(())
    }
}

fn current_table(granularity: Granularity) -> String {
    format!("current_{}_destinations", granularity.as_ref())
}

fn history_table(granularity: Granularity) -> String {
    format!("history_{}_destinations", granularity.as_ref())
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    for granularity in Granularity::ALL {
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {current} (
                origin_label TEXT NOT NULL,
                destination_label TEXT NOT NULL,
                "rank" BIGINT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS {history} (
                "period" TEXT NOT NULL,
                origin_label TEXT NOT NULL,
                destination_label TEXT NOT NULL,
                "rank" BIGINT NOT NULL
            );
            "#,
            current = current_table(granularity),
            history = history_table(granularity),
        ))?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS processed_periods (
            "period" TEXT NOT NULL,
            mode TEXT NOT NULL,
            recorded_at TIMESTAMP NOT NULL
        );
        "#,
    )?;

    Ok(())
}

fn replace_current(
    conn: &Connection,
    granularity: Granularity,
    rows: &[RankedDestination],
) -> Result<(), DbError> {
    let table = current_table(granularity);
    conn.execute(&format!("DELETE FROM {table}"), [])?;

    let mut stmt = conn.prepare(&format!(
        r#"INSERT INTO {table} (origin_label, destination_label, "rank") VALUES (?, ?, ?)"#
    ))?;
    for row in rows {
        stmt.execute(duckdb::params![row.origin, row.destination, i64::from(row.rank)])?;
    }
    Ok(())
}

fn write_history(
    conn: &Connection,
    granularity: Granularity,
    period: &str,
    delta: &HistoryDelta,
) -> Result<(), DbError> {
    let table = history_table(granularity);
    match delta.write_mode {
        WriteMode::Replace => {
            conn.execute(&format!("DELETE FROM {table}"), [])?;
        }
        WriteMode::Append => {
            conn.execute(
                &format!(r#"DELETE FROM {table} WHERE "period" = ?"#),
                duckdb::params![period],
            )?;
        }
    }

    let mut stmt = conn.prepare(&format!(
        r#"INSERT INTO {table} ("period", origin_label, destination_label, "rank")
           VALUES (?, ?, ?, ?)"#
    ))?;
    for entry in &delta.entries {
        stmt.execute(duckdb::params![
            entry.period.to_string(),
            entry.origin,
            entry.destination,
            i64::from(entry.rank),
        ])?;
    }
    Ok(())
}

fn to_rank(value: i64) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|_| DbError::Conversion {
        message: format!("rank {value} out of range"),
    })
}

fn parse_period(value: &str) -> Result<Period, DbError> {
    value.parse().map_err(|e| DbError::Conversion {
        message: format!("{e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(s: &str) -> Period {
        s.parse().unwrap()
    }

    fn ranked(origin: &str, destination: &str, rank: u32) -> RankedDestination {
        RankedDestination {
            origin: origin.to_string(),
            destination: destination.to_string(),
            rank,
            metric: 1.0,
        }
    }

    fn delta(period: Period, write_mode: WriteMode, rows: &[RankedDestination]) -> HistoryDelta {
        HistoryDelta {
            write_mode,
            entries: rows
                .iter()
                .map(|row| HistoryEntry::new(period, row.to_rank()))
                .collect(),
        }
    }

    fn commit(
        store: &mut DestinationStore,
        period: Period,
        mode: ReconcileMode,
        zone: &[RankedDestination],
        zone_history: &[RankedDestination],
    ) -> Result<(), DbError> {
        let zone_delta = delta(period, mode.write_mode(), zone_history);
        let borough_delta = delta(period, mode.write_mode(), &[]);
        store.commit_run(&RunWrite {
            period,
            mode,
            tables: vec![
                TableWrite {
                    granularity: Granularity::Zone,
                    current: zone,
                    history: &zone_delta,
                },
                TableWrite {
                    granularity: Granularity::Borough,
                    current: &[],
                    history: &borough_delta,
                },
            ],
        })
    }

    #[test]
    fn fresh_store_is_empty() {
        let store = DestinationStore::open_in_memory().unwrap();
        for granularity in Granularity::ALL {
            assert!(store.current(granularity).unwrap().is_empty());
            assert!(store.history(granularity, None).unwrap().is_empty());
        }
        assert!(store.recorded_periods().unwrap().is_empty());
        assert!(!store.is_recorded(period("2009-11")).unwrap());
    }

    #[test]
    fn bootstrap_writes_current_history_and_ledger() {
        let mut store = DestinationStore::open_in_memory().unwrap();
        let nov = period("2009-11");
        let rows = vec![ranked("A", "C", 2), ranked("A", "B", 1)];

        commit(&mut store, nov, ReconcileMode::Bootstrap, &rows, &rows).unwrap();

        assert_eq!(
            store.current(Granularity::Zone).unwrap(),
            vec![DestinationRank::new("A", "B", 1), DestinationRank::new("A", "C", 2)]
        );
        assert_eq!(
            store.history_rows(Granularity::Zone, nov).unwrap(),
            vec![DestinationRank::new("A", "B", 1), DestinationRank::new("A", "C", 2)]
        );
        assert!(store.is_recorded(nov).unwrap());

        let ledger = store.recorded_periods().unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].period, nov);
        assert_eq!(ledger[0].mode, "bootstrap");
    }

    #[test]
    fn incremental_appends_and_replaces_current() {
        let mut store = DestinationStore::open_in_memory().unwrap();
        let nov = period("2009-11");
        let dec = period("2009-12");
        let first = vec![ranked("A", "B", 1)];
        commit(&mut store, nov, ReconcileMode::Bootstrap, &first, &first).unwrap();

        let second = vec![ranked("A", "B", 1), ranked("A", "C", 2)];
        let changed = vec![ranked("A", "C", 2)];
        commit(
            &mut store,
            dec,
            ReconcileMode::Incremental { previous: nov },
            &second,
            &changed,
        )
        .unwrap();

        assert_eq!(store.current(Granularity::Zone).unwrap().len(), 2);
        assert_eq!(store.history(Granularity::Zone, None).unwrap().len(), 2);
        assert_eq!(
            store.history_rows(Granularity::Zone, dec).unwrap(),
            vec![DestinationRank::new("A", "C", 2)]
        );
        assert_eq!(
            store.history_rows(Granularity::Zone, nov).unwrap(),
            vec![DestinationRank::new("A", "B", 1)]
        );

        let modes: Vec<String> = store
            .recorded_periods()
            .unwrap()
            .into_iter()
            .map(|p| p.mode)
            .collect();
        assert_eq!(modes, vec!["bootstrap", "incremental"]);
    }

    #[test]
    fn rerunning_a_period_does_not_duplicate_history() {
        let mut store = DestinationStore::open_in_memory().unwrap();
        let nov = period("2009-11");
        let dec = period("2009-12");
        let first = vec![ranked("A", "B", 1)];
        commit(&mut store, nov, ReconcileMode::Bootstrap, &first, &first).unwrap();

        let changed = vec![ranked("A", "C", 1)];
        let mode = ReconcileMode::Incremental { previous: nov };
        commit(&mut store, dec, mode, &changed, &changed).unwrap();
        commit(&mut store, dec, mode, &changed, &changed).unwrap();

        assert_eq!(store.history_rows(Granularity::Zone, dec).unwrap().len(), 1);
        assert_eq!(store.history(Granularity::Zone, None).unwrap().len(), 2);
        assert_eq!(store.recorded_periods().unwrap().len(), 2);
    }

    #[test]
    fn bootstrap_resets_history_and_ledger() {
        let mut store = DestinationStore::open_in_memory().unwrap();
        let nov = period("2009-11");
        let dec = period("2009-12");
        let first = vec![ranked("A", "B", 1)];
        commit(&mut store, nov, ReconcileMode::Bootstrap, &first, &first).unwrap();
        commit(
            &mut store,
            dec,
            ReconcileMode::Incremental { previous: nov },
            &first,
            &[],
        )
        .unwrap();

        let restart = period("2010-03");
        let rows = vec![ranked("Q", "R", 1)];
        commit(&mut store, restart, ReconcileMode::Bootstrap, &rows, &rows).unwrap();

        let history = store.history(Granularity::Zone, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].period, restart);
        assert!(!store.is_recorded(nov).unwrap());
        assert!(store.is_recorded(restart).unwrap());
    }

    #[test]
    fn failed_commit_leaves_store_untouched() {
        let mut store = DestinationStore::open_in_memory().unwrap();
        let nov = period("2009-11");
        let first = vec![ranked("A", "B", 1)];
        commit(&mut store, nov, ReconcileMode::Bootstrap, &first, &first).unwrap();

        store
            .conn
            .execute_batch("DROP TABLE history_borough_destinations")
            .unwrap();

        let rows = vec![ranked("X", "Y", 1)];
        let result = commit(
            &mut store,
            period("2009-12"),
            ReconcileMode::Incremental { previous: nov },
            &rows,
            &rows,
        );
        assert!(result.is_err());

        assert_eq!(
            store.current(Granularity::Zone).unwrap(),
            vec![DestinationRank::new("A", "B", 1)]
        );
        assert!(!store.is_recorded(period("2009-12")).unwrap());
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = std::env::temp_dir().join(format!("taxi_dest_store_{}", std::process::id()));
        let path = dir.join("nested").join("store.duckdb");

        {
            let store = DestinationStore::open(&path).unwrap();
            assert!(store.recorded_periods().unwrap().is_empty());
        }
        assert!(path.exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
