//! Period resolution from input file names.
//!
//! Monthly trip dumps are named after the month they cover, either bare
//! (`2009-11.csv`) or with a prefix (`yellow_tripdata_2009-11.csv`). The
//! last `YYYY-MM` occurrence in the file stem is taken as the period.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use taxi_dest_history_models::Period;

use crate::HistoryError;

static PERIOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{4})-([0-9]{2})").expect("valid regex"));

/// Derives the period from a file name or stem.
///
/// # Errors
///
/// Returns [`HistoryError::UnknownPeriod`] if the name contains no
/// `YYYY-MM` sequence, or [`HistoryError::InvalidPeriod`] if the last one is
/// not a real month.
pub fn period_from_name(name: &str) -> Result<Period, HistoryError> {
    let captures = PERIOD_RE
        .captures_iter(name)
        .last()
        .ok_or_else(|| HistoryError::UnknownPeriod {
            name: name.to_string(),
        })?;

    Ok(captures[0].parse::<Period>()?)
}

/// Derives the period from the stem of an input path.
///
/// # Errors
///
/// See [`period_from_name`].
pub fn period_from_path(path: &Path) -> Result<Period, HistoryError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .ok_or_else(|| HistoryError::UnknownPeriod {
            name: path.display().to_string(),
        })?;

    let period = period_from_name(&stem)?;
    log::debug!("Resolved period {period} from {}", path.display());
    Ok(period)
}
