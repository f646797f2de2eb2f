//! Pipeline configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables. The CLI applies its flags on top of the result.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use taxi_dest_history_models::{GapPolicy, Period};
use taxi_dest_spatial::LabelProperties;
use taxi_dest_trip::load::{TripColumns, TripLoader};

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV: &str = "TAXI_DEST_CONFIG";

/// Environment variable overriding the database path.
pub const DATABASE_ENV: &str = "TAXI_DEST_DATABASE";

/// Environment variable overriding the region `GeoJSON` path.
pub const REGIONS_ENV: &str = "TAXI_DEST_REGIONS";

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`PipelineConfig`].
    #[error("Invalid config file {}: {source}", .path.display())]
    Parse {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// The CSV delimiter is not a single-byte character.
    #[error("Unsupported CSV delimiter {delimiter:?}: must be an ASCII character")]
    Delimiter {
        /// The configured delimiter.
        delimiter: char,
    },
}

/// Settings for a pipeline run.
///
/// Every field is optional in the TOML file:
///
/// ```toml
/// regions_path = "data/shared/taxi_zones.geojson"
/// database_path = "data/taxi_destinations.duckdb"
/// history_start = "2009-11"
/// zone_property = "zone"
/// borough_property = "borough"
/// on_gap = "fail"
/// strict = false
/// delimiter = ","
/// limit = 100000
///
/// [columns]
/// weight = "passenger_count"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// `GeoJSON` file holding the zone polygons.
    pub regions_path: PathBuf,
    /// `DuckDB` file holding the ranking tables.
    pub database_path: PathBuf,
    /// First month of history; runs for this month bootstrap.
    pub history_start: Period,
    /// Feature property holding the zone name.
    pub zone_property: String,
    /// Feature property holding the borough name.
    pub borough_property: String,
    /// Header names of the trip CSV columns.
    pub columns: TripColumns,
    /// What to do when the previous month was never recorded.
    pub on_gap: GapPolicy,
    /// Reject the whole batch on a malformed trip row.
    pub strict: bool,
    /// Field delimiter of the trip CSV.
    pub delimiter: char,
    /// Stop reading the trip CSV after this many rows.
    pub limit: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let labels = LabelProperties::default();
        Self {
            regions_path: taxi_dest_database::paths::regions_path(),
            database_path: taxi_dest_database::paths::database_path(),
            history_start: Period::DEFAULT_HISTORY_START,
            zone_property: labels.fine,
            borough_property: labels.coarse,
            columns: TripColumns::default(),
            on_gap: GapPolicy::default(),
            strict: false,
            delimiter: ',',
            limit: None,
        }
    }
}

impl PipelineConfig {
    /// Loads the configuration.
    ///
    /// Reads `path`, or the file named by [`CONFIG_ENV`] when `path` is
    /// `None`, falling back to defaults when neither is given. Environment
    /// overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a config file is given but cannot be read
    /// or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies [`DATABASE_ENV`] and [`REGIONS_ENV`] as returned by `lookup`.
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(DATABASE_ENV).filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(REGIONS_ENV).filter(|v| !v.is_empty()) {
            self.regions_path = PathBuf::from(path);
        }
        self
    }

    /// The `GeoJSON` property names to read region labels from.
    #[must_use]
    pub fn label_properties(&self) -> LabelProperties {
        LabelProperties {
            fine: self.zone_property.clone(),
            coarse: self.borough_property.clone(),
        }
    }

    /// A trip loader honoring the configured columns, delimiter, row limit
    /// and strictness.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Delimiter`] if the delimiter is not ASCII.
    pub fn trip_loader(&self) -> Result<TripLoader, ConfigError> {
        let delimiter = u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(ConfigError::Delimiter {
                delimiter: self.delimiter,
            })?;

        let loader = TripLoader::new()
            .with_columns(self.columns.clone())
            .with_delimiter(delimiter)
            .strict(self.strict);

        Ok(match self.limit {
            Some(limit) => loader.with_max_records(limit),
            None => loader,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.history_start.to_string(), "2009-11");
        assert_eq!(config.on_gap, GapPolicy::Fail);
        assert!(!config.strict);
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.limit, None);
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let config: PipelineConfig = toml::from_str(
            r#"
            history_start = "2015-01"
            zone_property = "Zone"
            on_gap = "bootstrap"
            strict = true

            [columns]
            weight = "passenger_count"
            "#,
        )
        .unwrap();

        assert_eq!(config.history_start.to_string(), "2015-01");
        assert_eq!(config.on_gap, GapPolicy::Bootstrap);
        assert!(config.strict);
        assert_eq!(config.label_properties().fine, "Zone");
        assert_eq!(config.label_properties().coarse, "borough");
        assert_eq!(config.columns.weight, "passenger_count");
        assert_eq!(config.columns.origin_longitude, "Start_Lon");
    }

    #[test]
    fn trip_loader_honors_delimiter_and_limit() {
        let config: PipelineConfig = toml::from_str(
            r#"
            delimiter = ";"
            limit = 2
            "#,
        )
        .unwrap();

        let csv = "Start_Lon;Start_Lat;End_Lon;End_Lat;Passenger_Count\n\
                   -73.98;40.75;-73.99;40.73;1\n\
                   -73.97;40.76;-73.95;40.78;2\n\
                   -73.96;40.77;-73.94;40.79;3\n";
        let loaded = config.trip_loader().unwrap().read(csv.as_bytes()).unwrap();

        assert_eq!(loaded.trips.len(), 2);
        assert_eq!(loaded.malformed, 0);
        assert!((loaded.trips[1].weight - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let config = PipelineConfig {
            delimiter: '§',
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.trip_loader(),
            Err(ConfigError::Delimiter { delimiter: '§' })
        ));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_periods() {
        assert!(toml::from_str::<PipelineConfig>("top_k = 3").is_err());
        assert!(toml::from_str::<PipelineConfig>(r#"history_start = "2009-13""#).is_err());
    }

    #[test]
    fn env_overrides_replace_paths() {
        let config = PipelineConfig::default().with_env_overrides(|key| match key {
            DATABASE_ENV => Some("/tmp/rankings.duckdb".to_string()),
            REGIONS_ENV => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.database_path, PathBuf::from("/tmp/rankings.duckdb"));
        assert_eq!(
            config.regions_path,
            taxi_dest_database::paths::regions_path()
        );
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/taxi_dest.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
