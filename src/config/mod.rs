use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analysis::filter::{DateRange, ObservationFilter};
use crate::data::loader::DataSource;
use crate::data::schema::{PriceSchema, SchemaVersion};
use crate::types::{CountryCode, FillPolicy};
use chrono::NaiveDate;

/// ECDC daily case distribution, CSV edition.
pub const DEFAULT_CASES_URL: &str = "https://opendata.ecdc.europa.eu/covid19/casedistribution/csv";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasesSettings {
    pub source: DataSource,
    #[serde(default)]
    pub schema: SchemaVersion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSettings {
    pub source: DataSource,
    #[serde(flatten)]
    pub schema: PriceSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub countries: Vec<CountryCode>,
    pub date_range: DateRange,
    pub cases: CasesSettings,
    /// The market branch is skipped when no price file is configured.
    #[serde(default)]
    pub prices: Option<PriceSettings>,
    #[serde(default)]
    pub fill_policy: FillPolicy,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    /// Five countries over March and April 2020, S&P 500 from a local file.
    fn default() -> Self {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).expect("valid date");
        let end = NaiveDate::from_ymd_opt(2020, 4, 30).expect("valid date");
        Self {
            countries: ["ITA", "ESP", "DNK", "SWE", "USA"]
                .into_iter()
                .map(CountryCode::new)
                .collect(),
            date_range: DateRange::new(start, end).expect("start precedes end"),
            cases: CasesSettings {
                source: DataSource::Url {
                    url: DEFAULT_CASES_URL.to_string(),
                    cache: Some(PathBuf::from("data/covid_cases.csv")),
                },
                schema: SchemaVersion::Auto,
            },
            prices: Some(PriceSettings {
                source: DataSource::Path(PathBuf::from("data/sp500.csv")),
                schema: PriceSchema::default(),
            }),
            fill_policy: FillPolicy::Zero,
            output_dir: None,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.countries.is_empty() {
            return Err(ConfigError::Invalid("no countries selected".to_string()));
        }
        if let Some(prices) = &self.prices {
            if prices.schema.date_column.trim().is_empty() || prices.schema.value_column.trim().is_empty() {
                return Err(ConfigError::Invalid("price columns must be named".to_string()));
            }
        }
        Ok(())
    }

    pub fn to_filter(&self) -> ObservationFilter {
        ObservationFilter::new(self.countries.iter().cloned(), self.date_range)
    }
}
