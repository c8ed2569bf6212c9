use super::schema::{PriceSchema, ResolvedSchema, SchemaVersion};
use super::{DataError, Observation, ObservationTable, PriceObservation, RejectedRow, Result};
use crate::types::CountryCode;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

/// Date layouts seen in the sources: ISO and the ECDC `dd/mm/yyyy` export.
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// FRED writes a single dot for days without a quote.
const MISSING_PRICE: &str = ".";

/// Where a table comes from. In YAML a bare string is a file path and a
/// map with `url` (and optionally `cache`) is a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataSource {
    Path(PathBuf),
    Url {
        url: String,
        /// Raw response is written here and read back when the fetch fails.
        #[serde(default)]
        cache: Option<PathBuf>,
    },
}

impl DataSource {
    /// `http(s)://` strings become URLs, anything else a file path.
    pub fn parse(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            DataSource::Url {
                url: location.to_string(),
                cache: None,
            }
        } else {
            DataSource::Path(PathBuf::from(location))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DataSource::Path(path) => path.display().to_string(),
            DataSource::Url { url, .. } => url.clone(),
        }
    }
}

pub struct DataLoader;

impl DataLoader {
    fn reader<R: Read>(input: R) -> csv::Reader<R> {
        ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(input)
    }

    /// Fetch the raw bytes behind a source.
    pub fn fetch(source: &DataSource) -> Result<Vec<u8>> {
        match source {
            DataSource::Path(path) => Self::read_file(path),
            DataSource::Url { url, cache } => match Self::download(url) {
                Ok(body) => {
                    if let Some(cache) = cache {
                        Self::write_cache(cache, &body)?;
                    }
                    Ok(body)
                }
                Err(error) => match cache {
                    Some(cache) if cache.exists() => {
                        warn!(
                            "fetching {url} failed ({error}), falling back to cached copy {}",
                            cache.display()
                        );
                        Self::read_file(cache)
                    }
                    _ => Err(DataError::SourceUnavailable {
                        source_name: url.clone(),
                        reason: error.to_string(),
                    }),
                },
            },
        }
    }

    fn download(url: &str) -> Result<Vec<u8>> {
        info!("downloading {url}");
        let response = reqwest::blocking::get(url)?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }

    fn read_file(path: &Path) -> Result<Vec<u8>> {
        let mut file = File::open(path).map_err(|error| DataError::SourceUnavailable {
            source_name: path.display().to_string(),
            reason: error.to_string(),
        })?;
        let mut body = Vec::new();
        file.read_to_end(&mut body)?;
        Ok(body)
    }

    fn write_cache(path: &Path, body: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, body)?;
        debug!("cached {} bytes at {}", body.len(), path.display());
        Ok(())
    }

    pub fn load_observations(source: &DataSource, schema: SchemaVersion) -> Result<ObservationTable> {
        let body = Self::fetch(source)?;
        let table = Self::read_observations(Cursor::new(body), schema)?;
        info!(
            "loaded {} observations from {}",
            table.len(),
            source.describe()
        );
        Ok(table)
    }

    /// Parse long-format case rows. The header row is checked against the
    /// schema before any data row is read.
    pub fn read_observations<R: Read>(input: R, schema: SchemaVersion) -> Result<ObservationTable> {
        let mut rdr = Self::reader(input);
        let headers = rdr.headers()?.clone();
        let resolved = schema.resolve(&headers)?;
        debug!(
            "resolved schema {} (dropping columns: {:?})",
            resolved.version, resolved.columns.dropped
        );

        let mut rows = Vec::new();
        let mut rejected = Vec::new();
        for result in rdr.records() {
            let record = result?;
            match Self::parse_observation(&record, &resolved)? {
                ParsedRow::Valid(observation) => rows.push(observation),
                ParsedRow::Rejected(row) => {
                    debug!("line {}: {} on {} rejected: {}", row.line, row.country, row.date, row.reason);
                    rejected.push(row);
                }
                ParsedRow::Unkeyed(line) => debug!("line {line}: no country code, skipping"),
            }
        }
        Ok(ObservationTable::with_rejected(rows, rejected))
    }

    /// Rows without a country code cannot be selected by any filter and are
    /// skipped. Rows with unusable counts are kept aside as [`RejectedRow`]s.
    fn parse_observation(record: &StringRecord, schema: &ResolvedSchema) -> Result<ParsedRow> {
        let line = record.position().map_or(0, |p| p.line());
        let columns = &schema.columns;
        let index = &schema.index;

        let country = field(record, index.country, columns.country, line)?;
        if country.is_empty() {
            return Ok(ParsedRow::Unkeyed(line));
        }
        let country = CountryCode::new(country);
        let date = parse_date(field(record, index.date, columns.date, line)?, columns.date, line)?;

        let cases = parse_count(
            field(record, index.new_cases, columns.new_cases, line)?,
            columns.new_cases,
            line,
        )?;
        let deaths = parse_count(
            field(record, index.new_deaths, columns.new_deaths, line)?,
            columns.new_deaths,
            line,
        )?;
        let negative = [(columns.new_cases, cases), (columns.new_deaths, deaths)]
            .into_iter()
            .find(|&(_, value)| value < 0);
        if let Some((column, value)) = negative {
            return Ok(ParsedRow::Rejected(RejectedRow {
                country,
                date,
                column: column.to_string(),
                line,
                reason: format!("'{value}' is negative"),
            }));
        }

        Ok(ParsedRow::Valid(Observation {
            country,
            date,
            new_cases: cases.unsigned_abs(),
            new_deaths: deaths.unsigned_abs(),
        }))
    }

    pub fn load_prices(source: &DataSource, schema: &PriceSchema) -> Result<Vec<PriceObservation>> {
        let body = Self::fetch(source)?;
        let prices = Self::read_prices(Cursor::new(body), schema)?;
        info!("loaded {} prices from {}", prices.len(), source.describe());
        Ok(prices)
    }

    /// Parse a single-series price file, attributing every row to
    /// `schema.country`. Rows holding the missing-value marker are skipped.
    pub fn read_prices<R: Read>(input: R, schema: &PriceSchema) -> Result<Vec<PriceObservation>> {
        let mut rdr = Self::reader(input);
        let headers = rdr.headers()?.clone();
        let (date_idx, value_idx) = schema.locate(&headers)?;

        let mut prices = Vec::new();
        for result in rdr.records() {
            let record = result?;
            let line = record.position().map_or(0, |p| p.line());
            let date = parse_date(
                field(&record, date_idx, &schema.date_column, line)?,
                &schema.date_column,
                line,
            )?;
            let raw = field(&record, value_idx, &schema.value_column, line)?;
            if raw.is_empty() || raw == MISSING_PRICE {
                debug!("no {} quote on {date}, skipping", schema.value_column);
                continue;
            }
            let price = raw.parse::<f64>().map_err(|e| DataError::SchemaMismatch {
                column: schema.value_column.clone(),
                line,
                reason: format!("'{raw}' is not a number: {e}"),
            })?;
            prices.push(PriceObservation {
                date,
                country: schema.country.clone(),
                price,
            });
        }
        Ok(prices)
    }
}

enum ParsedRow {
    Valid(Observation),
    Rejected(RejectedRow),
    /// Line number of a row with a blank country code.
    Unkeyed(u64),
}

fn field<'r>(record: &'r StringRecord, idx: usize, column: &str, line: u64) -> Result<&'r str> {
    record.get(idx).ok_or_else(|| DataError::SchemaMismatch {
        column: column.to_string(),
        line,
        reason: "row is shorter than the header".to_string(),
    })
}

pub fn parse_date(raw: &str, column: &str, line: u64) -> Result<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .ok_or_else(|| DataError::SchemaMismatch {
            column: column.to_string(),
            line,
            reason: format!("'{raw}' is not a date"),
        })
}

fn parse_count(raw: &str, column: &str, line: u64) -> Result<i64> {
    raw.parse::<i64>().map_err(|e| DataError::SchemaMismatch {
        column: column.to_string(),
        line,
        reason: format!("'{raw}' is not an integer: {e}"),
    })
}
