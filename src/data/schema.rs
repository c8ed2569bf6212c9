//! Column layouts of the upstream case spreadsheet.
//!
//! The publisher renamed and dropped columns between releases, so each known
//! release gets its own [`SchemaVersion`]. The loader resolves a version
//! against the header row once, before reading any data.

use super::{DataError, Result};
use crate::types::CountryCode;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Source header names for the four logical fields of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub country: &'static str,
    pub date: &'static str,
    pub new_cases: &'static str,
    pub new_deaths: &'static str,
    /// Ancillary columns that release carried and the analysis discards.
    /// A header row must still have them to match the release.
    pub dropped: &'static [&'static str],
}

const ECDC_COLUMNS: ColumnMap = ColumnMap {
    country: "countryterritoryCode",
    date: "dateRep",
    new_cases: "cases",
    new_deaths: "deaths",
    dropped: &[],
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// Pick the first concrete version whose columns are all present.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// `country,date,new_cases,new_deaths` as written by this crate's exporter.
    #[serde(rename = "canonical")]
    Canonical,
    #[serde(rename = "ecdc-2020-04-06")]
    Ecdc20200406,
    #[serde(rename = "ecdc-2020-04-22")]
    Ecdc20200422,
}

impl SchemaVersion {
    /// Concrete versions in detection order.
    pub const DETECTION_ORDER: [SchemaVersion; 3] = [
        SchemaVersion::Canonical,
        SchemaVersion::Ecdc20200422,
        SchemaVersion::Ecdc20200406,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVersion::Auto => "auto",
            SchemaVersion::Canonical => "canonical",
            SchemaVersion::Ecdc20200406 => "ecdc-2020-04-06",
            SchemaVersion::Ecdc20200422 => "ecdc-2020-04-22",
        }
    }

    /// Column layout of a concrete version; `None` for [`SchemaVersion::Auto`].
    pub fn columns(self) -> Option<ColumnMap> {
        match self {
            SchemaVersion::Auto => None,
            SchemaVersion::Canonical => Some(ColumnMap {
                country: "country",
                date: "date",
                new_cases: "new_cases",
                new_deaths: "new_deaths",
                dropped: &[],
            }),
            SchemaVersion::Ecdc20200406 => Some(ECDC_COLUMNS),
            SchemaVersion::Ecdc20200422 => Some(ColumnMap {
                dropped: &["year", "countriesAndTerritories", "geoId", "popData2018"],
                ..ECDC_COLUMNS
            }),
        }
    }

    /// Match this version against a header row, detecting it when `Auto`.
    pub fn resolve(self, headers: &StringRecord) -> Result<ResolvedSchema> {
        match self.columns() {
            Some(columns) => {
                let index = HeaderIndex::locate(&columns, headers)?;
                for name in columns.dropped {
                    find_column(headers, name)?;
                }
                Ok(ResolvedSchema {
                    version: self,
                    columns,
                    index,
                })
            }
            None => Self::DETECTION_ORDER
                .iter()
                .find_map(|version| version.resolve(headers).ok())
                .ok_or_else(|| DataError::UnknownSchema(headers.iter().collect::<Vec<_>>().join(","))),
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        [SchemaVersion::Auto]
            .into_iter()
            .chain(Self::DETECTION_ORDER)
            .find(|version| version.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown schema version '{s}'"))
    }
}

/// Positions of the logical fields inside a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderIndex {
    pub country: usize,
    pub date: usize,
    pub new_cases: usize,
    pub new_deaths: usize,
}

impl HeaderIndex {
    fn locate(columns: &ColumnMap, headers: &StringRecord) -> Result<Self> {
        Ok(Self {
            country: find_column(headers, columns.country)?,
            date: find_column(headers, columns.date)?,
            new_cases: find_column(headers, columns.new_cases)?,
            new_deaths: find_column(headers, columns.new_deaths)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSchema {
    pub version: SchemaVersion,
    pub columns: ColumnMap,
    pub index: HeaderIndex,
}

/// Layout of the external price file, which carries no country column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceSchema {
    pub date_column: String,
    pub value_column: String,
    /// Country every price row is attributed to.
    pub country: CountryCode,
}

impl Default for PriceSchema {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            value_column: "SP500".to_string(),
            country: CountryCode::new("USA"),
        }
    }
}

impl PriceSchema {
    pub fn locate(&self, headers: &StringRecord) -> Result<(usize, usize)> {
        Ok((
            find_column(headers, &self.date_column)?,
            find_column(headers, &self.value_column)?,
        ))
    }
}

/// Case-insensitive, whitespace-trimmed header lookup.
pub fn find_column(headers: &StringRecord, name: &str) -> Result<usize> {
    let wanted = name.trim().to_lowercase();
    headers
        .iter()
        .position(|header| header.trim().to_lowercase() == wanted)
        .ok_or_else(|| DataError::MissingColumn(name.to_string()))
}
