pub mod export;
pub mod loader;
pub mod schema;

use crate::types::CountryCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub country: CountryCode,
    pub date: NaiveDate,
    pub new_cases: u64,
    pub new_deaths: u64,
}

impl Observation {
    pub fn new(country: impl Into<CountryCode>, date: NaiveDate, new_cases: u64, new_deaths: u64) -> Self {
        Self {
            country: country.into(),
            date,
            new_cases,
            new_deaths,
        }
    }
}

/// One index level for one country on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub country: CountryCode,
    pub price: f64,
}

/// A source row whose key parsed but whose measures did not. It only
/// becomes an error if the row survives filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub country: CountryCode,
    pub date: NaiveDate,
    pub column: String,
    pub line: u64,
    pub reason: String,
}

impl From<&RejectedRow> for DataError {
    fn from(row: &RejectedRow) -> Self {
        DataError::SchemaMismatch {
            column: row.column.clone(),
            line: row.line,
            reason: format!("{} on {}: {}", row.country, row.date, row.reason),
        }
    }
}

/// Long-format rows, one per (country, date). Never mutated in place: every
/// transformation returns a new table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationTable {
    rows: Vec<Observation>,
    rejected: Vec<RejectedRow>,
}

impl ObservationTable {
    pub fn new(rows: Vec<Observation>) -> Self {
        Self {
            rows,
            rejected: Vec::new(),
        }
    }

    pub fn with_rejected(rows: Vec<Observation>, rejected: Vec<RejectedRow>) -> Self {
        Self { rows, rejected }
    }

    pub fn rejected(&self) -> &[RejectedRow] {
        &self.rejected
    }

    /// Fails on the first rejected row still carried by the table.
    pub fn ensure_valid(&self) -> Result<()> {
        match self.rejected.first() {
            Some(row) => Err(row.into()),
            None => Ok(()),
        }
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<Observation> {
        self.rows
    }

    /// Row order flipped. Sources publish newest first; this gives earliest first.
    pub fn reversed(&self) -> Self {
        Self::with_rejected(self.rows.iter().rev().cloned().collect(), self.rejected.clone())
    }

    /// Stable sort by (country, date).
    pub fn sorted_chronologically(&self) -> Self {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| a.country.cmp(&b.country).then(a.date.cmp(&b.date)));
        Self::with_rejected(rows, self.rejected.clone())
    }

    /// True when the first row is dated later than the last one.
    pub fn is_newest_first(&self) -> bool {
        match (self.rows.first(), self.rows.last()) {
            (Some(first), Some(last)) => first.date > last.date,
            _ => false,
        }
    }
}

impl FromIterator<Observation> for ObservationTable {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ObservationTable {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Source unavailable: {source_name}: {reason}")]
    SourceUnavailable { source_name: String, reason: String },
    #[error("Missing required column: {0}")]
    MissingColumn(String),
    #[error("Schema mismatch in column '{column}' (line {line}): {reason}")]
    SchemaMismatch {
        column: String,
        line: u64,
        reason: String,
    },
    #[error("No known schema matches headers: {0}")]
    UnknownSchema(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    #[test]
    fn test_reversed_gives_earliest_first() {
        let table = ObservationTable::new(vec![
            Observation::new("DNK", date(3, 2), 2, 1),
            Observation::new("DNK", date(3, 1), 1, 0),
        ]);
        assert!(table.is_newest_first());

        let reversed = table.reversed();
        assert!(!reversed.is_newest_first());
        assert_eq!(reversed.rows()[0].date, date(3, 1));
        // the original is left untouched
        assert_eq!(table.rows()[0].date, date(3, 2));
    }

    #[test]
    fn test_sorted_chronologically_groups_by_country() {
        let table = ObservationTable::new(vec![
            Observation::new("SWE", date(3, 1), 5, 0),
            Observation::new("DNK", date(3, 2), 2, 1),
            Observation::new("DNK", date(3, 1), 1, 0),
        ]);
        let sorted = table.sorted_chronologically();
        let keys: Vec<_> = sorted
            .iter()
            .map(|o| (o.country.as_str().to_string(), o.date))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("DNK".to_string(), date(3, 1)),
                ("DNK".to_string(), date(3, 2)),
                ("SWE".to_string(), date(3, 1)),
            ]
        );
    }

    #[test]
    fn test_ensure_valid_reports_rejected_row() {
        let rejected = RejectedRow {
            country: CountryCode::new("ESP"),
            date: date(3, 1),
            column: "cases".to_string(),
            line: 7,
            reason: "'-3' is negative".to_string(),
        };
        let table = ObservationTable::with_rejected(
            vec![Observation::new("DNK", date(3, 1), 1, 0)],
            vec![rejected],
        );
        assert_eq!(table.reversed().rejected().len(), 1);
        match table.ensure_valid() {
            Err(DataError::SchemaMismatch { column, line, .. }) => {
                assert_eq!(column, "cases");
                assert_eq!(line, 7);
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
        assert!(ObservationTable::new(Vec::new()).ensure_valid().is_ok());
    }
}
