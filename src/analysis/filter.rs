use super::{AnalysisError, Result};
use crate::data::{Observation, ObservationTable};
use crate::types::CountryCode;
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = AnalysisError;

    fn try_from(raw: RawDateRange) -> Result<Self> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(AnalysisError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationFilter {
    countries: BTreeSet<CountryCode>,
    range: DateRange,
}

impl ObservationFilter {
    pub fn new<I>(countries: I, range: DateRange) -> Self
    where
        I: IntoIterator,
        I::Item: Into<CountryCode>,
    {
        Self {
            countries: countries.into_iter().map(Into::into).collect(),
            range,
        }
    }

    pub fn countries(&self) -> &BTreeSet<CountryCode> {
        &self.countries
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn matches(&self, observation: &Observation) -> bool {
        self.countries.contains(&observation.country) && self.range.contains(observation.date)
    }

    /// Order-preserving subsequence of the rows that match.
    /// Rejected rows are kept only when their key would have been selected.
    pub fn apply(&self, table: &ObservationTable) -> ObservationTable {
        let rows = table
            .iter()
            .filter(|observation| self.matches(observation))
            .cloned()
            .collect();
        let rejected = table
            .rejected()
            .iter()
            .filter(|row| self.countries.contains(&row.country) && self.range.contains(row.date))
            .cloned()
            .collect();
        let filtered = ObservationTable::with_rejected(rows, rejected);
        info!(
            "filter kept {} of {} rows ({} countries, {}..={})",
            filtered.len(),
            table.len(),
            self.countries.len(),
            self.range.start,
            self.range.end
        );
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RejectedRow;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    fn march_april() -> DateRange {
        DateRange::new(date(3, 1), date(4, 30)).unwrap()
    }

    #[test]
    fn test_filter_keeps_order_and_bounds() {
        let table = ObservationTable::new(vec![
            Observation::new("USA", date(4, 30), 30, 3),
            Observation::new("DNK", date(5, 1), 9, 9),
            Observation::new("FRA", date(3, 15), 9, 9),
            Observation::new("DNK", date(2, 29), 9, 9),
            Observation::new("DNK", date(3, 1), 1, 0),
        ]);
        let filter = ObservationFilter::new(["DNK", "USA"], march_april());
        let kept = filter.apply(&table);

        assert_eq!(
            kept.rows(),
            &[
                Observation::new("USA", date(4, 30), 30, 3),
                Observation::new("DNK", date(3, 1), 1, 0),
            ]
        );
    }

    #[test]
    fn test_filter_drops_rejected_rows_of_other_countries() {
        let rejected = |country: &str, date| RejectedRow {
            country: CountryCode::new(country),
            date,
            column: "cases".to_string(),
            line: 2,
            reason: "'-1' is negative".to_string(),
        };
        let table = ObservationTable::with_rejected(
            vec![Observation::new("DNK", date(3, 1), 1, 0)],
            vec![rejected("ESP", date(3, 1)), rejected("DNK", date(5, 1)), rejected("DNK", date(3, 2))],
        );
        let kept = ObservationFilter::new(["DNK"], march_april()).apply(&table);
        assert_eq!(kept.rejected(), &[rejected("DNK", date(3, 2))]);
        assert!(kept.ensure_valid().is_err());

        let kept = ObservationFilter::new(["DNK"], DateRange::new(date(3, 1), date(3, 1)).unwrap()).apply(&table);
        assert!(kept.rejected().is_empty());
        assert!(kept.ensure_valid().is_ok());
    }

    #[test]
    fn test_range_rejects_reversed_bounds() {
        assert_eq!(
            DateRange::new(date(4, 1), date(3, 1)),
            Err(AnalysisError::InvalidRange {
                start: date(4, 1),
                end: date(3, 1)
            })
        );
        assert!(DateRange::new(date(3, 1), date(3, 1)).is_ok());
    }

    #[test]
    fn test_range_from_yaml_is_validated() {
        let range: DateRange = serde_yaml::from_str("start: 2020-03-01\nend: 2020-04-30\n").unwrap();
        assert!(range.contains(date(4, 30)));
        assert!(!range.contains(date(5, 1)));
        assert!(serde_yaml::from_str::<DateRange>("start: 2020-05-01\nend: 2020-04-30\n").is_err());
    }
}
