use super::reshape::{DateIndexed, SeriesColumn, WideSeries};
use crate::data::{Observation, ObservationTable};
use crate::types::{CountryCode, FillPolicy};
use chrono::NaiveDate;
use log::debug;
use std::collections::HashMap;

/// Running totals of a [`WideSeries`], same dates and columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CumulativeSeries {
    dates: Vec<NaiveDate>,
    columns: Vec<SeriesColumn>,
    policy: FillPolicy,
}

impl DateIndexed for CumulativeSeries {
    fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    fn columns(&self) -> &[SeriesColumn] {
        &self.columns
    }
}

impl CumulativeSeries {
    pub fn policy(&self) -> FillPolicy {
        self.policy
    }

    /// Last defined running total per column label.
    pub fn final_totals(&self) -> Vec<(String, u64)> {
        self.columns
            .iter()
            .map(|column| (column.label(), column.defined().last().unwrap_or(0)))
            .collect()
    }
}

/// Prefix sums down every column. Absent cells add nothing; whether they
/// stay absent in the output is decided by `policy`.
pub fn accumulate(wide: &WideSeries, policy: FillPolicy) -> CumulativeSeries {
    let columns = wide
        .columns()
        .iter()
        .map(|column| SeriesColumn {
            country: column.country.clone(),
            measure: column.measure,
            values: running_sum(&column.values, policy),
        })
        .collect();

    debug!(
        "accumulated {} columns over {} dates ({:?})",
        wide.columns().len(),
        wide.dates().len(),
        policy
    );
    CumulativeSeries {
        dates: wide.dates().to_vec(),
        columns,
        policy,
    }
}

fn running_sum(values: &[Option<u64>], policy: FillPolicy) -> Vec<Option<u64>> {
    let mut total = 0u64;
    values
        .iter()
        .map(|cell| {
            total = total.saturating_add(cell.unwrap_or(0));
            match (cell, policy) {
                (None, FillPolicy::PreserveGaps) => None,
                _ => Some(total),
            }
        })
        .collect()
}

/// A long row with its country's running totals attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningTotalRow {
    pub observation: Observation,
    pub total_cases: u64,
    pub total_deaths: u64,
}

/// Per-country prefix sums over the rows in ascending date order. Output keeps
/// the input row order.
pub fn running_totals(table: &ObservationTable) -> Vec<RunningTotalRow> {
    let rows = table.rows();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| {
        rows[a]
            .country
            .cmp(&rows[b].country)
            .then(rows[a].date.cmp(&rows[b].date))
    });

    let mut totals = vec![(0u64, 0u64); rows.len()];
    let mut running: HashMap<&CountryCode, (u64, u64)> = HashMap::new();
    for idx in order {
        let row = &rows[idx];
        let entry = running.entry(&row.country).or_insert((0, 0));
        entry.0 = entry.0.saturating_add(row.new_cases);
        entry.1 = entry.1.saturating_add(row.new_deaths);
        totals[idx] = *entry;
    }

    rows.iter()
        .zip(totals)
        .map(|(observation, (total_cases, total_deaths))| RunningTotalRow {
            observation: observation.clone(),
            total_cases,
            total_deaths,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    #[test]
    fn test_cumulative_example() {
        let table = ObservationTable::new(vec![
            Observation::new("DNK", date(3, 1), 1, 0),
            Observation::new("DNK", date(3, 2), 2, 1),
        ]);
        let wide = WideSeries::pivot(&table).unwrap();
        let cumulative = accumulate(&wide, FillPolicy::Zero);

        assert_eq!(cumulative.column("DNK cases").unwrap().values, vec![Some(1), Some(3)]);
        assert_eq!(cumulative.column("DNK deaths").unwrap().values, vec![Some(0), Some(1)]);
        assert_eq!(cumulative.dates(), wide.dates());
    }

    #[test]
    fn test_fill_policies_differ_only_in_gaps() {
        let values = [None, Some(4), None, Some(1)];
        assert_eq!(
            running_sum(&values, FillPolicy::Zero),
            vec![Some(0), Some(4), Some(4), Some(5)]
        );
        assert_eq!(
            running_sum(&values, FillPolicy::PreserveGaps),
            vec![None, Some(4), None, Some(5)]
        );
    }

    #[test]
    fn test_final_totals() {
        let table = ObservationTable::new(vec![
            Observation::new("SWE", date(3, 2), 7, 1),
            Observation::new("DNK", date(3, 1), 1, 0),
            Observation::new("DNK", date(3, 2), 2, 1),
        ]);
        let wide = WideSeries::pivot(&table).unwrap();
        let totals = accumulate(&wide, FillPolicy::PreserveGaps).final_totals();
        assert_eq!(
            totals,
            vec![
                ("DNK cases".to_string(), 3),
                ("DNK deaths".to_string(), 1),
                ("SWE cases".to_string(), 7),
                ("SWE deaths".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_running_totals_follow_dates_not_rows() {
        // newest first, the way the publisher ships it
        let table = ObservationTable::new(vec![
            Observation::new("DNK", date(3, 3), 4, 2),
            Observation::new("ITA", date(3, 1), 10, 1),
            Observation::new("DNK", date(3, 2), 2, 1),
            Observation::new("DNK", date(3, 1), 1, 0),
        ]);
        let totals: Vec<_> = running_totals(&table)
            .into_iter()
            .map(|row| (row.observation.date, row.total_cases, row.total_deaths))
            .collect();
        assert_eq!(
            totals,
            vec![
                (date(3, 3), 7, 3),
                (date(3, 1), 10, 1),
                (date(3, 2), 3, 1),
                (date(3, 1), 1, 0),
            ]
        );
    }
}
