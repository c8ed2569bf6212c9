//! Descriptive statistics over the pipeline outputs.

use super::join::JoinedRow;
use super::reshape::DateIndexed;
use crate::data::ObservationTable;
use crate::types::CountryCode;
use ndarray::Array1;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountrySummary {
    pub country: CountryCode,
    pub days: usize,
    pub mean_cases: f64,
    pub mean_deaths: f64,
    pub max_cases: u64,
    pub max_deaths: u64,
    pub total_cases: u64,
    pub total_deaths: u64,
}

/// Per-country daily averages, worst days and totals.
pub fn country_summaries(table: &ObservationTable) -> Vec<CountrySummary> {
    let mut by_country: BTreeMap<&CountryCode, (Vec<u64>, Vec<u64>)> = BTreeMap::new();
    for observation in table {
        let (cases, deaths) = by_country.entry(&observation.country).or_default();
        cases.push(observation.new_cases);
        deaths.push(observation.new_deaths);
    }

    by_country
        .into_iter()
        .map(|(country, (cases, deaths))| CountrySummary {
            country: country.clone(),
            days: cases.len(),
            mean_cases: mean(&cases).unwrap_or(0.0),
            mean_deaths: mean(&deaths).unwrap_or(0.0),
            max_cases: cases.iter().copied().max().unwrap_or(0),
            max_deaths: deaths.iter().copied().max().unwrap_or(0),
            total_cases: cases.iter().fold(0u64, |acc, v| acc.saturating_add(*v)),
            total_deaths: deaths.iter().fold(0u64, |acc, v| acc.saturating_add(*v)),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub label: String,
    pub defined: usize,
    pub max: Option<u64>,
    pub mean: Option<f64>,
}

/// Max and mean of every column, over defined cells only.
pub fn column_summaries<F: DateIndexed>(frame: &F) -> Vec<ColumnSummary> {
    frame
        .columns()
        .iter()
        .map(|column| {
            let values: Vec<u64> = column.defined().collect();
            ColumnSummary {
                label: column.label(),
                defined: values.len(),
                max: values.iter().copied().max(),
                mean: mean(&values),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub rows: usize,
    pub first_price: Option<f64>,
    pub last_price: Option<f64>,
    pub price_change_pct: Option<f64>,
    pub cases_correlation: Option<f64>,
    pub deaths_correlation: Option<f64>,
}

/// Index movement over the joined window and its correlation with daily counts.
pub fn market_summary(rows: &[JoinedRow]) -> MarketSummary {
    let mut ordered: Vec<&JoinedRow> = rows.iter().collect();
    ordered.sort_by_key(|row| row.date());

    let prices: Array1<f64> = ordered.iter().map(|row| row.price).collect();
    let cases: Array1<f64> = ordered
        .iter()
        .map(|row| row.row.observation.new_cases as f64)
        .collect();
    let deaths: Array1<f64> = ordered
        .iter()
        .map(|row| row.row.observation.new_deaths as f64)
        .collect();

    let first_price = ordered.first().map(|row| row.price);
    let last_price = ordered.last().map(|row| row.price);
    let price_change_pct = match (first_price, last_price) {
        (Some(first), Some(last)) if first != 0.0 => Some((last - first) / first * 100.0),
        _ => None,
    };

    MarketSummary {
        rows: rows.len(),
        first_price,
        last_price,
        price_change_pct,
        cases_correlation: pearson(&cases, &prices),
        deaths_correlation: pearson(&deaths, &prices),
    }
}

fn mean(values: &[u64]) -> Option<f64> {
    values.iter().map(|&v| v as f64).collect::<Array1<f64>>().mean()
}

/// `None` with fewer than two points or a constant series.
pub fn pearson(x: &Array1<f64>, y: &Array1<f64>) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let dx = x - x.mean()?;
    let dy = y - y.mean()?;
    let (sxx, syy) = (dx.dot(&dx), dy.dot(&dy));
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(dx.dot(&dy) / (sxx * syy).sqrt())
}

/// Round to one decimal place, the precision the summaries are reported at.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
