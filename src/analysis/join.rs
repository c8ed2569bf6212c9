use super::accumulate::RunningTotalRow;
use super::{AnalysisError, Result};
use crate::data::PriceObservation;
use crate::types::CountryCode;
use chrono::NaiveDate;
use log::{info, warn};
use std::collections::{hash_map::Entry, HashMap};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub row: RunningTotalRow,
    pub price: f64,
}

impl JoinedRow {
    pub fn date(&self) -> NaiveDate {
        self.row.observation.date
    }

    pub fn country(&self) -> &CountryCode {
        &self.row.observation.country
    }
}

/// Conditions worth reporting that do not stop the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineWarning {
    EmptyJoinResult { observations: usize, prices: usize },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::EmptyJoinResult {
                observations,
                prices,
            } => write!(
                f,
                "join of {observations} observations with {prices} prices matched no (date, country) key"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct JoinReport {
    pub rows: Vec<JoinedRow>,
    pub warning: Option<PipelineWarning>,
}

/// Inner join on exact (date, country) equality, in left-row order.
pub fn inner_join(left: &[RunningTotalRow], prices: &[PriceObservation]) -> Result<JoinReport> {
    let mut index: HashMap<(NaiveDate, &CountryCode), f64> = HashMap::with_capacity(prices.len());
    for price in prices {
        match index.entry((price.date, &price.country)) {
            Entry::Occupied(_) => {
                return Err(AnalysisError::DuplicateKey {
                    table: "prices",
                    country: price.country.clone(),
                    date: price.date,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(price.price);
            }
        }
    }

    let rows: Vec<JoinedRow> = left
        .iter()
        .filter_map(|row| {
            let key = (row.observation.date, &row.observation.country);
            index.get(&key).map(|&price| JoinedRow {
                row: row.clone(),
                price,
            })
        })
        .collect();

    let warning = if rows.is_empty() {
        let warning = PipelineWarning::EmptyJoinResult {
            observations: left.len(),
            prices: prices.len(),
        };
        warn!("{warning}");
        Some(warning)
    } else {
        info!("joined {} rows with prices", rows.len());
        None
    };

    Ok(JoinReport { rows, warning })
}
