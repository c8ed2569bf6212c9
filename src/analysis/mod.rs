pub mod accumulate;
pub mod filter;
pub mod join;
pub mod pipeline;
pub mod reshape;
pub mod summary;

use crate::types::CountryCode;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    #[error("Duplicate key ({country}, {date}) in {table}")]
    DuplicateKey {
        table: &'static str,
        country: CountryCode,
        date: NaiveDate,
    },
    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
