use super::accumulate::{accumulate, running_totals, CumulativeSeries, RunningTotalRow};
use super::join::{inner_join, JoinReport, PipelineWarning};
use super::reshape::{DateIndexed, WideSeries};
use super::summary::{
    column_summaries, country_summaries, market_summary, ColumnSummary, CountrySummary, MarketSummary,
};
use super::AnalysisError;
use crate::config::Config;
use crate::data::export::{to_file, write_frame, write_joined, write_running_totals};
use crate::data::loader::DataLoader;
use crate::data::{DataError, ObservationTable, PriceObservation};
use log::info;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every intermediate value of one run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Filter output, earliest first.
    pub filtered: ObservationTable,
    pub wide: WideSeries,
    pub cumulative: CumulativeSeries,
    pub running_totals: Vec<RunningTotalRow>,
    /// `None` when no price series was supplied.
    pub joined: Option<JoinReport>,
    pub country_summaries: Vec<CountrySummary>,
    pub daily_summaries: Vec<ColumnSummary>,
    pub cumulative_summaries: Vec<ColumnSummary>,
    pub market: Option<MarketSummary>,
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineOutput {
    /// Write the wide, cumulative, running-total and joined tables as CSV.
    pub fn export(&self, dir: &Path) -> std::result::Result<(), DataError> {
        to_file(&dir.join("wide.csv"), |file| write_frame(&self.wide, file))?;
        to_file(&dir.join("cumulative.csv"), |file| write_frame(&self.cumulative, file))?;
        to_file(&dir.join("running_totals.csv"), |file| {
            write_running_totals(&self.running_totals, file)
        })?;
        if let Some(joined) = &self.joined {
            to_file(&dir.join("joined.csv"), |file| write_joined(&joined.rows, file))?;
        }
        Ok(())
    }
}

pub struct Pipeline {
    config: Config,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load both sources and process them.
    pub fn run(&self) -> Result<PipelineOutput> {
        let cases = &self.config.cases;
        let observations = DataLoader::load_observations(&cases.source, cases.schema)?;
        let prices = match &self.config.prices {
            Some(settings) => Some(DataLoader::load_prices(&settings.source, &settings.schema)?),
            None => None,
        };
        self.process(&observations, prices.as_deref())
    }

    /// Filter, reshape, accumulate and join already-loaded tables.
    pub fn process(
        &self,
        observations: &ObservationTable,
        prices: Option<&[PriceObservation]>,
    ) -> Result<PipelineOutput> {
        let filtered = self.config.to_filter().apply(observations);
        filtered.ensure_valid()?;
        let filtered = if filtered.is_newest_first() {
            filtered.reversed()
        } else {
            filtered
        };

        let wide = WideSeries::pivot(&filtered)?;
        let cumulative = accumulate(&wide, self.config.fill_policy);
        let totals = running_totals(&filtered);

        let mut warnings = Vec::new();
        let joined = match prices {
            Some(prices) => {
                let report = inner_join(&totals, prices)?;
                warnings.extend(report.warning.clone());
                Some(report)
            }
            None => None,
        };
        let market = joined.as_ref().map(|report| market_summary(&report.rows));

        info!(
            "pipeline done: {} rows, {} dates, {} joined, {} warnings",
            filtered.len(),
            cumulative.dates().len(),
            joined.as_ref().map_or(0, |report| report.rows.len()),
            warnings.len()
        );

        Ok(PipelineOutput {
            country_summaries: country_summaries(&filtered),
            daily_summaries: column_summaries(&wide),
            cumulative_summaries: column_summaries(&cumulative),
            filtered,
            wide,
            cumulative,
            running_totals: totals,
            joined,
            market,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::filter::DateRange;
    use crate::data::{Observation, RejectedRow};
    use crate::types::CountryCode;
    use chrono::NaiveDate;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    fn config() -> Config {
        Config {
            countries: vec![CountryCode::new("DNK"), CountryCode::new("USA")],
            date_range: DateRange::new(date(3, 1), date(3, 31)).unwrap(),
            prices: None,
            ..Config::default()
        }
    }

    #[test]
    fn test_process_newest_first_source() {
        let observations = ObservationTable::new(vec![
            Observation::new("USA", date(4, 1), 99, 9),
            Observation::new("USA", date(3, 2), 8, 1),
            Observation::new("DNK", date(3, 2), 2, 1),
            Observation::new("USA", date(3, 1), 5, 0),
            Observation::new("DNK", date(3, 1), 1, 0),
        ]);
        let prices = vec![PriceObservation {
            date: date(3, 2),
            country: CountryCode::new("USA"),
            price: 3090.23,
        }];

        let output = Pipeline::new(config())
            .process(&observations, Some(prices.as_slice()))
            .unwrap();

        assert_eq!(output.filtered.len(), 4);
        assert_eq!(output.filtered.rows()[0].date, date(3, 1));
        assert_eq!(
            output.cumulative.column("USA cases").unwrap().values,
            vec![Some(5), Some(13)]
        );
        let joined = output.joined.unwrap();
        assert_eq!(joined.rows.len(), 1);
        assert_eq!(joined.rows[0].row.total_cases, 13);
        assert!(output.warnings.is_empty());
        assert_eq!(output.market.unwrap().rows, 1);
    }

    #[test]
    fn test_process_collects_empty_join_warning() {
        let observations = ObservationTable::new(vec![Observation::new("DNK", date(3, 1), 1, 0)]);
        let output = Pipeline::new(config()).process(&observations, Some(&[][..])).unwrap();
        assert_eq!(
            output.warnings,
            vec![PipelineWarning::EmptyJoinResult {
                observations: 1,
                prices: 0
            }]
        );
    }

    #[test]
    fn test_process_propagates_duplicate_key() {
        let observations = ObservationTable::new(vec![
            Observation::new("USA", date(3, 5), 1, 0),
            Observation::new("USA", date(3, 5), 2, 0),
        ]);
        assert!(matches!(
            Pipeline::new(config()).process(&observations, None),
            Err(PipelineError::Analysis(AnalysisError::DuplicateKey { .. }))
        ));
    }

    #[test]
    fn test_rejected_rows_fail_only_when_selected() {
        let negative = |country: &str| RejectedRow {
            country: CountryCode::new(country),
            date: date(3, 2),
            column: "cases".to_string(),
            line: 3,
            reason: "'-5' is negative".to_string(),
        };
        let rows = vec![Observation::new("DNK", date(3, 1), 1, 0)];

        let observations = ObservationTable::with_rejected(rows.clone(), vec![negative("ESP")]);
        let output = Pipeline::new(config()).process(&observations, None).unwrap();
        assert_eq!(output.filtered.len(), 1);

        let observations = ObservationTable::with_rejected(rows, vec![negative("DNK")]);
        assert!(matches!(
            Pipeline::new(config()).process(&observations, None),
            Err(PipelineError::Data(DataError::SchemaMismatch { line: 3, .. }))
        ));
    }

    #[test]
    fn test_export_writes_tables() {
        let observations = ObservationTable::new(vec![Observation::new("DNK", date(3, 1), 1, 0)]);
        let output = Pipeline::new(config()).process(&observations, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        output.export(dir.path()).unwrap();

        assert!(dir.path().join("wide.csv").exists());
        assert!(dir.path().join("cumulative.csv").exists());
        assert!(dir.path().join("running_totals.csv").exists());
        assert!(!dir.path().join("joined.csv").exists());
    }
}
