use super::{AnalysisError, Result};
use crate::data::{Observation, ObservationTable};
use crate::types::{CountryCode, Measure};
use chrono::NaiveDate;
use log::info;
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};

/// One `<country> <measure>` column of a date-indexed frame. `None` marks a
/// date on which the country reported nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesColumn {
    pub country: CountryCode,
    pub measure: Measure,
    pub values: Vec<Option<u64>>,
}

impl SeriesColumn {
    pub fn label(&self) -> String {
        format!("{} {}", self.country, self.measure)
    }

    /// Values of the defined cells, in date order.
    pub fn defined(&self) -> impl Iterator<Item = u64> + '_ {
        self.values.iter().flatten().copied()
    }
}

/// Shared read access for the wide and cumulative frames.
pub trait DateIndexed {
    fn dates(&self) -> &[NaiveDate];
    fn columns(&self) -> &[SeriesColumn];

    fn column(&self, label: &str) -> Option<&SeriesColumn> {
        self.columns().iter().find(|column| column.label() == label)
    }

    fn labels(&self) -> Vec<String> {
        self.columns().iter().map(SeriesColumn::label).collect()
    }

    fn countries(&self) -> Vec<CountryCode> {
        let mut countries: Vec<CountryCode> = Vec::new();
        for column in self.columns() {
            if countries.last() != Some(&column.country) {
                countries.push(column.country.clone());
            }
        }
        countries
    }
}

/// Dates ascending and unique; two columns per country, cases then deaths,
/// countries in ascending code order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WideSeries {
    dates: Vec<NaiveDate>,
    columns: Vec<SeriesColumn>,
}

impl DateIndexed for WideSeries {
    fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    fn columns(&self) -> &[SeriesColumn] {
        &self.columns
    }
}

impl WideSeries {
    /// Pivot long rows into one column pair per country, outer-joined on date.
    pub fn pivot(table: &ObservationTable) -> Result<Self> {
        let mut by_country: BTreeMap<CountryCode, BTreeMap<NaiveDate, (u64, u64)>> = BTreeMap::new();
        let mut all_dates = BTreeSet::new();

        for observation in table {
            let days = by_country.entry(observation.country.clone()).or_default();
            match days.entry(observation.date) {
                Entry::Occupied(_) => {
                    return Err(AnalysisError::DuplicateKey {
                        table: "observations",
                        country: observation.country.clone(),
                        date: observation.date,
                    })
                }
                Entry::Vacant(slot) => {
                    slot.insert((observation.new_cases, observation.new_deaths));
                }
            }
            all_dates.insert(observation.date);
        }

        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
        let mut columns = Vec::with_capacity(by_country.len() * 2);
        for (country, days) in by_country {
            let cases = dates.iter().map(|d| days.get(d).map(|v| v.0)).collect();
            let deaths = dates.iter().map(|d| days.get(d).map(|v| v.1)).collect();
            columns.push(SeriesColumn {
                country: country.clone(),
                measure: Measure::Cases,
                values: cases,
            });
            columns.push(SeriesColumn {
                country,
                measure: Measure::Deaths,
                values: deaths,
            });
        }

        info!(
            "pivoted {} rows into {} dates x {} columns",
            table.len(),
            dates.len(),
            columns.len()
        );
        Ok(Self { dates, columns })
    }

    /// Long rows back out of the frame, country by country, earliest first.
    /// A missing half of a cell pair reads as zero.
    pub fn unpivot(&self) -> ObservationTable {
        let mut rows = Vec::new();
        for country in self.countries() {
            let cases = self.cell_values(&country, Measure::Cases);
            let deaths = self.cell_values(&country, Measure::Deaths);
            for (i, date) in self.dates.iter().enumerate() {
                let case = cases.and_then(|values| values[i]);
                let death = deaths.and_then(|values| values[i]);
                if case.is_none() && death.is_none() {
                    continue;
                }
                rows.push(Observation {
                    country: country.clone(),
                    date: *date,
                    new_cases: case.unwrap_or(0),
                    new_deaths: death.unwrap_or(0),
                });
            }
        }
        ObservationTable::new(rows)
    }

    fn cell_values(&self, country: &CountryCode, measure: Measure) -> Option<&[Option<u64>]> {
        self.columns
            .iter()
            .find(|c| &c.country == country && c.measure == measure)
            .map(|c| c.values.as_slice())
    }
}
