use super::Result;
use crate::analysis::accumulate::RunningTotalRow;
use crate::analysis::join::JoinedRow;
use crate::analysis::reshape::DateIndexed;
use csv::{Writer, WriterBuilder};
use log::info;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

fn writer<W: Write>(output: W) -> Writer<W> {
    WriterBuilder::new().has_headers(false).from_writer(output)
}

/// One row per date, one column per label. Absent cells are written empty.
pub fn write_frame<F: DateIndexed, W: Write>(frame: &F, output: W) -> Result<()> {
    let mut wtr = writer(output);
    let mut header = vec!["date".to_string()];
    header.extend(frame.labels());
    wtr.write_record(&header)?;

    for (i, date) in frame.dates().iter().enumerate() {
        let mut record = vec![date.to_string()];
        record.extend(
            frame
                .columns()
                .iter()
                .map(|column| column.values[i].map(|v| v.to_string()).unwrap_or_default()),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Long rows with running totals, in the canonical column layout plus totals.
pub fn write_running_totals<W: Write>(rows: &[RunningTotalRow], output: W) -> Result<()> {
    let mut wtr = writer(output);
    wtr.write_record([
        "country",
        "date",
        "new_cases",
        "new_deaths",
        "total_cases",
        "total_deaths",
    ])?;
    for row in rows {
        let o = &row.observation;
        wtr.write_record([
            o.country.to_string(),
            o.date.to_string(),
            o.new_cases.to_string(),
            o.new_deaths.to_string(),
            row.total_cases.to_string(),
            row.total_deaths.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_joined<W: Write>(rows: &[JoinedRow], output: W) -> Result<()> {
    let mut wtr = writer(output);
    wtr.write_record([
        "country",
        "date",
        "new_cases",
        "new_deaths",
        "total_cases",
        "total_deaths",
        "price",
    ])?;
    for joined in rows {
        let o = &joined.row.observation;
        wtr.write_record([
            o.country.to_string(),
            o.date.to_string(),
            o.new_cases.to_string(),
            o.new_deaths.to_string(),
            joined.row.total_cases.to_string(),
            joined.row.total_deaths.to_string(),
            joined.price.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Create `path` (and its parents) and hand it to `write`.
pub fn to_file<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(File) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write(File::create(path)?)?;
    info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::accumulate::running_totals;
    use crate::analysis::reshape::WideSeries;
    use crate::data::loader::DataLoader;
    use crate::data::schema::SchemaVersion;
    use crate::data::{Observation, ObservationTable};
    use chrono::NaiveDate;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    #[test]
    fn test_write_frame_leaves_absent_cells_empty() {
        let table = ObservationTable::new(vec![
            Observation::new("DNK", date(3, 1), 1, 0),
            Observation::new("SWE", date(3, 2), 7, 1),
        ]);
        let wide = WideSeries::pivot(&table).unwrap();
        let mut out = Vec::new();
        write_frame(&wide, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "date,DNK cases,DNK deaths,SWE cases,SWE deaths\n\
             2020-03-01,1,0,,\n\
             2020-03-02,,,7,1\n"
        );
    }

    #[test]
    fn test_running_totals_reload_as_canonical() {
        let table = ObservationTable::new(vec![
            Observation::new("DNK", date(3, 1), 1, 0),
            Observation::new("DNK", date(3, 2), 2, 1),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/running_totals.csv");
        to_file(&path, |file| write_running_totals(&running_totals(&table), file)).unwrap();

        let reloaded = DataLoader::read_observations(File::open(&path).unwrap(), SchemaVersion::Auto).unwrap();
        assert_eq!(reloaded, table);
    }
}
