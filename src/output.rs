//! CSV persistence for dashboard views and the per-run log.
//!
//! Every export writes its header row explicitly, so empty tables still carry
//! their column names.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::aggregate::{
    DailyRollup, DataLossRow, DataLossSummary, FuelSummary, GasFuelShare, RegionLossCount,
    ReviewSummary, combined_data_loss_summary,
};
use crate::pipeline::{RegionRun, RegionViews};

fn create(path: &Path) -> Result<Writer<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating export directory {}", parent.display()))?;
    }
    WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))
}

/// Writes `rows` under the fixed `columns` header.
pub fn write_rows<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> Result<()> {
    let mut writer = create(path)?;
    writer.write_record(columns)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = rows.len(), "CSV written");
    Ok(())
}

pub fn write_rollup(path: &Path, rollup: &DailyRollup) -> Result<()> {
    let mut writer = create(path)?;
    writer.write_record(rollup.columns())?;
    for point in &rollup.points {
        writer.write_record([
            point.time.format("%Y-%m-%d").to_string(),
            point.value.to_string(),
            point.moving_average.to_string(),
        ])?;
    }
    writer.flush()?;
    debug!(path = %path.display(), rows = rollup.len(), "Rollup written");
    Ok(())
}

pub fn write_data_loss_summary(path: &Path, summary: &DataLossSummary) -> Result<()> {
    write_rows(path, &DataLossSummary::COLUMNS, &summary.rows)
}

pub fn write_data_loss_table(path: &Path, rows: &[DataLossRow]) -> Result<()> {
    write_rows(path, &DataLossRow::COLUMNS, rows)
}

pub fn write_review(path: &Path, review: &ReviewSummary) -> Result<()> {
    write_rows(path, &ReviewSummary::COLUMNS, std::slice::from_ref(review))
}

pub fn write_fuel_summary(path: &Path, summary: &FuelSummary) -> Result<()> {
    write_rows(path, &FuelSummary::COLUMNS, std::slice::from_ref(summary))
}

pub fn write_gas_fuel_share(path: &Path, share: &GasFuelShare) -> Result<()> {
    write_rows(path, &GasFuelShare::COLUMNS, std::slice::from_ref(share))
}

/// Writes the data-loss counts of all `views` into one `Region, Data loss
/// type, Count` table at `<dir>/combined_data_loss_summary.csv`.
pub fn write_combined_data_loss(dir: &Path, views: &[RegionViews]) -> Result<PathBuf> {
    let rows = combined_data_loss_summary(
        views
            .iter()
            .map(|v| (v.region.as_str(), &v.data_loss_summary)),
    );
    let path = dir.join("combined_data_loss_summary.csv");
    write_rows(&path, &RegionLossCount::COLUMNS, &rows)?;
    Ok(path)
}

/// Writes every view of one region under `<dir>/<region>/` and returns the
/// files written.
#[tracing::instrument(skip(views), fields(region = %views.region))]
pub fn write_region_exports(dir: &Path, views: &RegionViews) -> Result<Vec<PathBuf>> {
    let region_dir = dir.join(&views.region);
    let mut written = Vec::new();

    for (name, rollup) in views.rollups() {
        let path = region_dir.join(format!("{name}.csv"));
        write_rollup(&path, rollup)?;
        written.push(path);
    }

    let path = region_dir.join("data_loss_summary.csv");
    write_data_loss_summary(&path, &views.data_loss_summary)?;
    written.push(path);

    let path = region_dir.join("data_loss_table.csv");
    write_data_loss_table(&path, &views.data_loss_table)?;
    written.push(path);

    let path = region_dir.join("review.csv");
    write_review(&path, &views.review)?;
    written.push(path);

    let path = region_dir.join("review_off_highway.csv");
    write_review(&path, &views.review_off_highway)?;
    written.push(path);

    let path = region_dir.join("fuel_summary.csv");
    write_fuel_summary(&path, &views.fuel_summary)?;
    written.push(path);

    let path = region_dir.join("fuel_summary_off_highway.csv");
    write_fuel_summary(&path, &views.fuel_summary_off_highway)?;
    written.push(path);

    let path = region_dir.join("gas_fuel_share.csv");
    write_gas_fuel_share(&path, &views.gas_fuel_share)?;
    written.push(path);

    info!(files = written.len(), dir = %region_dir.display(), "Region exported");
    Ok(written)
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub region: String,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    pub fetched_start_ms: Option<i64>,
    pub fetched_end_ms: Option<i64>,
    pub fresh_rows: usize,
    pub kept_rows: usize,
    pub trimmed_rows: usize,
    pub failed_requests: usize,
}

impl RunSummary {
    pub fn from_run(timestamp: DateTime<Utc>, run: &RegionRun) -> Self {
        Self {
            timestamp,
            region: run.region.clone(),
            window_start_ms: run.window.start_ms,
            window_end_ms: run.window.end_ms,
            fetched_start_ms: run.fetched.map(|r| r.start_ms),
            fetched_end_ms: run.fetched.map(|r| r.end_ms),
            fresh_rows: run.stats.fresh,
            kept_rows: run.stats.kept,
            trimmed_rows: run.stats.trimmed,
            failed_requests: run.failures.len(),
        }
    }
}

/// Appends a [`RunSummary`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &Path, summary: &RunSummary) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending run log record");

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // only on a fresh file
        .from_writer(file);

    writer.serialize(summary)?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Measure, daily_rollup};
    use crate::record::AlertRecord;
    use crate::store::{CommitStats, DAY_MS, RegionTables, RetentionWindow};
    use std::fs;

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_empty_rollup_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theft_daily.csv");
        write_rollup(&path, &DailyRollup::empty(Measure::Amount)).unwrap();
        assert_eq!(lines(&path), vec!["time,amount,moving average"]);
    }

    #[test]
    fn test_rollup_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("low_fuel_daily.csv");
        let records: Vec<AlertRecord> = [0, 2]
            .iter()
            .map(|d| AlertRecord::at(d * DAY_MS).unwrap())
            .collect();
        write_rollup(&path, &daily_rollup(&records, Measure::Count)).unwrap();

        assert_eq!(
            lines(&path),
            vec![
                "time,count,moving average",
                "1970-01-01,1,1",
                "1970-01-02,0,0.5",
                "1970-01-03,1,0.6666666666666666",
            ]
        );
    }

    #[test]
    fn test_empty_summaries_keep_headers() {
        let dir = tempfile::tempdir().unwrap();
        let summary = dir.path().join("summary.csv");
        let table = dir.path().join("table.csv");
        write_data_loss_summary(&summary, &DataLossSummary::default()).unwrap();
        write_data_loss_table(&table, &[]).unwrap();

        assert_eq!(lines(&summary), vec!["Data loss type,Count"]);
        assert_eq!(
            lines(&table),
            vec!["region,vehicle_id,time,data_loss_type,account_id"]
        );
    }

    #[test]
    fn test_review_is_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("review.csv");
        write_review(&path, &ReviewSummary::default()).unwrap();
        let content = lines(&path);
        assert_eq!(content.len(), 2);
        assert!(content[0].starts_with("ignored_refills,total_refills"));
    }

    #[test]
    fn test_region_export_writes_every_view() {
        let dir = tempfile::tempdir().unwrap();
        let views = RegionViews::derive("EU", &RegionTables::default());
        let written = write_region_exports(dir.path(), &views).unwrap();

        assert_eq!(written.len(), 16);
        assert!(written.iter().all(|p| p.starts_with(dir.path().join("EU"))));
        assert!(written.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_single_row_summaries() {
        let dir = tempfile::tempdir().unwrap();
        let fuel = dir.path().join("fuel_summary.csv");
        let share = dir.path().join("gas_fuel_share.csv");
        write_fuel_summary(
            &fuel,
            &FuelSummary {
                total_theft: 30.25,
                total_refill: 7.0,
                theft_moving_average: 10,
                refill_moving_average: 7,
            },
        )
        .unwrap();
        write_gas_fuel_share(
            &share,
            &GasFuelShare {
                lng_pct: Some(33.33),
                cng_pct: None,
            },
        )
        .unwrap();

        assert_eq!(
            lines(&fuel),
            vec![
                "total_theft,total_refill,theft_moving_average,refill_moving_average",
                "30.25,7.0,10,7",
            ]
        );
        assert_eq!(lines(&share), vec!["lng_pct,cng_pct", "33.33,"]);
    }

    #[test]
    fn test_combined_data_loss_export() {
        let dir = tempfile::tempdir().unwrap();
        let mut tables = RegionTables::default();
        let mut loss = AlertRecord::at(0).unwrap();
        loss.loss_type = Some("Gps loss".into());
        tables.data_loss = vec![loss];

        let views = vec![
            RegionViews::derive("IND", &tables),
            RegionViews::derive("EU", &RegionTables::default()),
        ];
        let path = write_combined_data_loss(dir.path(), &views).unwrap();

        assert_eq!(lines(&path), vec!["Region,Data loss type,Count", "IND,Gps loss,1"]);

        let empty = write_combined_data_loss(dir.path(), &[]).unwrap();
        assert_eq!(lines(&empty), vec!["Region,Data loss type,Count"]);
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.csv");
        let run = RegionRun {
            region: "EU".into(),
            window: RetentionWindow {
                start_ms: 0,
                end_ms: DAY_MS,
            },
            fetched: None,
            tables: RegionTables::default(),
            failures: Vec::new(),
            stats: CommitStats::default(),
        };
        let summary = RunSummary::from_run(Utc::now(), &run);

        append_record(&path, &summary).unwrap();
        append_record(&path, &summary).unwrap();

        let content = lines(&path);
        assert_eq!(content.len(), 3);
        assert_eq!(content.iter().filter(|l| l.starts_with("timestamp")).count(), 1);
    }
}
