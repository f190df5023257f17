//! Per-region refresh cycle and the views handed to the dashboard.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::aggregate::{
    DailyRollup, DataLossRow, DataLossSummary, FuelSummary, GasFuelShare, Measure,
    RegionLossCount, ReviewSummary, combined_data_loss_summary, daily_rollup, data_loss_summary,
    data_loss_table, fuel_summary, gas_fuel_share, review_summary,
};
use crate::config::{Config, RegionConfig};
use crate::fetch::{BatchOptions, FetchFailure, HttpClient, fetch_batches};
use crate::normalize::Normalizer;
use crate::record::{AlertKind, AlertRecord};
use crate::store::{CacheStore, CommitStats, RegionTables, RetentionWindow};
use crate::timerange::TimeRange;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub retention_days: i64,
    pub freshness_offset_days: i64,
    pub batch: BatchOptions,
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            retention_days: config.retention_days,
            freshness_offset_days: config.freshness_offset_days,
            batch: BatchOptions {
                window_width_ms: config.batch_width_ms(),
                max_in_flight: config.max_workers,
            },
        }
    }
}

/// Result of one region's refresh cycle.
#[derive(Debug)]
pub struct RegionRun {
    pub region: String,
    pub window: RetentionWindow,
    /// Range requested from the endpoint, `None` when the cache was current.
    pub fetched: Option<TimeRange>,
    pub tables: RegionTables,
    pub failures: Vec<FetchFailure>,
    pub stats: CommitStats,
}

impl RegionRun {
    pub fn views(&self) -> RegionViews {
        RegionViews::derive(&self.region, &self.tables)
    }
}

/// Fetches the delta since the region's checkpoint, merges it into the cache
/// and returns the region's full raw tables.
///
/// Failed sub-windows are returned in [`RegionRun::failures`]. The checkpoint
/// then stops just short of the earliest failed sub-window so the next run
/// retries it. Only cache I/O errors are returned as `Err`.
#[tracing::instrument(skip_all, fields(region = %region.name))]
pub async fn refresh_region<C>(
    store: &CacheStore,
    client: Arc<C>,
    region: &RegionConfig,
    normalizer: &Normalizer,
    opts: &PipelineOptions,
    now: DateTime<Utc>,
) -> Result<RegionRun>
where
    C: HttpClient + ?Sized + 'static,
{
    let region_store = store.region(&region.name);
    let window = RetentionWindow::at(now, opts.retention_days, opts.freshness_offset_days);
    let range = window.fetch_range(region_store.load_checkpoint());

    let mut fresh = RegionTables::default();
    let mut failures = Vec::new();
    let fetched = if range.is_empty() {
        info!("Cache is current, nothing to fetch");
        None
    } else {
        info!(start_ms = range.start_ms, end_ms = range.end_ms, "Fetching delta");
        let mut outcome =
            fetch_batches(client, &region.url, &AlertKind::ALL, range, &opts.batch).await;

        for kind in AlertKind::ALL {
            let normalized = normalizer.normalize(kind, outcome.take_rows(kind));
            match kind {
                AlertKind::Theft => {
                    fresh.theft = normalized.standard;
                    fresh.theft_off_highway = normalized.off_highway;
                }
                AlertKind::Fill => {
                    fresh.fill = normalized.standard;
                    fresh.fill_off_highway = normalized.off_highway;
                }
                AlertKind::LowFuel => fresh.low_fuel = normalized.standard,
                AlertKind::DataLoss => fresh.data_loss = normalized.standard,
            }
        }
        failures = outcome.failures;
        Some(range)
    };

    let fetched_through_ms = failures
        .iter()
        .map(|f| f.window.start_ms - 1)
        .min()
        .unwrap_or(window.end_ms);

    let (tables, stats) = region_store.commit(fresh, window, fetched_through_ms)?;

    Ok(RegionRun {
        region: region.name.clone(),
        window,
        fetched,
        tables,
        failures,
        stats,
    })
}

/// Outcome of refreshing every configured region.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub runs: Vec<RegionRun>,
    /// Regions whose cache could not be committed.
    pub errors: Vec<(String, anyhow::Error)>,
}

impl RefreshReport {
    /// Number of sub-window requests that failed across all regions.
    pub fn failed_requests(&self) -> usize {
        self.runs.iter().map(|r| r.failures.len()).sum()
    }

    /// Data-loss counts of every refreshed region in one table.
    pub fn combined_data_loss_summary(&self) -> Vec<RegionLossCount> {
        let summaries: Vec<(&str, DataLossSummary)> = self
            .runs
            .iter()
            .map(|run| (run.region.as_str(), data_loss_summary(&run.tables.data_loss)))
            .collect();
        combined_data_loss_summary(summaries.iter().map(|(region, s)| (*region, s)))
    }

    /// Partial-failure notice for the dashboard, if anything failed.
    pub fn banner(&self) -> Option<String> {
        match self.failed_requests() {
            0 => None,
            n => Some(format!(
                "{n} API requests failed. Some data may be missing in the dashboard."
            )),
        }
    }
}

/// Refreshes every configured region in turn. A region whose cache cannot be
/// written is logged and reported; the remaining regions still run.
pub async fn refresh_all<C>(config: &Config, client: Arc<C>, now: DateTime<Utc>) -> RefreshReport
where
    C: HttpClient + ?Sized + 'static,
{
    let store = CacheStore::new(&config.cache_dir);
    let opts = PipelineOptions::from(config);
    let mut report = RefreshReport::default();

    for region in &config.regions {
        let normalizer = Normalizer::for_region(config, region);
        match refresh_region(&store, client.clone(), region, &normalizer, &opts, now).await {
            Ok(run) => report.runs.push(run),
            Err(e) => {
                error!(region = %region.name, error = %format!("{e:#}"), "Region refresh failed");
                report.errors.push((region.name.clone(), e));
            }
        }
    }

    report
}

/// Record subsets the dashboard charts separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subset {
    All,
    /// Records carrying a program tag.
    ProgramTagged,
    /// Records with an extracted variation magnitude.
    WithVariation,
}

impl Subset {
    pub fn matches(&self, record: &AlertRecord) -> bool {
        match self {
            Subset::All => true,
            Subset::ProgramTagged => record.has_program_tag(),
            Subset::WithVariation => record.variation_max.is_some(),
        }
    }

    pub fn select<'a>(&self, records: &'a [AlertRecord]) -> Vec<&'a AlertRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Every table the dashboard draws for one region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionViews {
    pub region: String,
    pub theft_daily: DailyRollup,
    pub fill_daily: DailyRollup,
    pub low_fuel_daily: DailyRollup,
    pub theft_off_highway_daily: DailyRollup,
    pub fill_off_highway_daily: DailyRollup,
    pub theft_tagged_daily: DailyRollup,
    pub fill_tagged_daily: DailyRollup,
    pub theft_variation_daily: DailyRollup,
    pub fill_variation_daily: DailyRollup,
    pub data_loss_summary: DataLossSummary,
    pub data_loss_table: Vec<DataLossRow>,
    pub review: ReviewSummary,
    pub review_off_highway: ReviewSummary,
    pub fuel_summary: FuelSummary,
    pub fuel_summary_off_highway: FuelSummary,
    pub gas_fuel_share: GasFuelShare,
}

impl RegionViews {
    /// Derives every view from `tables`. This is the only place views are
    /// built, whether from a full refresh or a date-range slice.
    pub fn derive(region: &str, tables: &RegionTables) -> Self {
        let rollup = |records: &[AlertRecord], subset: Subset, measure: Measure| {
            daily_rollup(subset.select(records), measure)
        };

        let theft_daily = rollup(&tables.theft, Subset::All, Measure::Amount);
        let fill_daily = rollup(&tables.fill, Subset::All, Measure::Amount);
        let theft_off_highway_daily = rollup(&tables.theft_off_highway, Subset::All, Measure::Amount);
        let fill_off_highway_daily = rollup(&tables.fill_off_highway, Subset::All, Measure::Amount);

        Self {
            region: region.to_string(),
            fuel_summary: fuel_summary(&fill_daily, &theft_daily),
            fuel_summary_off_highway: fuel_summary(&fill_off_highway_daily, &theft_off_highway_daily),
            gas_fuel_share: gas_fuel_share(&tables.fill),
            theft_daily,
            fill_daily,
            low_fuel_daily: rollup(&tables.low_fuel, Subset::All, Measure::Count),
            theft_off_highway_daily,
            fill_off_highway_daily,
            theft_tagged_daily: rollup(&tables.theft, Subset::ProgramTagged, Measure::Amount),
            fill_tagged_daily: rollup(&tables.fill, Subset::ProgramTagged, Measure::Amount),
            theft_variation_daily: rollup(&tables.theft, Subset::WithVariation, Measure::Variation),
            fill_variation_daily: rollup(&tables.fill, Subset::WithVariation, Measure::Variation),
            data_loss_summary: data_loss_summary(&tables.data_loss),
            data_loss_table: data_loss_table(region, &tables.data_loss),
            review: review_summary(&tables.fill, &tables.theft),
            review_off_highway: review_summary(&tables.fill_off_highway, &tables.theft_off_highway),
        }
    }

    /// Views restricted to `start_ms <= time_ms <= end_ms`.
    pub fn derive_within(region: &str, tables: &RegionTables, start_ms: i64, end_ms: i64) -> Self {
        Self::derive(region, &tables.within(start_ms, end_ms))
    }

    /// Named daily rollups, in display order.
    pub fn rollups(&self) -> [(&'static str, &DailyRollup); 9] {
        [
            ("theft_daily", &self.theft_daily),
            ("fill_daily", &self.fill_daily),
            ("low_fuel_daily", &self.low_fuel_daily),
            ("theft_off_highway_daily", &self.theft_off_highway_daily),
            ("fill_off_highway_daily", &self.fill_off_highway_daily),
            ("theft_tagged_daily", &self.theft_tagged_daily),
            ("fill_tagged_daily", &self.fill_tagged_daily),
            ("theft_variation_daily", &self.theft_variation_daily),
            ("fill_variation_daily", &self.fill_variation_daily),
        ]
    }
}
