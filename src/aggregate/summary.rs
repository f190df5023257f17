use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;

use super::daily::DailyRollup;
use super::utility::{pct, round2};
use crate::record::AlertRecord;

pub const UNKNOWN_LOSS_TYPE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LossTypeCount {
    #[serde(rename = "Data loss type")]
    pub loss_type: String,
    #[serde(rename = "Count")]
    pub count: usize,
}

/// Data-loss alerts counted by category, most frequent first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataLossSummary {
    pub rows: Vec<LossTypeCount>,
}

impl DataLossSummary {
    pub const COLUMNS: [&'static str; 2] = ["Data loss type", "Count"];

    pub fn total(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum()
    }
}

pub fn data_loss_summary(records: &[AlertRecord]) -> DataLossSummary {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts
            .entry(record.loss_type.as_deref().unwrap_or(UNKNOWN_LOSS_TYPE))
            .or_default() += 1;
    }

    let mut rows: Vec<LossTypeCount> = counts
        .into_iter()
        .map(|(loss_type, count)| LossTypeCount {
            loss_type: loss_type.to_string(),
            count,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.loss_type.cmp(&b.loss_type)));

    DataLossSummary { rows }
}

/// Per-alert row of the data-loss listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataLossRow {
    pub region: String,
    pub vehicle_id: Option<String>,
    pub time: NaiveDateTime,
    pub data_loss_type: String,
    pub account_id: Option<String>,
}

impl DataLossRow {
    pub const COLUMNS: [&'static str; 5] =
        ["region", "vehicle_id", "time", "data_loss_type", "account_id"];
}

pub fn data_loss_table(region: &str, records: &[AlertRecord]) -> Vec<DataLossRow> {
    records
        .iter()
        .map(|r| DataLossRow {
            region: region.to_string(),
            vehicle_id: r.vehicle_id.clone(),
            time: r.time,
            data_loss_type: r
                .loss_type
                .clone()
                .unwrap_or_else(|| UNKNOWN_LOSS_TYPE.to_string()),
            account_id: r.account_id.clone(),
        })
        .collect()
}

/// How many refill and theft alerts a human reviewer marked as ignored.
///
/// True-positive share is the non-ignored percentage; false-positive share
/// is the ignored percentage. Both are 0 when there are no alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ReviewSummary {
    pub ignored_refills: usize,
    pub total_refills: usize,
    pub true_positive_refill_pct: f64,
    pub false_positive_refill_pct: f64,
    pub ignored_thefts: usize,
    pub total_thefts: usize,
    pub true_positive_theft_pct: f64,
    pub false_positive_theft_pct: f64,
}

impl ReviewSummary {
    pub const COLUMNS: [&'static str; 8] = [
        "ignored_refills",
        "total_refills",
        "true_positive_refill_pct",
        "false_positive_refill_pct",
        "ignored_thefts",
        "total_thefts",
        "true_positive_theft_pct",
        "false_positive_theft_pct",
    ];
}

pub fn review_summary(fills: &[AlertRecord], thefts: &[AlertRecord]) -> ReviewSummary {
    let ignored_refills = fills.iter().filter(|r| r.ignored).count();
    let ignored_thefts = thefts.iter().filter(|r| r.ignored).count();

    ReviewSummary {
        ignored_refills,
        total_refills: fills.len(),
        true_positive_refill_pct: pct(fills.len() - ignored_refills, fills.len()),
        false_positive_refill_pct: pct(ignored_refills, fills.len()),
        ignored_thefts,
        total_thefts: thefts.len(),
        true_positive_theft_pct: pct(thefts.len() - ignored_thefts, thefts.len()),
        false_positive_theft_pct: pct(ignored_thefts, thefts.len()),
    }
}

/// Headline totals for one population.
///
/// Moving averages are the last day's expanding mean, truncated toward zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FuelSummary {
    pub total_theft: f64,
    pub total_refill: f64,
    pub theft_moving_average: i64,
    pub refill_moving_average: i64,
}

impl FuelSummary {
    pub const COLUMNS: [&'static str; 4] = [
        "total_theft",
        "total_refill",
        "theft_moving_average",
        "refill_moving_average",
    ];
}

pub fn fuel_summary(fill_daily: &DailyRollup, theft_daily: &DailyRollup) -> FuelSummary {
    let last_average = |rollup: &DailyRollup| {
        rollup
            .points
            .last()
            .map_or(0, |p| p.moving_average.trunc() as i64)
    };

    FuelSummary {
        total_theft: round2(theft_daily.values().iter().sum()),
        total_refill: round2(fill_daily.values().iter().sum()),
        theft_moving_average: last_average(theft_daily),
        refill_moving_average: last_average(fill_daily),
    }
}

pub const MASS_AMOUNT_COLUMN: &str = "Amount_kgs";

/// Share of LNG and CNG refills that report a mass-based amount.
///
/// A share is `None` when there are no refills of that fuel with an amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GasFuelShare {
    pub lng_pct: Option<f64>,
    pub cng_pct: Option<f64>,
}

impl GasFuelShare {
    pub const COLUMNS: [&'static str; 2] = ["lng_pct", "cng_pct"];
}

pub fn gas_fuel_share(fills: &[AlertRecord]) -> GasFuelShare {
    let share = |fuel: &str| {
        let of_fuel = fills.iter().filter(|r| {
            r.extra
                .get("fuel_type")
                .and_then(|v| v.as_str())
                .is_some_and(|t| t.eq_ignore_ascii_case(fuel))
        });

        let (mut total, mut with_mass) = (0, 0);
        for r in of_fuel {
            if r.amount.is_some() {
                total += 1;
            }
            if r.extra.get(MASS_AMOUNT_COLUMN).is_some_and(|v| !v.is_null()) {
                with_mass += 1;
            }
        }
        (total > 0).then(|| pct(with_mass, total))
    };

    GasFuelShare {
        lng_pct: share("lng"),
        cng_pct: share("cng"),
    }
}

/// Data-loss counts of one region, as a row of the cross-region table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionLossCount {
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Data loss type")]
    pub loss_type: String,
    #[serde(rename = "Count")]
    pub count: usize,
}

impl RegionLossCount {
    pub const COLUMNS: [&'static str; 3] = ["Region", "Data loss type", "Count"];
}

/// Concatenates each region's data-loss summary, in the given region order.
pub fn combined_data_loss_summary<'a, I>(summaries: I) -> Vec<RegionLossCount>
where
    I: IntoIterator<Item = (&'a str, &'a DataLossSummary)>,
{
    summaries
        .into_iter()
        .flat_map(|(region, summary)| {
            summary.rows.iter().map(move |row| RegionLossCount {
                region: region.to_string(),
                loss_type: row.loss_type.clone(),
                count: row.count,
            })
        })
        .collect()
}
