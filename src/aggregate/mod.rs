//! Rollups and summaries derived from raw alert tables.
//!
//! Nothing here is persisted; every view is recomputed from the current raw
//! tables so it can never disagree with them.

pub mod daily;
pub mod summary;
pub mod utility;

pub use daily::{DailyPoint, DailyRollup, Measure, daily_rollup};
pub use summary::{
    DataLossRow, DataLossSummary, FuelSummary, GasFuelShare, LossTypeCount, RegionLossCount,
    ReviewSummary, combined_data_loss_summary, data_loss_summary, data_loss_table, fuel_summary,
    gas_fuel_share, review_summary,
};
