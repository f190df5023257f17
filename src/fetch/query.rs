//! JSON query payloads for the dashboard fetch endpoint.
//!
//! Each payload carries a `report`, a `filter` restricting the alert's
//! timestamp to one sub-window, and a `select` map projecting backend fields
//! onto column aliases.

use serde_json::{Map, Value, json};

use crate::record::AlertKind;
use crate::timerange::TimeRange;

const THEFT_SELECT: &[(&str, &str)] = &[
    ("vehicle.id", "vehicle_id"),
    ("account.id", "account_id"),
    ("vehicle.tag", "tag"),
    ("vehicle.vin", "vin"),
    ("account.display_name", "account_name"),
    ("alert_fuel_theft.ignore", "alert_fuel_theft_ignore"),
    ("alert_fuel_theft.ignore_reasons", "ignore_reasons"),
    ("alert_fuel_theft.timestamp", "time"),
    ("alert_fuel_theft.amount", "amount"),
    ("alert_fuel_theft.amount_in_kgs", "amount_in_kgs"),
    ("alert_fuel_theft.probable_variation", "probable_variation"),
    ("spec.manufacturer", "spec_manufacturer"),
    ("spec.model", "model"),
    ("spec.fuel_capacity", "fuel_capacity"),
    ("spec.id", "spec_id"),
    ("spec.vehicle_type", "vehicle_type"),
    ("spec.fuel_type", "fuel_type"),
    ("spec.emmission_standard", "emission_standard"),
    ("spec.max_load_capacity", "max_load_capacity"),
    ("account.stage", "account_stage"),
    ("vehicle.tags", "vehicle tags"),
    ("spec.tags", "spec tags"),
];

const FILL_SELECT: &[(&str, &str)] = &[
    ("vehicle.id", "vehicle_id"),
    ("account.id", "account_id"),
    ("vehicle.tag", "tag"),
    ("vehicle.vin", "vin"),
    ("account.display_name", "account_name"),
    ("alert_fuel_filling.timestamp", "time"),
    ("alert_fuel_filling.id", "id"),
    ("alert_fuel_filling.amount", "amount"),
    ("alert_fuel_filling.amount_in_kgs", "Amount_kgs"),
    ("alert_fuel_filling.ignore", "alert_fuel_filling_ignore"),
    ("alert_fuel_filling.probable_variation", "probable_variation"),
    ("alert_fuel_filling.ignore_reasons", "ignore_reasons"),
    ("spec.manufacturer", "manufacturer"),
    ("spec.vehicle_type", "vehicle_type"),
    ("spec.fuel_type", "fuel_type"),
    ("spec.model", "model"),
    ("spec.fuel_capacity", "fuel_capacity"),
    ("spec.emmission_standard", "emission_standard"),
    ("account.stage", "account_stage"),
    ("vehicle.tags", "vehicle tags"),
    ("spec.tags", "spec tags"),
];

const LOW_FUEL_SELECT: &[(&str, &str)] = &[
    ("alert_fuel_low_level.id", "id"),
    ("alert_fuel_low_level.timestamp", "time"),
    ("alert_fuel_low_level.fuel_level", "fuel_level"),
    ("alert_fuel_low_level.vehicle_id", "vehicle_id"),
    ("alert_fuel_low_level.account_id", "account_id"),
    ("alert_fuel_low_level.type", "type"),
];

const DATA_LOSS_SELECT: &[(&str, &str)] = &[
    ("alert_data_loss.vehicle_id", "vehicle_id"),
    ("alert_data_loss.timestamp", "time"),
    ("alert_data_loss.account_id", "account_id"),
    ("alert_data_loss.loss_meta", "loss_meta"),
];

fn select_fields(kind: AlertKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        AlertKind::Theft => THEFT_SELECT,
        AlertKind::Fill => FILL_SELECT,
        AlertKind::LowFuel => LOW_FUEL_SELECT,
        AlertKind::DataLoss => DATA_LOSS_SELECT,
    }
}

/// Builds the query for `kind` restricted to `window`.
///
/// The backend only offers exclusive bounds, so `[start, end)` is sent as
/// `gt: start - 1, lt: end`.
pub fn build(kind: AlertKind, window: TimeRange) -> Value {
    let timestamp_field = kind.timestamp_field();

    let mut select = Map::new();
    for (field, alias) in select_fields(kind) {
        let mut projection = json!({ "value": true, "as": alias });
        if *field == timestamp_field {
            projection["time_format"] = json!("epoch_ms");
        }
        select.insert((*field).to_string(), projection);
    }

    json!({
        "report": "default",
        "filter": [
            {
                timestamp_field: {
                    "gt": window.start_ms - 1,
                    "lt": window.end_ms
                }
            }
        ],
        "select": select
    })
}

/// Recovers the alert kind and window from a query built by [`build`].
pub fn describe(query: &Value) -> Option<(AlertKind, TimeRange)> {
    let filter = query.get("filter")?.get(0)?.as_object()?;
    let (field, bounds) = filter.iter().next()?;
    let kind = AlertKind::ALL
        .into_iter()
        .find(|k| k.timestamp_field() == field)?;
    let start_ms = bounds.get("gt")?.as_i64()? + 1;
    let end_ms = bounds.get("lt")?.as_i64()?;
    Some((kind, TimeRange::new(start_ms, end_ms)))
}
