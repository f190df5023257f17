//! Raw endpoint rows to canonical [`AlertRecord`]s.
//!
//! Normalization is applied exactly once, when rows arrive from the network.
//! Records read back from the cache are already canonical and are never
//! passed through here again.

mod classify;
mod literal;
mod time;
mod value;

pub use classify::{Classifier, Exclusion, Population, program_tags};
pub use literal::{loss_type_label, variation_max};

use serde_json::Value;
use tracing::debug;

use crate::config::{AmountUnit, Config, GALLON_CONVERSION, RegionConfig};
use crate::fetch::RawRow;
use crate::record::{AlertKind, AlertRecord};

/// Records of one kind, split by population.
#[derive(Debug, Default)]
pub struct Normalized {
    pub standard: Vec<AlertRecord>,
    pub off_highway: Vec<AlertRecord>,
    pub excluded: usize,
    pub unparseable: usize,
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    unit: AmountUnit,
    classifier: Classifier,
}

impl Normalizer {
    pub fn new(unit: AmountUnit, classifier: Classifier) -> Self {
        Self { unit, classifier }
    }

    pub fn for_region(config: &Config, region: &RegionConfig) -> Self {
        Self::new(
            region.unit,
            Classifier::new(&config.off_highway_types, &config.excluded_models),
        )
    }

    /// Normalizes and classifies `rows`.
    ///
    /// Off-highway records of a kind without an off-highway population are
    /// counted as excluded.
    pub fn normalize(&self, kind: AlertKind, rows: Vec<RawRow>) -> Normalized {
        let mut out = Normalized::default();

        for row in rows {
            let Some(record) = self.record(kind, row) else {
                out.unparseable += 1;
                continue;
            };

            match self.classifier.classify(
                record.vehicle_type.as_deref(),
                record.model.as_deref(),
                record.account_stage.as_deref(),
            ) {
                Population::Standard => out.standard.push(record),
                Population::OffHighway if kind.has_off_highway() => out.off_highway.push(record),
                Population::OffHighway | Population::Excluded(_) => out.excluded += 1,
            }
        }

        debug!(
            kind = %kind,
            standard = out.standard.len(),
            off_highway = out.off_highway.len(),
            excluded = out.excluded,
            unparseable = out.unparseable,
            "Rows normalized"
        );
        out
    }

    /// Converts one row. Returns `None` only when the row has no usable time.
    pub fn record(&self, kind: AlertKind, mut row: RawRow) -> Option<AlertRecord> {
        let (time, time_ms) = time::resolve(row.get("time")?)?;
        row.remove("time");
        row.remove("time_ms");

        let take_string = |row: &mut RawRow, key: &str| -> Option<String> {
            row.remove(key).as_ref().and_then(value::as_string)
        };

        let id = take_string(&mut row, "id");
        let vehicle_id = take_string(&mut row, "vehicle_id");
        let account_id = take_string(&mut row, "account_id");
        let vehicle_type = take_string(&mut row, "vehicle_type");
        let model = take_string(&mut row, "model");
        let account_stage = take_string(&mut row, "account_stage");

        let amount = self.canonical_amount(kind, &mut row);

        let ignored = kind
            .ignore_alias()
            .and_then(|alias| row.remove(alias))
            .is_some_and(|v| value::as_bool(&v));

        let program_tags = classify::program_tags(&row);

        let variation_max = row
            .remove("probable_variation")
            .and_then(|v| literal::variation_max(&v));

        let loss_type = match kind {
            AlertKind::DataLoss => Some(literal::loss_type_label(
                row.get("loss_meta").unwrap_or(&Value::Null),
            )),
            _ => None,
        };

        Some(AlertRecord {
            id,
            vehicle_id,
            account_id,
            time,
            time_ms,
            amount,
            vehicle_type,
            model,
            account_stage,
            ignored,
            program_tags,
            variation_max,
            loss_type,
            extra: row,
        })
    }

    fn canonical_amount(&self, kind: AlertKind, row: &mut RawRow) -> Option<f64> {
        let amount = row.remove("amount").as_ref().and_then(value::as_f64);
        match self.unit {
            AmountUnit::Liters => amount,
            AmountUnit::Gallons => amount.map(|a| a * GALLON_CONVERSION),
            AmountUnit::Kilograms => kind
                .mass_alias()
                .and_then(|alias| row.get(alias))
                .and_then(value::as_f64)
                .or(amount),
        }
    }
}
