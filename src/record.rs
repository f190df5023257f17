//! Canonical alert records and the per-table natural keys used to dedupe them.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The four alert streams each region reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Theft,
    Fill,
    LowFuel,
    DataLoss,
}

impl AlertKind {
    pub const ALL: [AlertKind; 4] = [
        AlertKind::Theft,
        AlertKind::Fill,
        AlertKind::LowFuel,
        AlertKind::DataLoss,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Theft => "theft",
            AlertKind::Fill => "fill",
            AlertKind::LowFuel => "low_fuel",
            AlertKind::DataLoss => "data_loss",
        }
    }

    /// Backend field the time-range filter is applied to.
    pub fn timestamp_field(&self) -> &'static str {
        match self {
            AlertKind::Theft => "alert_fuel_theft.timestamp",
            AlertKind::Fill => "alert_fuel_filling.timestamp",
            AlertKind::LowFuel => "alert_fuel_low_level.timestamp",
            AlertKind::DataLoss => "alert_data_loss.timestamp",
        }
    }

    /// Column alias carrying the human-reviewer ignore flag, if the kind has one.
    pub fn ignore_alias(&self) -> Option<&'static str> {
        match self {
            AlertKind::Theft => Some("alert_fuel_theft_ignore"),
            AlertKind::Fill => Some("alert_fuel_filling_ignore"),
            _ => None,
        }
    }

    /// Column alias carrying the mass-based amount, if the kind has one.
    pub fn mass_alias(&self) -> Option<&'static str> {
        match self {
            AlertKind::Theft => Some("amount_in_kgs"),
            AlertKind::Fill => Some("Amount_kgs"),
            _ => None,
        }
    }

    /// Whether the kind is split into standard and off-highway populations.
    pub fn has_off_highway(&self) -> bool {
        matches!(self, AlertKind::Theft | AlertKind::Fill)
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Program-membership flags detected from vehicle and spec tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramTag {
    Usfs,
    Cusfs,
}

impl ProgramTag {
    pub const VOCABULARY: [ProgramTag; 2] = [ProgramTag::Usfs, ProgramTag::Cusfs];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramTag::Usfs => "usfs",
            ProgramTag::Cusfs => "cusfs",
        }
    }
}

/// One theft, refill, low-fuel or data-loss event.
///
/// `time` and `time_ms` always describe the same instant; `time_ms` is the
/// key used for sorting, trimming and deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    pub time: NaiveDateTime,
    pub time_ms: i64,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub account_stage: Option<String>,
    #[serde(default)]
    pub ignored: bool,
    #[serde(default)]
    pub program_tags: Option<Vec<ProgramTag>>,
    #[serde(default)]
    pub variation_max: Option<f64>,
    #[serde(default)]
    pub loss_type: Option<String>,
    /// Remaining projected columns, kept verbatim for display.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AlertRecord {
    /// Builds a record at `time_ms` with every optional field empty.
    ///
    /// Returns `None` if `time_ms` is outside chrono's representable range.
    pub fn at(time_ms: i64) -> Option<Self> {
        let time = naive_from_ms(time_ms)?;
        Some(Self {
            id: None,
            vehicle_id: None,
            account_id: None,
            time,
            time_ms,
            amount: None,
            vehicle_type: None,
            model: None,
            account_stage: None,
            ignored: false,
            program_tags: None,
            variation_max: None,
            loss_type: None,
            extra: Map::new(),
        })
    }

    /// `None` tags never match.
    pub fn has_program_tag(&self) -> bool {
        self.program_tags
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|t| ProgramTag::VOCABULARY.contains(t)))
    }

    /// Re-derives `time` from `time_ms` so the two can never drift apart.
    pub fn resync_time(&mut self) -> bool {
        match naive_from_ms(self.time_ms) {
            Some(time) => {
                self.time = time;
                true
            }
            None => false,
        }
    }

    /// Identity used by the merge step.
    ///
    /// Falls back to the whole serialized record when any key field is
    /// missing, so exact duplicates still collapse.
    pub fn dedup_key(&self, fields: &[KeyField]) -> DedupKey {
        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            let part = match field {
                KeyField::Id => self.id.clone(),
                KeyField::VehicleId => self.vehicle_id.clone(),
                KeyField::TimeMs => Some(self.time_ms.to_string()),
            };
            match part {
                Some(p) => parts.push(p),
                None => return DedupKey::Whole(serde_json::to_string(self).unwrap_or_default()),
            }
        }
        DedupKey::Natural(parts)
    }
}

pub(crate) fn naive_from_ms(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc())
}

/// Field that participates in a table's natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyField {
    Id,
    VehicleId,
    TimeMs,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Natural(Vec<String>),
    Whole(String),
}
