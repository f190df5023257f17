use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::record::ProgramTag;

pub const VEHICLE_TAGS: &str = "vehicle tags";
pub const SPEC_TAGS: &str = "spec tags";

/// Which population a record belongs to after the exclusion filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Population {
    Standard,
    OffHighway,
    Excluded(Exclusion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    ClosedAccount,
    ExcludedModel,
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    off_highway_types: HashSet<String>,
    excluded_models: HashSet<String>,
}

impl Classifier {
    pub fn new<S: AsRef<str>>(off_highway_types: &[S], excluded_models: &[S]) -> Self {
        Self {
            off_highway_types: off_highway_types
                .iter()
                .map(|s| s.as_ref().to_string())
                .collect(),
            excluded_models: excluded_models
                .iter()
                .map(|s| s.as_ref().to_string())
                .collect(),
        }
    }

    /// Missing fields never exclude a record. Off-highway records are still
    /// subject to the closed-account and model filters.
    pub fn classify(
        &self,
        vehicle_type: Option<&str>,
        model: Option<&str>,
        account_stage: Option<&str>,
    ) -> Population {
        if account_stage.is_some_and(|s| s.trim().eq_ignore_ascii_case("closed")) {
            return Population::Excluded(Exclusion::ClosedAccount);
        }
        if model.is_some_and(|m| self.excluded_models.contains(m)) {
            return Population::Excluded(Exclusion::ExcludedModel);
        }
        if vehicle_type.is_some_and(|t| self.off_highway_types.contains(t)) {
            return Population::OffHighway;
        }
        Population::Standard
    }
}

/// Detects program tags from the vehicle-level and spec-level tag columns.
///
/// List cells are taken item by item; string cells are whitespace-split.
/// Returns `None`, not an empty list, when nothing matches.
pub fn program_tags(row: &Map<String, Value>) -> Option<Vec<ProgramTag>> {
    let mut seen: Vec<String> = Vec::new();
    for column in [VEHICLE_TAGS, SPEC_TAGS] {
        match row.get(column) {
            Some(Value::Array(items)) => seen.extend(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.trim().to_lowercase()),
            ),
            Some(Value::String(s)) => {
                seen.extend(s.to_lowercase().split_whitespace().map(str::to_string))
            }
            _ => {}
        }
    }

    let tags: Vec<ProgramTag> = ProgramTag::VOCABULARY
        .into_iter()
        .filter(|tag| seen.iter().any(|s| s == tag.as_str()))
        .collect();

    (!tags.is_empty()).then_some(tags)
}
