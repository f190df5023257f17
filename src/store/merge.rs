use std::collections::HashMap;

use crate::record::{AlertRecord, DedupKey, KeyField};

/// Concatenates `prior` and `fresh`, keeps the last occurrence of every
/// natural key, and sorts the result by `time_ms`.
///
/// Ties in `time_ms` keep their post-dedup order.
pub fn merge_dedup(
    prior: Vec<AlertRecord>,
    fresh: Vec<AlertRecord>,
    key: &[KeyField],
) -> Vec<AlertRecord> {
    let combined: Vec<AlertRecord> = prior.into_iter().chain(fresh).collect();
    let keys: Vec<DedupKey> = combined.iter().map(|r| r.dedup_key(key)).collect();

    let mut last_seen: HashMap<&DedupKey, usize> = HashMap::with_capacity(keys.len());
    for (idx, k) in keys.iter().enumerate() {
        last_seen.insert(k, idx);
    }

    let mut merged: Vec<AlertRecord> = combined
        .into_iter()
        .zip(keys.iter())
        .enumerate()
        .filter(|(idx, (_, k))| last_seen.get(k) == Some(idx))
        .map(|(_, (record, _))| record)
        .collect();

    merged.sort_by_key(|r| r.time_ms);
    merged
}

/// Drops every record older than `start_ms`.
pub fn trim(records: &mut Vec<AlertRecord>, start_ms: i64) -> usize {
    let before = records.len();
    records.retain(|r| r.time_ms >= start_ms);
    before - records.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const THEFT_KEY: &[KeyField] = &[KeyField::VehicleId, KeyField::TimeMs];
    const FILL_KEY: &[KeyField] = &[KeyField::Id];

    fn theft(vehicle: &str, ms: i64, ignored: bool) -> AlertRecord {
        let mut r = AlertRecord::at(ms).unwrap();
        r.vehicle_id = Some(vehicle.into());
        r.ignored = ignored;
        r
    }

    fn fill(id: &str, ms: i64, amount: f64) -> AlertRecord {
        let mut r = AlertRecord::at(ms).unwrap();
        r.id = Some(id.into());
        r.amount = Some(amount);
        r
    }

    #[test]
    fn test_last_write_wins() {
        let merged = merge_dedup(
            vec![theft("v1", 1_000, false), theft("v2", 500, false)],
            vec![theft("v1", 1_000, true)],
            THEFT_KEY,
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].vehicle_id.as_deref(), Some("v2"));
        assert!(merged[1].ignored);
    }

    #[test]
    fn test_same_vehicle_different_time_kept() {
        let merged = merge_dedup(
            vec![theft("v1", 1_000, false)],
            vec![theft("v1", 2_000, false)],
            THEFT_KEY,
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_id_key_ignores_time() {
        let merged = merge_dedup(
            vec![fill("f1", 1_000, 10.0)],
            vec![fill("f1", 1_005, 12.0)],
            FILL_KEY,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].amount, Some(12.0));
        assert_eq!(merged[0].time_ms, 1_005);
    }

    #[test]
    fn test_duplicates_within_fresh_collapse() {
        let merged = merge_dedup(
            vec![],
            vec![fill("f1", 1, 1.0), fill("f1", 1, 2.0), fill("f1", 1, 3.0)],
            FILL_KEY,
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].amount, Some(3.0));
    }

    #[test]
    fn test_keyless_records_dedup_on_whole_record() {
        let a = AlertRecord::at(1_000).unwrap();
        let merged = merge_dedup(vec![a.clone()], vec![a.clone()], FILL_KEY);
        assert_eq!(merged.len(), 1);

        let mut b = a.clone();
        b.amount = Some(1.0);
        let merged = merge_dedup(vec![a], vec![b], FILL_KEY);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_result_sorted_by_time() {
        let merged = merge_dedup(
            vec![theft("a", 3_000, false), theft("b", 1_000, false)],
            vec![theft("c", 2_000, false)],
            THEFT_KEY,
        );
        let times: Vec<i64> = merged.iter().map(|r| r.time_ms).collect();
        assert_eq!(times, vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn test_trim_drops_older_than_start() {
        let mut records = vec![
            theft("a", 999, false),
            theft("b", 1_000, false),
            theft("c", 5_000, false),
        ];
        assert_eq!(trim(&mut records, 1_000), 1);
        assert!(records.iter().all(|r| r.time_ms >= 1_000));
    }
}
