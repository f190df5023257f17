//! Per-region on-disk cache: raw tables plus a fetch checkpoint.
//!
//! Layout:
//!
//! ```text
//! <root>/<REGION>/theft.jsonl
//! <root>/<REGION>/fill.jsonl
//! <root>/<REGION>/low_fuel.jsonl
//! <root>/<REGION>/data_loss.jsonl
//! <root>/<REGION>/theft_off_highway.jsonl
//! <root>/<REGION>/fill_off_highway.jsonl
//! <root>/<REGION>/checkpoint.json
//! ```
//!
//! Every file is replaced atomically. The checkpoint is always written last,
//! so a run that dies mid-persist refetches an overlapping range next time
//! instead of skipping one.

mod checkpoint;
mod fsutil;
mod jsonl;
mod merge;
mod table;
mod window;

pub use checkpoint::Checkpoint;
pub use jsonl::{read_table, write_table};
pub use merge::{merge_dedup, trim};
pub use table::{RegionTables, Table, TableSpec};
pub use window::{DAY_MS, RetentionWindow};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn region(&self, name: &str) -> RegionStore {
        RegionStore {
            name: name.to_string(),
            dir: self.root.join(name),
        }
    }
}

/// Cache files of a single region. Assumes a single writer per region.
#[derive(Debug, Clone)]
pub struct RegionStore {
    name: String,
    dir: PathBuf,
}

/// Row counts from one merge cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub prior: usize,
    pub fresh: usize,
    pub kept: usize,
    pub trimmed: usize,
}

impl RegionStore {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self, table: Table) -> PathBuf {
        self.dir.join(table.file_name())
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.dir.join("checkpoint.json")
    }

    pub fn load_checkpoint(&self) -> Option<i64> {
        checkpoint::load(&self.checkpoint_path())
    }

    pub fn load_tables(&self) -> RegionTables {
        let mut tables = RegionTables::default();
        for table in Table::ALL {
            *tables.get_mut(table) = read_table(&self.table_path(table));
        }
        tables
    }

    /// Merges `fresh` into the persisted tables, trims to `window`, rewrites
    /// every table, and finally advances the checkpoint to `fetched_through_ms`.
    ///
    /// The checkpoint never moves backwards: it becomes the later of its
    /// previous value and `fetched_through_ms`.
    #[tracing::instrument(skip(self, fresh, window), fields(region = %self.name))]
    pub fn commit(
        &self,
        mut fresh: RegionTables,
        window: RetentionWindow,
        fetched_through_ms: i64,
    ) -> Result<(RegionTables, CommitStats)> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating cache directory {}", self.dir.display()))?;

        let previous_checkpoint = self.load_checkpoint();
        let mut prior = self.load_tables();
        let mut merged = RegionTables::default();
        let mut stats = CommitStats::default();

        for table in Table::ALL {
            let spec = table.spec();
            let old = prior.take(table);
            let new = fresh.take(table);
            stats.prior += old.len();
            stats.fresh += new.len();

            let mut records = merge_dedup(old, new, spec.key);
            let trimmed = trim(&mut records, window.start_ms);
            stats.trimmed += trimmed;
            stats.kept += records.len();

            debug!(table = spec.name, kind = %table.kind(), rows = records.len(), trimmed, "Table merged");
            write_table(&self.table_path(table), &records)
                .with_context(|| format!("persisting {} for region {}", spec.name, self.name))?;
            *merged.get_mut(table) = records;
        }

        let checkpoint = previous_checkpoint
            .map_or(fetched_through_ms, |cp| cp.max(fetched_through_ms));
        checkpoint::save(&self.checkpoint_path(), checkpoint)
            .with_context(|| format!("saving checkpoint for region {}", self.name))?;

        info!(
            prior = stats.prior,
            fresh = stats.fresh,
            kept = stats.kept,
            trimmed = stats.trimmed,
            checkpoint,
            "Region cache committed"
        );
        Ok((merged, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AlertRecord;

    fn theft(vehicle: &str, ms: i64) -> AlertRecord {
        let mut r = AlertRecord::at(ms).unwrap();
        r.vehicle_id = Some(vehicle.into());
        r
    }

    fn window() -> RetentionWindow {
        RetentionWindow {
            start_ms: 10 * DAY_MS,
            end_ms: 20 * DAY_MS,
        }
    }

    #[test]
    fn test_commit_persists_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path()).region("EU");

        let mut fresh = RegionTables::default();
        fresh.theft = vec![theft("v1", 12 * DAY_MS), theft("v0", 5 * DAY_MS)];

        let (merged, stats) = store.commit(fresh, window(), window().end_ms).unwrap();

        assert_eq!(merged.theft.len(), 1);
        assert_eq!(stats.trimmed, 1);
        assert_eq!(store.load_tables(), merged);
        assert_eq!(store.load_checkpoint(), Some(20 * DAY_MS));
        for table in Table::ALL {
            assert!(store.table_path(table).exists(), "{table} not written");
        }
    }

    #[test]
    fn test_commit_with_nothing_new_still_trims_and_advances() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path()).region("EU");

        let mut seed = RegionTables::default();
        seed.fill = vec![theft("v1", 11 * DAY_MS)];
        seed.fill[0].id = Some("f1".into());
        store.commit(seed, window(), window().end_ms).unwrap();

        let later = RetentionWindow {
            start_ms: 12 * DAY_MS,
            end_ms: 22 * DAY_MS,
        };
        let (merged, _) = store.commit(RegionTables::default(), later, later.end_ms).unwrap();

        assert!(merged.fill.is_empty());
        assert_eq!(store.load_checkpoint(), Some(22 * DAY_MS));
    }

    #[test]
    fn test_checkpoint_never_regresses() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path()).region("EU");

        store.commit(RegionTables::default(), window(), window().end_ms).unwrap();
        let earlier = RetentionWindow {
            start_ms: 5 * DAY_MS,
            end_ms: 15 * DAY_MS,
        };
        store.commit(RegionTables::default(), earlier, earlier.end_ms).unwrap();

        assert_eq!(store.load_checkpoint(), Some(20 * DAY_MS));
    }
}
