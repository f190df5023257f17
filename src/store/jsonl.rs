//! Line-delimited JSON persistence for record tables.

use anyhow::Result;
use std::path::Path;
use tracing::{debug, warn};

use super::fsutil::atomic_write;
use crate::record::AlertRecord;

/// Reads a table. A missing file is an empty table; so is a corrupt one,
/// after a warning. `time` is re-derived from `time_ms` on load.
pub fn read_table(path: &Path) -> Vec<AlertRecord> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cache table unreadable, treating as empty");
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut record: AlertRecord = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = lineno + 1,
                    error = %e,
                    "Cache table corrupt, treating as empty"
                );
                return Vec::new();
            }
        };
        if !record.resync_time() {
            warn!(
                path = %path.display(),
                line = lineno + 1,
                time_ms = record.time_ms,
                "Cache table has out-of-range time, treating as empty"
            );
            return Vec::new();
        }
        records.push(record);
    }

    debug!(path = %path.display(), rows = records.len(), "Cache table loaded");
    records
}

/// Replaces the table at `path` with `records`, atomically.
pub fn write_table(path: &Path, records: &[AlertRecord]) -> Result<()> {
    let mut body = Vec::with_capacity(records.len() * 256);
    for record in records {
        serde_json::to_writer(&mut body, record)?;
        body.push(b'\n');
    }
    atomic_write(path, &body)?;
    debug!(path = %path.display(), rows = records.len(), "Cache table written");
    Ok(())
}
