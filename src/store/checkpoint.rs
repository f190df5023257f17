use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use super::fsutil::atomic_write;

/// High-water mark of the last completed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub last_fetched_ms: i64,
}

/// Reads the checkpoint. A missing or unreadable file means "never fetched".
pub fn load(path: &Path) -> Option<i64> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Checkpoint unreadable, starting fresh");
            return None;
        }
    };

    match serde_json::from_str::<Checkpoint>(&content) {
        Ok(cp) => Some(cp.last_fetched_ms),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Checkpoint corrupt, starting fresh");
            None
        }
    }
}

pub fn save(path: &Path, last_fetched_ms: i64) -> Result<()> {
    let body = serde_json::to_vec(&Checkpoint { last_fetched_ms })?;
    atomic_write(path, &body)
}
