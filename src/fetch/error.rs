use thiserror::Error;

use crate::record::AlertKind;
use crate::timerange::TimeRange;

/// Why a single sub-window request produced no rows.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("response was not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("fetch task aborted: {0}")]
    Aborted(String),
}

/// A recorded soft failure for one (sub-window, alert kind) request.
#[derive(Debug, Error)]
#[error("{kind} fetch error {window}: {error}")]
pub struct FetchFailure {
    pub kind: AlertKind,
    pub window: TimeRange,
    #[source]
    pub error: FetchError,
}
