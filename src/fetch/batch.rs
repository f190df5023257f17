use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, warn};

use super::client::HttpClient;
use super::error::{FetchError, FetchFailure};
use super::{RawRow, post_query, query};
use crate::record::AlertKind;
use crate::timerange::TimeRange;

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    /// Width of each sub-window.
    pub window_width_ms: i64,
    /// Cap on concurrent in-flight requests.
    pub max_in_flight: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            window_width_ms: 2 * 3_600_000,
            max_in_flight: 30,
        }
    }
}

/// Rows and recorded failures from one batch.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    rows: HashMap<AlertKind, Vec<RawRow>>,
    pub failures: Vec<FetchFailure>,
    pub requests: usize,
}

impl FetchOutcome {
    pub fn rows(&self, kind: AlertKind) -> &[RawRow] {
        self.rows.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn take_rows(&mut self, kind: AlertKind) -> Vec<RawRow> {
        self.rows.remove(&kind).unwrap_or_default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.values().map(Vec::len).sum()
    }

    /// Appends another batch's rows and failures to this one.
    pub fn merge(&mut self, other: FetchOutcome) {
        for (kind, rows) in other.rows {
            self.rows.entry(kind).or_default().extend(rows);
        }
        self.failures.extend(other.failures);
        self.requests += other.requests;
    }
}

/// Fetches every `kind` over `range`, one request per sub-window per kind.
///
/// Requests run concurrently, at most `opts.max_in_flight` at a time. A failed
/// request is recorded in [`FetchOutcome::failures`] and contributes no rows;
/// it never fails the batch.
#[tracing::instrument(skip(client, opts), fields(range = %range))]
pub async fn fetch_batches<C>(
    client: Arc<C>,
    url: &str,
    kinds: &[AlertKind],
    range: TimeRange,
    opts: &BatchOptions,
) -> FetchOutcome
where
    C: HttpClient + ?Sized + 'static,
{
    let windows = range.split(opts.window_width_ms);
    if windows.is_empty() || kinds.is_empty() {
        debug!("Nothing to fetch");
        return FetchOutcome::default();
    }

    let semaphore = Arc::new(Semaphore::new(opts.max_in_flight.max(1)));
    let url: Arc<str> = Arc::from(url);
    let mut tasks = Vec::with_capacity(windows.len() * kinds.len());

    for window in windows {
        for &kind in kinds {
            let sem = semaphore.clone();
            let client = client.clone();
            let url = url.clone();

            let span = tracing::debug_span!("fetch_window", kind = %kind, window = %window);
            let task = tokio::spawn(
                async move {
                    let _permit = sem
                        .acquire_owned()
                        .await
                        .map_err(|e| FetchError::Aborted(e.to_string()))?;
                    post_query(client.as_ref(), &url, &query::build(kind, window)).await
                }
                .instrument(span),
            );
            tasks.push((kind, window, task));
        }
    }

    let mut outcome = FetchOutcome {
        requests: tasks.len(),
        ..Default::default()
    };

    for (kind, window, task) in tasks {
        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(FetchError::Aborted(e.to_string())),
        };

        match result {
            Ok(rows) => {
                debug!(kind = %kind, window = %window, rows = rows.len(), "Sub-window fetched");
                outcome.rows.entry(kind).or_default().extend(rows);
            }
            Err(error) => {
                warn!(kind = %kind, window = %window, error = %error, "Sub-window fetch failed");
                outcome.failures.push(FetchFailure {
                    kind,
                    window,
                    error,
                });
            }
        }
    }

    info!(
        requests = outcome.requests,
        rows = outcome.row_count(),
        failed = outcome.failures.len(),
        "Batch complete"
    );
    outcome
}
