//! Windowed, concurrent fetching from a region's query endpoint.

mod basic;
mod batch;
mod client;
mod error;
pub mod query;

#[cfg(test)]
pub(crate) mod testing;

pub use basic::BasicClient;
pub use batch::{BatchOptions, FetchOutcome, fetch_batches};
pub use client::HttpClient;
pub use error::{FetchError, FetchFailure};

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde_json::{Map, Value};

/// A raw row as returned by the endpoint, keyed by select alias.
pub type RawRow = Map<String, Value>;

/// POSTs `query` to `url` and returns the rows under `result.output`.
///
/// A body without `result.output` yields no rows; a body that is not JSON,
/// or whose `output` is not an array, is an error.
pub async fn post_query<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    query: &Value,
) -> Result<Vec<RawRow>, FetchError> {
    let url = url
        .parse()
        .map_err(|e| FetchError::Shape(format!("invalid endpoint url {url:?}: {e}")))?;

    let mut req = reqwest::Request::new(reqwest::Method::POST, url);
    req.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    *req.body_mut() = Some(serde_json::to_vec(query)?.into());

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(FetchError::Status { status, body });
    }

    let bytes = resp.bytes().await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    output_rows(body)
}

fn output_rows(mut body: Value) -> Result<Vec<RawRow>, FetchError> {
    let output = match body.pointer_mut("/result/output") {
        None => return Ok(Vec::new()),
        Some(output) => output.take(),
    };

    match output {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect()),
        other => Err(FetchError::Shape(format!(
            "result.output is not an array: {}",
            truncate(&other.to_string(), 200)
        ))),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
