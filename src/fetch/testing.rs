//! In-process [`HttpClient`] used by unit tests.

use super::client::HttpClient;
use super::query;
use crate::record::AlertKind;
use crate::timerange::TimeRange;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) enum Reply {
    Rows(Vec<Value>),
    Status(u16),
    Body(&'static str),
}

type Handler = Box<dyn Fn(AlertKind, TimeRange) -> Reply + Send + Sync>;

pub(crate) struct MockClient {
    handler: Handler,
    delay: Duration,
    in_flight: AtomicUsize,
    pub(crate) max_in_flight: AtomicUsize,
    pub(crate) requests: Mutex<Vec<(AlertKind, TimeRange)>>,
}

impl MockClient {
    pub(crate) fn new(handler: impl Fn(AlertKind, TimeRange) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for MockClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let body: Value = req
            .body()
            .and_then(|b| b.as_bytes())
            .and_then(|b| serde_json::from_slice(b).ok())
            .unwrap_or(Value::Null);
        let (kind, window) = query::describe(&body).expect("mock received an unrecognised query");
        self.requests.lock().unwrap().push((kind, window));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let (status, text) = match (self.handler)(kind, window) {
            Reply::Rows(rows) => (200, json!({"result": {"output": rows}}).to_string()),
            Reply::Status(code) => (code, "backend unavailable".to_string()),
            Reply::Body(text) => (200, text.to_string()),
        };
        let resp = http::Response::builder()
            .status(status)
            .body(text)
            .unwrap();
        Ok(reqwest::Response::from(resp))
    }
}
