//! Outbound HTTP execution.
//!
//! The executor issues exactly one call per spec and reports a tagged
//! [`ExecutionResult`]. It never retries and never inspects error shapes
//! downstream: the tag is decided here, at the point where the failure happens.

use std::collections::btree_map::Entry;
use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::{debug, warn};

use super::normalize::TestSpec;
use crate::record::Headers;

/// Default per-call timeout for relayed requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// A completed exchange with the remote, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    /// The remote answered.
    Response(RemoteResponse),
    /// No response frame arrived (timeout, DNS, refused, reset).
    NoResponse { message: String },
    /// The request could not be built.
    SetupFailure { message: String },
}

/// Result of one outbound attempt plus wall-clock time spent on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub result: ExecutionResult,
    pub elapsed: Duration,
}

/// Anything that can perform a relayed call.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, spec: &TestSpec) -> Execution;
}

/// reqwest-backed executor with a fixed per-call timeout.
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client,
    timeout: Duration,
}

impl HttpExecutor {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("relaylab/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }

    fn build_request(&self, spec: &TestSpec) -> Result<reqwest::Request, String> {
        let method = Method::from_bytes(spec.method.as_str().as_bytes())
            .map_err(|e| format!("invalid method '{}': {}", spec.method, e))?;

        let mut builder = self
            .client
            .request(method, spec.url.as_str())
            .timeout(self.timeout);

        for (name, value) in &spec.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if spec.method.carries_body() {
            builder = match &spec.body {
                Some(Value::String(raw)) => builder.body(raw.clone()),
                Some(body) => builder.json(body),
                None => builder,
            };
        }

        builder.build().map_err(|e| describe(&e))
    }
}

#[async_trait::async_trait]
impl Executor for HttpExecutor {
    async fn execute(&self, spec: &TestSpec) -> Execution {
        let start = Instant::now();

        let request = match self.build_request(spec) {
            Ok(r) => r,
            Err(message) => {
                debug!(method = %spec.method, url = %spec.url, %message, "request setup failed");
                return Execution {
                    result: ExecutionResult::SetupFailure { message },
                    elapsed: start.elapsed(),
                };
            }
        };

        debug!(
            method = %spec.method,
            url = %spec.url,
            has_body = request.body().is_some(),
            timeout_ms = self.timeout.as_millis() as u64,
            "dispatching relayed request"
        );

        let result = match self.client.execute(request).await {
            Ok(response) => ExecutionResult::Response(read_response(response).await),
            Err(e) if e.is_builder() => ExecutionResult::SetupFailure {
                message: describe(&e),
            },
            Err(e) => ExecutionResult::NoResponse {
                message: describe(&e),
            },
        };

        Execution {
            result,
            elapsed: start.elapsed(),
        }
    }
}

async fn read_response(response: reqwest::Response) -> RemoteResponse {
    let status = response.status().as_u16();
    let headers = flatten_headers(response.headers());

    // The status line already arrived, so a broken body still counts as a response.
    let body = match response.bytes().await {
        Ok(bytes) => decode_body(&bytes),
        Err(e) => {
            warn!(%status, error = %describe(&e), "failed to read response body");
            Value::Null
        }
    };

    RemoteResponse {
        status,
        headers,
        body,
    }
}

/// JSON when the payload parses as JSON, otherwise the (lossy) text.
pub fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::String(String::new());
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Collapse a multi-valued header map; repeated names are joined with `", "`.
pub fn flatten_headers(map: &HeaderMap) -> Headers {
    let mut out = Headers::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        match out.entry(name.as_str().to_string()) {
            Entry::Occupied(mut e) => {
                let joined = e.get_mut();
                joined.push_str(", ");
                joined.push_str(&value);
            }
            Entry::Vacant(e) => {
                e.insert(value);
            }
        }
    }
    out
}

/// Render an error with its source chain, e.g. `error sending request: ... : Connection refused`.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}
