//! Mapping of execution results to typed outcomes.

use std::time::Duration;

use serde_json::{json, Value};

use super::executor::{Execution, ExecutionResult};
use crate::record::{Headers, OutcomeKind};

/// Text used when the remote never answered.
pub const NO_RESPONSE_MESSAGE: &str = "No response received from server";

/// Synthetic status recorded when no response frame arrived.
pub const NO_RESPONSE_STATUS: u16 = 0;

/// Synthetic status recorded when the request could not be set up.
pub const SETUP_FAILURE_STATUS: u16 = 500;

/// Fully determined outcome of one relay attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub kind: OutcomeKind,
    pub status: u16,
    pub headers: Option<Headers>,
    pub body: Option<Value>,
    pub error_message: Option<String>,
    pub response_time_ms: u64,
}

/// Classify an execution.
///
/// Any received response wins over "no response": only a missing frame is a
/// `NetworkError`, and a non-2xx reply is an `HttpError` carrying the remote
/// status, headers and body verbatim.
pub fn classify(execution: Execution) -> Outcome {
    let response_time_ms = elapsed_ms(execution.elapsed);

    match execution.result {
        ExecutionResult::Response(r) if (200..300).contains(&r.status) => Outcome {
            kind: OutcomeKind::Success,
            status: r.status,
            headers: Some(r.headers),
            body: Some(r.body),
            error_message: None,
            response_time_ms,
        },
        ExecutionResult::Response(r) => Outcome {
            kind: OutcomeKind::HttpError,
            status: r.status,
            headers: Some(r.headers),
            body: Some(r.body),
            error_message: Some(format!("Request failed with status code {}", r.status)),
            response_time_ms,
        },
        ExecutionResult::NoResponse { message } => Outcome {
            kind: OutcomeKind::NetworkError,
            status: NO_RESPONSE_STATUS,
            headers: None,
            body: Some(json!({ "error": NO_RESPONSE_MESSAGE })),
            error_message: Some(message),
            response_time_ms,
        },
        ExecutionResult::SetupFailure { message } => setup_error(message, response_time_ms),
    }
}

/// Outcome for a fault outside the classified paths (e.g. a panicked executor task).
pub fn internal_fault(details: &str, elapsed: Duration) -> Outcome {
    setup_error(format!("Server error: {details}"), elapsed_ms(elapsed))
}

fn setup_error(message: String, response_time_ms: u64) -> Outcome {
    Outcome {
        kind: OutcomeKind::SetupError,
        status: SETUP_FAILURE_STATUS,
        headers: None,
        body: Some(json!({ "error": message })),
        error_message: Some(message),
        response_time_ms,
    }
}

pub fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::executor::RemoteResponse;

    fn response(status: u16, body: Value) -> Execution {
        let mut headers = Headers::new();
        headers.insert("content-type".into(), "application/json".into());
        Execution {
            result: ExecutionResult::Response(RemoteResponse {
                status,
                headers,
                body,
            }),
            elapsed: Duration::from_millis(37),
        }
    }

    #[test]
    fn test_2xx_is_success() {
        for status in [200, 201, 204, 299] {
            let o = classify(response(status, json!({"ok": true})));
            assert_eq!(o.kind, OutcomeKind::Success);
            assert_eq!(o.status, status);
            assert!(o.error_message.is_none());
            assert_eq!(o.response_time_ms, 37);
        }
    }

    #[test]
    fn test_other_status_is_http_error_verbatim() {
        for status in [100, 301, 404, 500, 503] {
            let o = classify(response(status, json!({"detail": "nope"})));
            assert_eq!(o.kind, OutcomeKind::HttpError);
            assert_eq!(o.status, status);
            assert_eq!(o.body, Some(json!({"detail": "nope"})));
            assert_eq!(o.headers.as_ref().unwrap()["content-type"], "application/json");
            assert_eq!(
                o.error_message.as_deref(),
                Some(format!("Request failed with status code {status}").as_str())
            );
        }
    }

    #[test]
    fn test_no_response_is_network_error() {
        let o = classify(Execution {
            result: ExecutionResult::NoResponse {
                message: "connection refused".into(),
            },
            elapsed: Duration::from_millis(3),
        });
        assert_eq!(o.kind, OutcomeKind::NetworkError);
        assert_eq!(o.status, 0);
        assert!(o.headers.is_none());
        assert_eq!(o.body, Some(json!({"error": NO_RESPONSE_MESSAGE})));
        assert_eq!(o.error_message.as_deref(), Some("connection refused"));
        assert_eq!(o.response_time_ms, 3);
    }

    #[test]
    fn test_setup_failure_is_setup_error() {
        let o = classify(Execution {
            result: ExecutionResult::SetupFailure {
                message: "builder error".into(),
            },
            elapsed: Duration::ZERO,
        });
        assert_eq!(o.kind, OutcomeKind::SetupError);
        assert_eq!(o.status, 500);
        assert_eq!(o.body, Some(json!({"error": "builder error"})));
        assert_eq!(o.error_message.as_deref(), Some("builder error"));
        assert_eq!(o.response_time_ms, 0);
    }

    #[test]
    fn test_internal_fault_is_prefixed() {
        let o = internal_fault("task panicked", Duration::from_millis(9));
        assert_eq!(o.kind, OutcomeKind::SetupError);
        assert_eq!(o.status, 500);
        assert_eq!(o.error_message.as_deref(), Some("Server error: task panicked"));
    }
}
