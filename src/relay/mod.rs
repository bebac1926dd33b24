//! Request relay pipeline: normalize, execute, classify, record.

pub mod classify;
pub mod executor;
pub mod normalize;

pub use self::classify::{classify, Outcome};
pub use self::executor::{Execution, ExecutionResult, Executor, HttpExecutor, RemoteResponse};
pub use self::normalize::{normalize, RawTestRequest, TestSpec, ValidationError};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::audit::AuditRecorder;
use crate::record::TestRecord;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("relay task failed: {0}")]
    Internal(String),
}

/// A finished invocation: the outcome the caller sees and the id it was recorded under.
#[derive(Debug, Clone)]
pub struct Completed {
    pub record_id: Uuid,
    pub outcome: Outcome,
    /// Whether the audit write succeeded. Informational only.
    pub saved: bool,
}

/// Runs one test request end to end.
///
/// Each call is independent; the only shared state is the executor's HTTP
/// client pool and the recorder's store handle.
#[derive(Clone)]
pub struct Relay {
    executor: Arc<dyn Executor>,
    recorder: AuditRecorder,
}

impl Relay {
    pub fn new(executor: Arc<dyn Executor>, recorder: AuditRecorder) -> Self {
        Self { executor, recorder }
    }

    /// Validate `raw`, then relay, classify and record it.
    ///
    /// Everything after validation runs on a detached task, so dropping the
    /// returned future does not cancel the outbound call or its audit write.
    pub async fn run(&self, raw: RawTestRequest) -> Result<Completed, RelayError> {
        let spec = normalize(raw)?;
        let created_at = Utc::now();

        info!(method = %spec.method, url = %spec.url, "relaying request");

        let worker = self.clone();
        tokio::spawn(async move { worker.complete(spec, created_at).await })
            .await
            .map_err(|e| RelayError::Internal(e.to_string()))?
    }

    async fn complete(
        &self,
        spec: TestSpec,
        created_at: DateTime<Utc>,
    ) -> Result<Completed, RelayError> {
        let started = Instant::now();
        let executor = Arc::clone(&self.executor);
        let task_spec = spec.clone();
        let joined = tokio::spawn(async move { executor.execute(&task_spec).await }).await;

        match joined {
            Ok(execution) => {
                let outcome = classify(execution);
                info!(
                    method = %spec.method,
                    url = %spec.url,
                    outcome = %outcome.kind,
                    status = outcome.status,
                    response_time_ms = outcome.response_time_ms,
                    "relay finished"
                );

                let record = build_record(spec, &outcome, created_at);
                let record_id = record.id;
                let saved = self.recorder.record(record).await;

                Ok(Completed {
                    record_id,
                    outcome,
                    saved,
                })
            }
            Err(e) => {
                let details = e.to_string();
                error!(method = %spec.method, url = %spec.url, error = %details, "relay task failed");

                let outcome = classify::internal_fault(&details, started.elapsed());
                self.recorder
                    .record(build_record(spec, &outcome, created_at))
                    .await;

                Err(RelayError::Internal(details))
            }
        }
    }
}

fn build_record(spec: TestSpec, outcome: &Outcome, created_at: DateTime<Utc>) -> TestRecord {
    TestRecord {
        id: Uuid::new_v4(),
        method: spec.method,
        url: spec.url,
        request_headers: spec.headers,
        request_body: spec.body,
        response_status: Some(outcome.status),
        response_headers: outcome.headers.clone(),
        response_body: outcome.body.clone(),
        response_time_ms: outcome.response_time_ms,
        outcome_kind: outcome.kind,
        error_message: outcome.error_message.clone(),
        created_at,
    }
}
