use std::sync::Arc;

use crate::audit::{AuditRecorder, HistoryReader};
use crate::relay::{Executor, Relay};
use crate::storage::RecordStore;

/// Shared handles for the API handlers. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub history: HistoryReader,
    pub recorder: AuditRecorder,
    pub history_limit: usize,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        executor: Arc<dyn Executor>,
        history_limit: usize,
    ) -> Self {
        let recorder = AuditRecorder::new(Arc::clone(&store));
        Self {
            relay: Relay::new(executor, recorder.clone()),
            history: HistoryReader::new(store),
            recorder,
            history_limit,
        }
    }
}
