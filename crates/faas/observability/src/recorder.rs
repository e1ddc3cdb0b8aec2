//! In-memory record of recent invocations

use chrono::{DateTime, Utc};
use faas_types::{
    ActionId, InvocationContext, InvocationId, InvocationObserver, InvocationOutcome, InvokerId,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 1024;

/// One invocation as seen by the recorder
#[derive(Debug, Clone, Serialize)]
pub struct InvocationRecord {
    pub invocation_id: InvocationId,
    pub action_id: ActionId,
    pub invoker_id: InvokerId,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub success: Option<bool>,
}

impl InvocationRecord {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Observer keeping the most recent invocations in dispatch order.
///
/// Records are appended at `initialize` and completed at `update`. Once
/// `capacity` is reached the oldest record is evicted.
#[derive(Debug)]
pub struct InvocationRecorder {
    capacity: usize,
    records: Mutex<VecDeque<InvocationRecord>>,
}

impl Default for InvocationRecorder {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl InvocationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
        }
    }

    pub fn records(&self) -> Vec<InvocationRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Invoker of every recorded invocation, oldest first
    pub fn invokers(&self) -> Vec<InvokerId> {
        self.records
            .lock()
            .iter()
            .map(|r| r.invoker_id.clone())
            .collect()
    }

    pub fn finished(&self) -> usize {
        self.records.lock().iter().filter(|r| r.is_finished()).count()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl InvocationObserver for InvocationRecorder {
    fn initialize(&self, ctx: &InvocationContext) {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(InvocationRecord {
            invocation_id: ctx.invocation_id,
            action_id: ctx.action_id.clone(),
            invoker_id: ctx.invoker_id.clone(),
            started_at: Utc::now(),
            finished_at: None,
            success: None,
        });
    }

    fn update(&self, ctx: &InvocationContext, outcome: &InvocationOutcome) {
        let mut records = self.records.lock();
        if let Some(record) = records
            .iter_mut()
            .rev()
            .find(|r| r.invocation_id == ctx.invocation_id)
        {
            record.finished_at = Some(Utc::now());
            record.success = Some(outcome.success);
        }
    }
}
