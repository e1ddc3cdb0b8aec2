//! Executor - leaf behaviour shared by leaf and composite invokers
//!
//! Owns a RAM ledger and a worker pool, and runs invocations with the observer
//! hooks in their fixed order: initialize, reserve, execution, callable, release,
//! update.

use crate::ledger::RamLedger;
use crate::pool::{effective_pool_size, WorkerPool};
use faas_types::{
    ActionId, FaasError, FaasResult, InvocationHandle, InvocationOutcome, InvocationRequest,
    Invokable, InvokerId, ObserverSession,
};
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
pub struct Executor {
    id: InvokerId,
    ledger: Arc<RamLedger>,
    pool: WorkerPool,
}

impl Executor {
    /// Fails with `OperationNotValid` when `max_ram` or `threads` is zero
    pub fn new(id: InvokerId, max_ram: u64, threads: usize) -> FaasResult<Self> {
        if max_ram == 0 {
            return Err(FaasError::not_valid(format!(
                "{} requires max_ram > 0",
                id
            )));
        }
        if threads == 0 {
            return Err(FaasError::not_valid(format!(
                "{} requires at least one worker thread",
                id
            )));
        }

        let size = effective_pool_size(threads);
        let pool = WorkerPool::new(id.short(), size).map_err(|e| {
            FaasError::not_valid(format!("cannot spawn worker pool for {}: {}", id, e))
        })?;

        debug!(invoker_id = %id, max_ram = max_ram, pool_size = size, "Executor created");

        Ok(Self {
            id,
            ledger: Arc::new(RamLedger::new(max_ram)),
            pool,
        })
    }

    pub fn id(&self) -> &InvokerId {
        &self.id
    }

    pub fn ledger(&self) -> &RamLedger {
        &self.ledger
    }

    pub fn pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Run on the calling thread, committing RAM without waiting
    pub fn invoke(&self, request: InvocationRequest) -> FaasResult<Value> {
        let ram = request.ram();
        let session = request.observers.begin(request.context(&self.id));

        self.ledger.reserve(ram);
        let permit = self.ledger.commit(ram);
        session.execution();

        debug!(invoker_id = %self.id, action = %request.action_id, ram = ram, "Invoking");
        let started = Instant::now();
        let result = run_callable(&request.action_id, &request.invokable, request.args);

        drop(permit);
        self.ledger.release_reservation(ram);
        session.update(&InvocationOutcome::from_result(&result, started.elapsed()));
        result
    }

    /// Queue on the worker pool; the pooled task waits for RAM before running
    pub fn invoke_async(&self, request: InvocationRequest) -> FaasResult<InvocationHandle> {
        let ram = request.ram();
        if ram > self.ledger.max_ram() {
            return Err(FaasError::no_invoker(ram));
        }

        let (tx, handle) = InvocationHandle::channel(request.invocation_id, self.id.clone());
        let mut session = QueuedSession(Some(
            request.observers.begin(request.context(&self.id)),
        ));
        self.ledger.reserve(ram);

        let ledger = Arc::clone(&self.ledger);
        let invoker_id = self.id.clone();
        let InvocationRequest {
            action_id,
            invokable,
            args,
            ..
        } = request;

        let accepted = self.pool.execute(move || {
            let Some(session) = session.take() else {
                return;
            };
            let permit = ledger.admit(ram);
            session.execution();

            debug!(invoker_id = %invoker_id, action = %action_id, ram = ram, "Invoking pooled");
            let started = Instant::now();
            let result = run_callable(&action_id, &invokable, args);

            drop(permit);
            ledger.release_reservation(ram);
            session.update(&InvocationOutcome::from_result(&result, started.elapsed()));
            // The caller may have discarded the handle
            let _ = tx.send(result);
        });

        if !accepted {
            // The rejected job was dropped, which closed its observer session
            self.ledger.release_reservation(ram);
            return Err(FaasError::InvokerShutdown(self.id.clone()));
        }
        Ok(handle)
    }

    pub fn shutdown(&self) {
        self.pool.shutdown();
    }

    pub fn is_shutdown(&self) -> bool {
        self.pool.is_shutdown()
    }
}

/// Observer session owned by a queued job.
///
/// A job dropped without running (the pool refused it) still ends its session
/// with a failed outcome, so every `initialize` is matched by an `update`.
struct QueuedSession(Option<ObserverSession>);

impl QueuedSession {
    fn take(&mut self) -> Option<ObserverSession> {
        self.0.take()
    }
}

impl Drop for QueuedSession {
    fn drop(&mut self) {
        if let Some(session) = self.0.take() {
            session.update(&InvocationOutcome {
                success: false,
                duration: Duration::ZERO,
                error: Some("invocation was not scheduled".to_string()),
            });
        }
    }
}

fn run_callable(action: &ActionId, invokable: &Invokable, args: Value) -> FaasResult<Value> {
    match panic::catch_unwind(AssertUnwindSafe(|| invokable.call(args))) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(FaasError::ActionFailed {
            action: action.clone(),
            reason: format!("{:#}", e),
        }),
        Err(payload) => Err(FaasError::ActionFailed {
            action: action.clone(),
            reason: format!("panicked: {}", panic_message(payload.as_ref())),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
