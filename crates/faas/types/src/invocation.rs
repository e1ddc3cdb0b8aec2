//! Invocation requests, contexts and result handles

use crate::error::{FaasError, FaasResult};
use crate::ids::{ActionId, InvocationId, InvokerId};
use crate::invokable::Invokable;
use crate::observer::ObserverRegistry;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

/// Everything a provider needs to run one invocation
#[derive(Clone)]
pub struct InvocationRequest {
    pub invocation_id: InvocationId,
    pub action_id: ActionId,
    pub invokable: Arc<Invokable>,
    pub args: Value,
    pub observers: Arc<ObserverRegistry>,
}

impl InvocationRequest {
    pub fn new(action_id: ActionId, invokable: Arc<Invokable>, args: Value) -> Self {
        Self {
            invocation_id: InvocationId::generate(),
            action_id,
            invokable,
            args,
            observers: Arc::new(ObserverRegistry::new()),
        }
    }

    pub fn with_observers(mut self, observers: Arc<ObserverRegistry>) -> Self {
        self.observers = observers;
        self
    }

    pub fn ram(&self) -> u64 {
        self.invokable.ram()
    }

    /// Context handed to observers once the executing provider is known
    pub fn context(&self, invoker_id: &InvokerId) -> InvocationContext {
        InvocationContext {
            invocation_id: self.invocation_id,
            action_id: self.action_id.clone(),
            invoker_id: invoker_id.clone(),
            ram: self.ram(),
        }
    }
}

/// Identity of an invocation as seen by observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContext {
    pub invocation_id: InvocationId,
    pub action_id: ActionId,
    pub invoker_id: InvokerId,
    pub ram: u64,
}

/// How an invocation ended
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub success: bool,
    pub duration: Duration,
    pub error: Option<String>,
}

impl InvocationOutcome {
    pub fn from_result(result: &FaasResult<Value>, duration: Duration) -> Self {
        Self {
            success: result.is_ok(),
            duration,
            error: result.as_ref().err().map(|e| e.to_string()),
        }
    }
}

/// Pending result of an asynchronous invocation.
///
/// The handle can be awaited from async code or resolved with [`InvocationHandle::wait`]
/// from a plain thread. Dropping it does not cancel the underlying task.
#[derive(Debug)]
pub struct InvocationHandle {
    invocation_id: InvocationId,
    invoker_id: InvokerId,
    receiver: oneshot::Receiver<FaasResult<Value>>,
}

impl InvocationHandle {
    /// Create a handle and the sender the executing worker completes it with
    pub fn channel(
        invocation_id: InvocationId,
        invoker_id: InvokerId,
    ) -> (oneshot::Sender<FaasResult<Value>>, Self) {
        let (tx, receiver) = oneshot::channel();
        (
            tx,
            Self {
                invocation_id,
                invoker_id,
                receiver,
            },
        )
    }

    pub fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    /// Provider the invocation was dispatched to
    pub fn invoker_id(&self) -> &InvokerId {
        &self.invoker_id
    }

    /// Block the current thread until the result is available.
    ///
    /// Must not be called from within an async runtime; await the handle instead.
    pub fn wait(self) -> FaasResult<Value> {
        let invocation_id = self.invocation_id;
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(FaasError::WorkerLost(invocation_id)))
    }
}

impl Future for InvocationHandle {
    type Output = FaasResult<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let invocation_id = self.invocation_id;
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|r| r.unwrap_or(Err(FaasError::WorkerLost(invocation_id))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_handle_resolves_when_awaited() {
        let (tx, handle) = InvocationHandle::channel(InvocationId::generate(), InvokerId::new("a"));
        tx.send(Ok(json!(7))).unwrap();
        assert_eq!(handle.await.unwrap(), json!(7));
    }

    #[test]
    fn test_dropped_sender_reports_worker_lost() {
        let (tx, handle) = InvocationHandle::channel(InvocationId::generate(), InvokerId::new("a"));
        drop(tx);
        assert!(matches!(handle.wait(), Err(FaasError::WorkerLost(_))));
    }
}
