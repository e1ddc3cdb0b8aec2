//! LeafInvoker - a single compute resource with a RAM budget and worker pool

use crate::executor::Executor;
use faas_types::{
    FaasError, FaasResult, InvocationHandle, InvocationRequest, InvokerId, ProviderRef,
    ResourceProvider,
};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug)]
pub struct LeafInvoker {
    executor: Executor,
}

impl LeafInvoker {
    /// Create a leaf with a generated id.
    ///
    /// Fails with `OperationNotValid` when `max_ram` or `threads` is zero. The pool
    /// runs `min(threads, cpu cores)` workers.
    pub fn new(max_ram: u64, threads: usize) -> FaasResult<Self> {
        Self::with_id(InvokerId::generate(), max_ram, threads)
    }

    pub fn with_id(id: InvokerId, max_ram: u64, threads: usize) -> FaasResult<Self> {
        Ok(Self {
            executor: Executor::new(id, max_ram, threads)?,
        })
    }

    pub fn pool_size(&self) -> usize {
        self.executor.pool_size()
    }
}

impl ResourceProvider for LeafInvoker {
    fn id(&self) -> &InvokerId {
        self.executor.id()
    }

    fn max_ram(&self) -> u64 {
        self.executor.ledger().max_ram()
    }

    fn used_ram(&self) -> u64 {
        self.executor.ledger().used_ram()
    }

    fn reserved_ram(&self) -> u64 {
        self.executor.ledger().reserved_ram()
    }

    fn reserve_ram(&self, ram: u64) {
        self.executor.ledger().reserve(ram);
    }

    fn release_ram(&self, ram: u64) {
        self.executor.ledger().release_reservation(ram);
    }

    fn select_invoker(self: Arc<Self>, ram: u64) -> FaasResult<ProviderRef> {
        if self.max_ram() >= ram {
            Ok(self)
        } else {
            Err(FaasError::no_invoker(ram))
        }
    }

    fn invoke(&self, request: InvocationRequest) -> FaasResult<Value> {
        self.executor.invoke(request)
    }

    fn invoke_async(&self, request: InvocationRequest) -> FaasResult<InvocationHandle> {
        self.executor.invoke_async(request)
    }

    fn shutdown(&self) {
        self.executor.shutdown();
    }
}
