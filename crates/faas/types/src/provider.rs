//! ResourceProvider - the capability shared by leaf and composite invokers
//!
//! A provider owns a RAM budget and can run invocations. Composite providers
//! additionally own children and a policy manager, and resolve
//! [`ResourceProvider::select_invoker`] by walking their subtree. Leaves accept the
//! tree-management calls as no-ops so they can stand wherever a provider is
//! expected. A remote transport would implement this same trait and surface its
//! own failures as `FaasError::RemoteCommunication`.

use crate::error::FaasResult;
use crate::ids::InvokerId;
use crate::invocation::{InvocationHandle, InvocationRequest};
use crate::policy::PolicyManager;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Shared reference to any provider in the tree
pub type ProviderRef = Arc<dyn ResourceProvider>;

pub trait ResourceProvider: Send + Sync + fmt::Debug {
    fn id(&self) -> &InvokerId;

    /// RAM budget of this node itself (a composite's own fallback budget)
    fn max_ram(&self) -> u64;

    /// RAM committed by running invocations, always within `0..=max_ram`
    fn used_ram(&self) -> u64;

    /// RAM anticipated by dispatched but unfinished invocations
    fn reserved_ram(&self) -> u64;

    /// Capacity left for planning: `max_ram - reserved_ram`
    fn available_ram(&self) -> u64 {
        self.max_ram().saturating_sub(self.reserved_ram())
    }

    /// Advisory reservation, saturating at `max_ram`
    fn reserve_ram(&self, ram: u64);

    /// Drop an advisory reservation, saturating at zero
    fn release_ram(&self, ram: u64);

    /// Resolve the provider that should execute `ram` units of work.
    ///
    /// Leaves return themselves when their budget is large enough.
    fn select_invoker(self: Arc<Self>, ram: u64) -> FaasResult<ProviderRef>;

    /// Run on the calling thread
    fn invoke(&self, request: InvocationRequest) -> FaasResult<Value>;

    /// Queue on this provider's worker pool; the handle resolves once admitted and run
    fn invoke_async(&self, request: InvocationRequest) -> FaasResult<InvocationHandle>;

    fn register_invoker(&self, _child: ProviderRef) -> FaasResult<()> {
        Ok(())
    }

    fn delete_invoker(&self, _id: &InvokerId) -> FaasResult<()> {
        Ok(())
    }

    /// Install an independent copy of `policy` on this node
    fn set_policy_manager(&self, _policy: &dyn PolicyManager) {}

    /// Let the held policy plan a batch of `invocation_count` calls of `ram` units
    fn set_distribution_policy_manager(&self, _invocation_count: usize, _ram: u64) {}

    fn children(&self) -> Vec<ProviderRef> {
        Vec::new()
    }

    /// Whether `id` names this node or any node below it
    fn contains_provider(&self, id: &InvokerId) -> bool {
        self.id() == id
    }

    /// Stop accepting pooled work; idempotent
    fn shutdown(&self);
}
