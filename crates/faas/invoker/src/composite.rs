//! CompositeInvoker - a node that delegates to child providers
//!
//! A composite owns an ordered list of children and its own policy manager, and
//! is itself a valid leaf: it keeps a RAM budget and worker pool that serve as the
//! last resort when no child can take the work.
//!
//! Selection rules for `ram` units:
//! 1. Ask the policy manager for a child.
//! 2. No capable child: run on the composite if its own budget fits, otherwise fail.
//! 3. The chosen child is momentarily full and the composite's budget fits: run on
//!    the composite rather than queue behind the child.
//! 4. Otherwise recurse into the chosen child.

use crate::executor::Executor;
use faas_types::{
    FaasError, FaasResult, InvocationHandle, InvocationRequest, InvokerId, PolicyManager,
    ProviderRef, ResourceProvider,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct CompositeInvoker {
    executor: Executor,
    children: RwLock<Vec<ProviderRef>>,
    policy: Mutex<Option<Box<dyn PolicyManager>>>,
}

impl CompositeInvoker {
    /// Create a composite with a generated id and no children.
    ///
    /// `max_ram` and `threads` size the composite's own fallback budget and pool.
    pub fn new(max_ram: u64, threads: usize) -> FaasResult<Self> {
        Self::with_id(InvokerId::generate(), max_ram, threads)
    }

    pub fn with_id(id: InvokerId, max_ram: u64, threads: usize) -> FaasResult<Self> {
        Ok(Self {
            executor: Executor::new(id, max_ram, threads)?,
            children: RwLock::new(Vec::new()),
            policy: Mutex::new(None),
        })
    }

    /// Name of the installed policy, if any
    pub fn policy_name(&self) -> Option<&'static str> {
        self.policy.lock().as_ref().map(|p| p.name())
    }

    fn snapshot(&self) -> Vec<ProviderRef> {
        self.children.read().clone()
    }
}

impl ResourceProvider for CompositeInvoker {
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
        let children = self.snapshot();
        let chosen = {
            let mut guard = self.policy.lock();
            let policy = guard
                .as_mut()
                .ok_or(FaasError::NoPolicyManagerRegistered)?;
            policy.get_invoker(&children, ram)
        };

        match chosen {
            Ok(child) => {
                if child.available_ram() < ram && self.max_ram() >= ram {
                    debug!(
                        invoker_id = %self.id(),
                        child = %child.id(),
                        ram = ram,
                        "Chosen child is full, running on composite"
                    );
                    return Ok(self);
                }
                child.select_invoker(ram)
            }
            Err(e) if e.is_no_invoker() => {
                if self.max_ram() < ram {
                    Err(e)
                } else {
                    debug!(invoker_id = %self.id(), ram = ram, "No capable child, running on composite");
                    Ok(self)
                }
            }
            Err(e) => Err(e),
        }
    }

    fn invoke(&self, request: InvocationRequest) -> FaasResult<Value> {
        self.executor.invoke(request)
    }

    fn invoke_async(&self, request: InvocationRequest) -> FaasResult<InvocationHandle> {
        self.executor.invoke_async(request)
    }

    fn register_invoker(&self, child: ProviderRef) -> FaasResult<()> {
        if child.contains_provider(self.id()) {
            return Err(FaasError::not_valid(format!(
                "registering {} under {} would create a cycle",
                child.id(),
                self.id()
            )));
        }

        let policy = self.policy.lock().as_ref().map(|p| p.copy());
        let mut children = self.children.write();
        if children.iter().any(|c| c.id() == child.id()) {
            return Err(FaasError::not_valid(format!(
                "{} is already registered under {}",
                child.id(),
                self.id()
            )));
        }
        if let Some(policy) = policy.as_deref() {
            child.set_policy_manager(policy);
        }

        info!(invoker_id = %self.id(), child = %child.id(), "Child invoker registered");
        children.push(child);
        Ok(())
    }

    fn delete_invoker(&self, id: &InvokerId) -> FaasResult<()> {
        let mut children = self.children.write();
        let before = children.len();
        children.retain(|c| c.id() != id);
        if children.len() == before {
            return Err(FaasError::not_valid(format!(
                "{} is not registered under {}",
                id,
                self.id()
            )));
        }
        info!(invoker_id = %self.id(), child = %id, "Child invoker deleted");
        Ok(())
    }

    fn set_policy_manager(&self, policy: &dyn PolicyManager) {
        *self.policy.lock() = Some(policy.copy());
        for child in self.snapshot() {
            child.set_policy_manager(policy);
        }
    }

    fn set_distribution_policy_manager(&self, invocation_count: usize, ram: u64) {
        let children = self.snapshot();
        if let Some(policy) = self.policy.lock().as_mut() {
            policy.prepare_distribution(&children, invocation_count, ram);
        }
        for child in &children {
            child.set_distribution_policy_manager(invocation_count, ram);
        }
    }

    fn children(&self) -> Vec<ProviderRef> {
        self.snapshot()
    }

    fn contains_provider(&self, id: &InvokerId) -> bool {
        self.id() == id || self.children.read().iter().any(|c| c.contains_provider(id))
    }

    fn shutdown(&self) {
        self.executor.shutdown();
        for child in self.snapshot() {
            child.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::LeafInvoker;
    use faas_types::{is_capable, ActionId, Invokable};
    use serde_json::json;

    /// First capable provider, counting how often it was asked
    #[derive(Debug, Clone, Default)]
    struct FirstFit {
        calls: usize,
    }

    impl PolicyManager for FirstFit {
        fn name(&self) -> &'static str {
            "first_fit"
        }

        fn get_invoker(&mut self, providers: &[ProviderRef], ram: u64) -> FaasResult<ProviderRef> {
            self.calls += 1;
            providers
                .iter()
                .find(|p| is_capable(p.as_ref(), ram))
                .cloned()
                .ok_or(FaasError::no_invoker(ram))
        }

        fn copy(&self) -> Box<dyn PolicyManager> {
            Box::new(self.clone())
        }
    }

    fn composite(id: &str, max_ram: u64) -> Arc<CompositeInvoker> {
        let c = CompositeInvoker::with_id(id.into(), max_ram, 1).unwrap();
        c.set_policy_manager(&FirstFit::default());
        Arc::new(c)
    }

    fn leaf(id: &str, max_ram: u64) -> Arc<LeafInvoker> {
        Arc::new(LeafInvoker::with_id(id.into(), max_ram, 1).unwrap())
    }

    fn request(ram: u64) -> InvocationRequest {
        InvocationRequest::new(
            ActionId::new("echo"),
            Arc::new(Invokable::new(Ok, ram)),
            json!("hi"),
        )
    }

    #[test]
    fn test_invalid_budgets_are_rejected() {
        assert!(CompositeInvoker::new(0, 1).is_err());
        assert!(CompositeInvoker::new(1, 0).is_err());
    }

    #[test]
    fn test_childless_composite_runs_on_itself() {
        let root = composite("root", 1);
        let chosen = root.clone().select_invoker(1).unwrap();
        assert_eq!(chosen.id(), root.id());
        assert_eq!(chosen.invoke(request(1)).unwrap(), json!("hi"));
        assert_eq!(
            chosen.invoke_async(request(1)).unwrap().wait().unwrap(),
            json!("hi")
        );
    }

    #[test]
    fn test_selection_requires_policy_manager() {
        let root = Arc::new(CompositeInvoker::with_id("bare".into(), 1, 1).unwrap());
        assert!(root.policy_name().is_none());
        assert!(matches!(
            root.select_invoker(1),
            Err(FaasError::NoPolicyManagerRegistered)
        ));
    }

    #[test]
    fn test_falls_back_when_no_child_is_capable() {
        let root = composite("root", 2);
        root.register_invoker(leaf("small", 1)).unwrap();
        assert_eq!(root.clone().select_invoker(2).unwrap().id().as_str(), "root");
        assert!(matches!(
            root.select_invoker(3),
            Err(FaasError::NoInvokerAvailable { ram: 3 })
        ));
    }

    #[test]
    fn test_busy_child_prefers_composite_budget() {
        let root = composite("root", 1);
        let child = leaf("child", 1);
        root.register_invoker(child.clone()).unwrap();

        assert_eq!(root.clone().select_invoker(1).unwrap().id().as_str(), "child");

        child.reserve_ram(1);
        assert_eq!(root.clone().select_invoker(1).unwrap().id().as_str(), "root");

        // A composite too small to help leaves the work with the busy child
        let narrow = composite("narrow", 1);
        let big = leaf("big", 4);
        narrow.register_invoker(big.clone()).unwrap();
        big.reserve_ram(4);
        assert_eq!(narrow.select_invoker(2).unwrap().id().as_str(), "big");
    }

    #[test]
    fn test_selection_recurses_through_nested_composites() {
        let root = composite("root", 1);
        let mid = composite("mid", 1);
        mid.register_invoker(leaf("deep", 8)).unwrap();
        root.register_invoker(mid.clone()).unwrap();

        assert_eq!(root.clone().select_invoker(1).unwrap().id().as_str(), "deep");
        assert!(root.contains_provider(&InvokerId::new("deep")));
        assert_eq!(mid.policy_name(), Some("first_fit"));
    }

    #[test]
    fn test_registration_rules() {
        let root = composite("root", 1);
        let child = leaf("child", 1);
        root.register_invoker(child.clone()).unwrap();

        assert!(matches!(
            root.register_invoker(leaf("child", 2)),
            Err(FaasError::OperationNotValid(_))
        ));
        assert!(matches!(
            root.register_invoker(root.clone()),
            Err(FaasError::OperationNotValid(_))
        ));

        let outer = composite("outer", 1);
        outer.register_invoker(root.clone()).unwrap();
        assert!(matches!(
            root.register_invoker(outer.clone()),
            Err(FaasError::OperationNotValid(_))
        ));

        root.delete_invoker(child.id()).unwrap();
        assert!(root.children().is_empty());
        assert!(matches!(
            root.delete_invoker(child.id()),
            Err(FaasError::OperationNotValid(_))
        ));
    }

    #[test]
    fn test_children_receive_policy_copies() {
        let root = Arc::new(CompositeInvoker::with_id("root".into(), 1, 1).unwrap());
        let early = Arc::new(CompositeInvoker::with_id("early".into(), 1, 1).unwrap());
        root.register_invoker(early.clone()).unwrap();
        assert!(early.policy_name().is_none());

        root.set_policy_manager(&FirstFit::default());
        assert_eq!(early.policy_name(), Some("first_fit"));

        let late = Arc::new(CompositeInvoker::with_id("late".into(), 1, 1).unwrap());
        root.register_invoker(late.clone()).unwrap();
        assert_eq!(late.policy_name(), Some("first_fit"));
    }

    #[test]
    fn test_shutdown_reaches_children() {
        let root = composite("root", 1);
        let child = leaf("child", 1);
        root.register_invoker(child.clone()).unwrap();
        root.shutdown();
        root.shutdown();
        assert!(matches!(
            child.invoke_async(request(1)),
            Err(FaasError::InvokerShutdown(_))
        ));
        assert!(matches!(
            root.invoke_async(request(1)),
            Err(FaasError::InvokerShutdown(_))
        ));
    }
}
