//! Controller - action registry and top-level dispatch

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use faas_types::{
    ActionId, FaasError, FaasResult, Invokable, InvocationHandle, InvocationRequest, InvokerId,
    ObserverRegistry, PolicyManager, ProviderRef,
};
use parking_lot::{Mutex, RwLock};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Registered action as reported by [`Controller::list_actions`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionInfo {
    pub id: ActionId,
    pub ram: u64,
}

/// Registry of actions and top-level providers.
///
/// A controller is an ordinary value: construct one per scheduler and share it
/// by reference or `Arc`. All methods take `&self`.
pub struct Controller {
    actions: DashMap<ActionId, Arc<Invokable>>,
    providers: RwLock<Vec<ProviderRef>>,
    policy: Mutex<Option<Box<dyn PolicyManager>>>,
    observers: Arc<ObserverRegistry>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("actions", &self.actions.len())
            .field("providers", &self.providers.read().len())
            .field("policy", &self.policy_name())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self::with_observers(Arc::new(ObserverRegistry::new()))
    }

    /// Controller notifying an existing observer registry
    pub fn with_observers(observers: Arc<ObserverRegistry>) -> Self {
        Self {
            actions: DashMap::new(),
            providers: RwLock::new(Vec::new()),
            policy: Mutex::new(None),
            observers,
        }
    }

    pub fn observers(&self) -> &Arc<ObserverRegistry> {
        &self.observers
    }

    // ---- actions ----

    pub fn register_action<F>(&self, id: impl Into<ActionId>, f: F, ram: u64) -> FaasResult<()>
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register_invokable(id, Invokable::new(f, ram))
    }

    /// Register a function with serde-convertible input and output
    pub fn register_typed_action<T, R, F>(
        &self,
        id: impl Into<ActionId>,
        f: F,
        ram: u64,
    ) -> FaasResult<()>
    where
        T: DeserializeOwned,
        R: Serialize,
        F: Fn(T) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        self.register_invokable(id, Invokable::typed(f, ram))
    }

    pub fn register_invokable(&self, id: impl Into<ActionId>, invokable: Invokable) -> FaasResult<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(FaasError::not_valid("action id must not be empty"));
        }
        match self.actions.entry(id) {
            Entry::Occupied(entry) => Err(FaasError::not_valid(format!(
                "action {} is already registered",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                info!(action = %entry.key(), ram = invokable.ram(), "Registered action");
                entry.insert(Arc::new(invokable));
                Ok(())
            }
        }
    }

    pub fn delete_action(&self, id: &ActionId) -> FaasResult<()> {
        match self.actions.remove(id) {
            Some(_) => {
                info!(action = %id, "Deleted action");
                Ok(())
            }
            None => Err(FaasError::not_valid(format!(
                "action {} is not registered",
                id
            ))),
        }
    }

    /// Registered actions sorted by id
    pub fn list_actions(&self) -> Vec<ActionInfo> {
        let mut actions: Vec<ActionInfo> = self
            .actions
            .iter()
            .map(|entry| ActionInfo {
                id: entry.key().clone(),
                ram: entry.value().ram(),
            })
            .collect();
        actions.sort_by(|a, b| a.id.cmp(&b.id));
        actions
    }

    fn action(&self, id: &ActionId) -> FaasResult<Arc<Invokable>> {
        self.actions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| FaasError::NoActionRegistered(id.clone()))
    }

    // ---- providers ----

    /// Add a top-level provider. It receives a copy of the active policy.
    pub fn register_invoker(&self, provider: ProviderRef) -> FaasResult<()> {
        let mut providers = self.providers.write();
        let id = provider.id().clone();
        if providers
            .iter()
            .any(|p| p.contains_provider(&id) || provider.contains_provider(p.id()))
        {
            return Err(FaasError::not_valid(format!("{} is already registered", id)));
        }
        if let Some(policy) = self.policy.lock().as_ref() {
            provider.set_policy_manager(policy.as_ref());
        }
        info!(invoker_id = %id, max_ram = provider.max_ram(), "Registered invoker");
        providers.push(provider);
        Ok(())
    }

    pub fn delete_invoker(&self, id: &InvokerId) -> FaasResult<()> {
        let mut providers = self.providers.write();
        let index = providers
            .iter()
            .position(|p| p.id() == id)
            .ok_or_else(|| FaasError::not_valid(format!("{} is not registered", id)))?;
        providers.remove(index);
        info!(invoker_id = %id, "Deleted invoker");
        Ok(())
    }

    /// Top-level providers in registration order
    pub fn invokers(&self) -> Vec<ProviderRef> {
        self.providers.read().clone()
    }

    /// Install the policy and push copies into every registered provider
    pub fn set_policy_manager(&self, policy: Box<dyn PolicyManager>) {
        for provider in self.providers.read().iter() {
            provider.set_policy_manager(policy.as_ref());
        }
        info!(policy = policy.name(), "Policy manager set");
        *self.policy.lock() = Some(policy);
    }

    pub fn policy_name(&self) -> Option<&'static str> {
        self.policy.lock().as_ref().map(|p| p.name())
    }

    /// Shut down every top-level provider and, through them, their subtrees
    pub fn shutdown_all_invokers(&self) {
        for provider in self.providers.read().iter() {
            provider.shutdown();
        }
        info!("All invokers shut down");
    }

    // ---- dispatch ----

    fn prepare(&self, count: usize, ram: u64) -> FaasResult<Vec<ProviderRef>> {
        let providers = self.invokers();
        {
            let mut guard = self.policy.lock();
            let policy = guard.as_mut().ok_or(FaasError::NoPolicyManagerRegistered)?;
            policy.prepare_distribution(&providers, count, ram);
        }
        for provider in &providers {
            provider.set_distribution_policy_manager(count, ram);
        }
        Ok(providers)
    }

    fn select(&self, providers: &[ProviderRef], ram: u64) -> FaasResult<ProviderRef> {
        let chosen = {
            let mut guard = self.policy.lock();
            let policy = guard.as_mut().ok_or(FaasError::NoPolicyManagerRegistered)?;
            policy.get_invoker(providers, ram)?
        };
        let target = chosen.select_invoker(ram)?;
        debug!(invoker_id = %target.id(), ram, "Selected invoker");
        Ok(target)
    }

    fn request(&self, id: &ActionId, invokable: &Arc<Invokable>, args: Value) -> InvocationRequest {
        InvocationRequest::new(id.clone(), Arc::clone(invokable), args)
            .with_observers(Arc::clone(&self.observers))
    }

    /// Run an action on the calling thread
    pub fn invoke(&self, id: impl AsRef<str>, args: Value) -> FaasResult<Value> {
        let id = ActionId::new(id.as_ref());
        let invokable = self.action(&id)?;
        let providers = self.prepare(1, invokable.ram())?;
        let target = self.select(&providers, invokable.ram())?;
        target.invoke(self.request(&id, &invokable, args))
    }

    /// Dispatch an action to a worker pool
    pub fn invoke_async(&self, id: impl AsRef<str>, args: Value) -> FaasResult<InvocationHandle> {
        let id = ActionId::new(id.as_ref());
        let invokable = self.action(&id)?;
        let providers = self.prepare(1, invokable.ram())?;
        let target = self.select(&providers, invokable.ram())?;
        target.invoke_async(self.request(&id, &invokable, args))
    }

    /// Dispatch one invocation per argument, planned as a single batch.
    ///
    /// Selection and dispatch alternate per element so that reservations made
    /// by earlier elements steer the choice for later ones.
    pub fn invoke_async_many(
        &self,
        id: impl AsRef<str>,
        args: Vec<Value>,
    ) -> FaasResult<Vec<InvocationHandle>> {
        let id = ActionId::new(id.as_ref());
        let invokable = self.action(&id)?;
        if args.is_empty() {
            return Err(FaasError::not_valid("argument list must not be empty"));
        }
        let ram = invokable.ram();
        let providers = self.prepare(args.len(), ram)?;
        debug!(action = %id, count = args.len(), ram, "Dispatching batch");

        args.into_iter()
            .map(|arg| {
                let target = self.select(&providers, ram)?;
                target.invoke_async(self.request(&id, &invokable, arg))
            })
            .collect()
    }

    /// Dispatch a batch and block until every result is in, in argument order.
    ///
    /// Parks the calling thread on each handle, which panics inside a tokio
    /// runtime. Async callers use [`Controller::invoke_all`] instead.
    pub fn invoke_many(&self, id: impl AsRef<str>, args: Vec<Value>) -> FaasResult<Vec<Value>> {
        let results: Vec<FaasResult<Value>> = self
            .invoke_async_many(id, args)?
            .into_iter()
            .map(InvocationHandle::wait)
            .collect();
        results.into_iter().collect()
    }

    /// Async counterpart of [`Controller::invoke_many`]
    pub async fn invoke_all(&self, id: impl AsRef<str>, args: Vec<Value>) -> FaasResult<Vec<Value>> {
        let handles = self.invoke_async_many(id, args)?;
        futures::future::join_all(handles)
            .await
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faas_invoker::{CompositeInvoker, LeafInvoker};
    use faas_policy::RoundRobin;
    use serde_json::json;

    fn leaf(id: &str, max_ram: u64) -> ProviderRef {
        Arc::new(LeafInvoker::with_id(InvokerId::new(id), max_ram, 1).unwrap())
    }

    fn ready() -> Controller {
        let controller = Controller::new();
        controller.set_policy_manager(Box::new(RoundRobin::new()));
        controller.register_invoker(leaf("a", 2)).unwrap();
        controller
    }

    #[test]
    fn test_action_registration() {
        let controller = Controller::new();
        controller.register_action("x", Ok, 1).unwrap();
        assert!(matches!(
            controller.register_action("x", Ok, 2),
            Err(FaasError::OperationNotValid(_))
        ));
        assert!(matches!(
            controller.register_action("", Ok, 1),
            Err(FaasError::OperationNotValid(_))
        ));

        controller.register_action("b", Ok, 3).unwrap();
        let ids: Vec<_> = controller
            .list_actions()
            .into_iter()
            .map(|a| (a.id.to_string(), a.ram))
            .collect();
        assert_eq!(ids, vec![("b".to_string(), 3), ("x".to_string(), 1)]);

        controller.delete_action(&ActionId::new("x")).unwrap();
        assert!(controller.delete_action(&ActionId::new("x")).is_err());
    }

    #[test]
    fn test_invoker_registration() {
        let controller = Controller::new();
        let a = leaf("a", 1);
        controller.register_invoker(a.clone()).unwrap();
        assert!(controller.register_invoker(a).is_err());

        let composite = CompositeInvoker::with_id(InvokerId::new("c"), 1, 1).unwrap();
        let nested = leaf("n", 1);
        faas_types::ResourceProvider::register_invoker(&composite, nested.clone()).unwrap();
        controller.register_invoker(Arc::new(composite)).unwrap();
        assert!(controller.register_invoker(nested).is_err());

        controller.delete_invoker(&InvokerId::new("a")).unwrap();
        assert!(controller.delete_invoker(&InvokerId::new("a")).is_err());
        assert_eq!(controller.invokers().len(), 1);
    }

    #[test]
    fn test_registered_invokers_receive_policy() {
        let controller = Controller::new();
        let composite = Arc::new(CompositeInvoker::with_id(InvokerId::new("c"), 1, 1).unwrap());
        controller.register_invoker(composite.clone()).unwrap();
        assert_eq!(composite.policy_name(), None);

        controller.set_policy_manager(Box::new(RoundRobin::new()));
        assert_eq!(composite.policy_name(), Some("round_robin"));

        let late = Arc::new(CompositeInvoker::with_id(InvokerId::new("late"), 1, 1).unwrap());
        controller.register_invoker(late.clone()).unwrap();
        assert_eq!(late.policy_name(), Some("round_robin"));
    }

    #[test]
    fn test_invoke_errors() {
        let controller = Controller::new();
        controller.register_invoker(leaf("a", 2)).unwrap();
        controller.register_action("x", Ok, 1).unwrap();
        assert!(matches!(
            controller.invoke("x", json!(1)),
            Err(FaasError::NoPolicyManagerRegistered)
        ));

        let controller = ready();
        assert!(matches!(
            controller.invoke("missing", json!(1)),
            Err(FaasError::NoActionRegistered(_))
        ));
        controller.register_action("big", Ok, 3).unwrap();
        assert!(controller.invoke("big", json!(1)).unwrap_err().is_no_invoker());
        controller.register_action("x", Ok, 1).unwrap();
        assert!(matches!(
            controller.invoke_many("x", vec![]),
            Err(FaasError::OperationNotValid(_))
        ));
    }

    #[test]
    fn test_invoke_paths_return_results() {
        let controller = ready();
        controller
            .register_action("inc", |v| Ok(json!(v.as_i64().unwrap_or(0) + 1)), 1)
            .unwrap();
        assert_eq!(controller.invoke("inc", json!(1)).unwrap(), json!(2));
        assert_eq!(
            controller.invoke_async("inc", json!(2)).unwrap().wait().unwrap(),
            json!(3)
        );
        assert_eq!(
            controller
                .invoke_many("inc", vec![json!(1), json!(2), json!(3)])
                .unwrap(),
            vec![json!(2), json!(3), json!(4)]
        );
    }

    #[test]
    fn test_typed_action() {
        let controller = ready();
        controller
            .register_typed_action("len", |s: String| Ok(s.len()), 1)
            .unwrap();
        assert_eq!(controller.invoke("len", json!("abcd")).unwrap(), json!(4));
        assert!(matches!(
            controller.invoke("len", json!(4)),
            Err(FaasError::ActionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_invoke_all_awaits_batch() {
        let controller = ready();
        controller.register_action("echo", Ok, 1).unwrap();
        let results = controller
            .invoke_all("echo", vec![json!("a"), json!("b")])
            .await
            .unwrap();
        assert_eq!(results, vec![json!("a"), json!("b")]);
    }
}
