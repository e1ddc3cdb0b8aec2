//! Topology construction from configuration

use crate::controller::Controller;
use faas_invoker::{CompositeInvoker, LeafInvoker};
use faas_policy::build_policy;
use faas_types::{
    FaasConfig, FaasResult, InvokerId, InvokerSpec, PolicyManager, ProviderRef, ResourceProvider,
};
use std::sync::Arc;
use tracing::debug;

/// Build the provider described by `spec`, recursing into its children.
///
/// Composites receive a copy of `policy` before their children are attached,
/// so every node of the subtree ends up with its own instance.
pub fn build_provider(spec: &InvokerSpec, policy: &dyn PolicyManager) -> FaasResult<ProviderRef> {
    let id = spec
        .id
        .as_deref()
        .map(InvokerId::new)
        .unwrap_or_else(InvokerId::generate);

    if !spec.is_composite() {
        debug!(invoker_id = %id, max_ram = spec.max_ram, "Building leaf");
        return Ok(Arc::new(LeafInvoker::with_id(id, spec.max_ram, spec.threads)?));
    }

    let composite = CompositeInvoker::with_id(id, spec.max_ram, spec.threads)?;
    composite.set_policy_manager(policy);
    for child in &spec.children {
        composite.register_invoker(build_provider(child, policy)?)?;
    }
    debug!(
        invoker_id = %composite.id(),
        children = spec.children.len(),
        "Built composite"
    );
    Ok(Arc::new(composite))
}

impl Controller {
    /// Validate `config` and build a controller with its policy and topology
    pub fn from_config(config: &FaasConfig) -> FaasResult<Self> {
        config.validate()?;
        let controller = Controller::new();
        let policy = build_policy(&config.policy);
        for spec in &config.invokers {
            controller.register_invoker(build_provider(spec, policy.as_ref())?)?;
        }
        controller.set_policy_manager(policy);
        Ok(controller)
    }
}
