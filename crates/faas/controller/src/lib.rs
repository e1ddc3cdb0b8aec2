//! FaaS Controller - entry point of the invocation scheduler
//!
//! The [`Controller`] owns the action registry and the flat list of top-level
//! providers. Every invocation looks up the registered [`faas_types::Invokable`],
//! plans the batch with the active policy, then walks the provider tree
//! top-down until a leaf (or a composite's own budget) accepts the work.
//!
//! ```no_run
//! use faas_controller::Controller;
//! use faas_invoker::LeafInvoker;
//! use faas_policy::RoundRobin;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn main() -> faas_types::FaasResult<()> {
//! let controller = Controller::new();
//! controller.set_policy_manager(Box::new(RoundRobin::new()));
//! controller.register_invoker(Arc::new(LeafInvoker::new(4, 2)?))?;
//! controller.register_action("double", |v| Ok(json!(v.as_i64().unwrap_or(0) * 2)), 1)?;
//! assert_eq!(controller.invoke("double", json!(21))?, json!(42));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod builder;
pub mod controller;
pub mod decorators;

pub use builder::build_provider;
pub use controller::{ActionInfo, Controller};
