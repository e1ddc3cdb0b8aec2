//! FaaS Types - shared vocabulary of the invocation scheduler
//!
//! This crate defines the contracts every other crate in the scheduler builds on:
//!
//! - **Invokable**: a registered callable paired with its RAM cost
//! - **ResourceProvider**: the capability shared by leaf and composite invokers
//! - **PolicyManager**: the pluggable algorithm that picks a provider for a RAM requirement
//! - **ObserverRegistry**: per-invocation telemetry hooks
//! - **FaasConfig**: serde configuration for topologies and policies
//!
//! Values flowing in and out of actions are opaque `serde_json::Value`s.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod ids;
pub mod invocation;
pub mod invokable;
pub mod observer;
pub mod policy;
pub mod provider;

pub use config::{FaasConfig, InvokerSpec, PolicyConfig, PolicyKind, TracingSettings};
pub use error::{FaasError, FaasResult};
pub use ids::{ActionId, InvocationId, InvokerId};
pub use invocation::{InvocationContext, InvocationHandle, InvocationOutcome, InvocationRequest};
pub use invokable::{ActionFn, Invokable};
pub use observer::{InvocationObserver, ObserverId, ObserverRegistry, ObserverSession};
pub use policy::{has_room, is_capable, PolicyManager};
pub use provider::{ProviderRef, ResourceProvider};

/// Opaque value consumed and produced by registered actions
pub use serde_json::Value;

/// RAM is accounted in abstract integer units
pub type Ram = u64;
