//! FaaS Invoker - compute resources of the scheduler
//!
//! - **LeafInvoker**: RAM budget plus a fixed-size worker pool
//! - **CompositeInvoker**: delegates to child providers through its own policy
//!   manager and falls back to its own budget
//! - **RamLedger**: blocking admission control shared by both
//!
//! Both invoker kinds implement `faas_types::ResourceProvider`, so trees of any
//! depth can be assembled from them.

#![deny(unsafe_code)]

pub mod composite;
pub mod executor;
pub mod leaf;
pub mod ledger;
pub mod pool;

pub use composite::CompositeInvoker;
pub use executor::Executor;
pub use leaf::LeafInvoker;
pub use ledger::{RamLedger, RamPermit};
pub use pool::{effective_pool_size, WorkerPool};
