//! FaaS Observability
//!
//! - **Tracing**: subscriber setup with env filter and plain or JSON output
//! - **Metrics**: a Prometheus observer counting invocations per action and invoker
//! - **Recorder**: an in-memory observer keeping the most recent invocation records

#![deny(unsafe_code)]

pub mod error;
pub mod metrics;
pub mod recorder;
pub mod tracing;

pub use error::{ObservabilityError, Result};
pub use metrics::{export_metrics, InvocationMetrics};
pub use recorder::{InvocationRecord, InvocationRecorder};
pub use crate::tracing::{init_tracing, TracingConfig};
