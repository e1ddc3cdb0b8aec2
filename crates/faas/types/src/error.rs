//! Scheduler error types

use crate::ids::{ActionId, InvocationId, InvokerId};
use thiserror::Error;

/// Errors raised by invokers, policy managers and the controller
#[derive(Debug, Error)]
pub enum FaasError {
    #[error("No invoker available for {ram} units of RAM")]
    NoInvokerAvailable { ram: u64 },

    #[error("No policy manager registered")]
    NoPolicyManagerRegistered,

    #[error("Operation not valid: {0}")]
    OperationNotValid(String),

    #[error("No action registered with id: {0}")]
    NoActionRegistered(ActionId),

    #[error("Remote communication failed: {0}")]
    RemoteCommunication(String),

    #[error("Action {action} failed: {reason}")]
    ActionFailed { action: ActionId, reason: String },

    #[error("Invoker is shut down: {0}")]
    InvokerShutdown(InvokerId),

    #[error("Worker dropped the result of {0}")]
    WorkerLost(InvocationId),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl FaasError {
    pub fn no_invoker(ram: u64) -> Self {
        FaasError::NoInvokerAvailable { ram }
    }

    pub fn not_valid(reason: impl Into<String>) -> Self {
        FaasError::OperationNotValid(reason.into())
    }

    /// True for the failures a composite may absorb by running the work itself
    pub fn is_no_invoker(&self) -> bool {
        matches!(self, FaasError::NoInvokerAvailable { .. })
    }
}

impl From<toml::de::Error> for FaasError {
    fn from(e: toml::de::Error) -> Self {
        FaasError::InvalidConfiguration(e.to_string())
    }
}

/// Result type for scheduler operations
pub type FaasResult<T> = std::result::Result<T, FaasError>;
