//! CLI error types

use faas_observability::ObservabilityError;
use faas_types::FaasError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Scheduler(#[from] FaasError),

    #[error(transparent)]
    Observability(#[from] ObservabilityError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type CliResult<T> = Result<T, CliError>;
