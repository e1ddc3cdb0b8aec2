//! Tracing subscriber initialization

use crate::error::{ObservabilityError, Result};
use faas_types::TracingSettings;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter, overridden by `RUST_LOG`
    pub log_level: String,

    /// Emit JSON lines instead of human readable output
    pub json_format: bool,

    /// Include thread names, useful when following pooled workers
    pub thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_format: false,
            thread_names: false,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON format
    pub fn with_json_format(mut self) -> Self {
        self.json_format = true;
        self
    }

    pub fn with_thread_names(mut self) -> Self {
        self.thread_names = true;
        self
    }
}

impl From<&TracingSettings> for TracingConfig {
    fn from(settings: &TracingSettings) -> Self {
        Self {
            log_level: settings.level.clone(),
            json_format: settings.json,
            thread_names: false,
        }
    }
}

/// Install the global subscriber.
///
/// Fails with [`ObservabilityError::TracingInit`] when a subscriber is already set.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| ObservabilityError::TracingInit(e.to_string()))?;

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let installed = if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_names(config.thread_names);
        subscriber.with(fmt_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_names(config.thread_names);
        subscriber.with(fmt_layer).try_init()
    };
    installed.map_err(|e| ObservabilityError::TracingInit(e.to_string()))
}
