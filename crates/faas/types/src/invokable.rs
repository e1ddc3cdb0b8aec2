//! Invokable - a registered callable paired with its RAM cost

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Shared callable type stored in the action registry
pub type ActionFn = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// Immutable pairing of a callable and the RAM units it consumes while running
#[derive(Clone)]
pub struct Invokable {
    callable: ActionFn,
    ram: u64,
}

impl Invokable {
    pub fn new<F>(f: F, ram: u64) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            callable: Arc::new(f),
            ram,
        }
    }

    pub fn from_fn(callable: ActionFn, ram: u64) -> Self {
        Self { callable, ram }
    }

    /// Wrap a strongly-typed function, converting arguments and results through serde
    pub fn typed<T, R, F>(f: F, ram: u64) -> Self
    where
        T: DeserializeOwned,
        R: Serialize,
        F: Fn(T) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        Self::new(
            move |args: Value| {
                let input: T = serde_json::from_value(args)?;
                let output = f(input)?;
                Ok(serde_json::to_value(output)?)
            },
            ram,
        )
    }

    pub fn ram(&self) -> u64 {
        self.ram
    }

    pub fn callable(&self) -> &ActionFn {
        &self.callable
    }

    pub fn call(&self, args: Value) -> anyhow::Result<Value> {
        (self.callable)(args)
    }
}

impl fmt::Debug for Invokable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invokable")
            .field("ram", &self.ram)
            .finish_non_exhaustive()
    }
}
