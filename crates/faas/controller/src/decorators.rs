//! Wrappers around action callables.
//!
//! Decorated callables keep the plain `Value -> Value` contract, so they are
//! registered and dispatched exactly like undecorated ones.

use dashmap::DashMap;
use faas_types::{ActionFn, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Memoize successful results keyed by the argument's JSON rendering.
///
/// Object keys serialize in sorted order, so equal arguments share one entry.
/// Errors are not cached.
pub fn cached(inner: ActionFn) -> ActionFn {
    let cache: Arc<DashMap<String, Value>> = Arc::new(DashMap::new());
    Arc::new(move |args: Value| {
        let key = args.to_string();
        if let Some(hit) = cache.get(&key) {
            debug!(key = %key, "Cache hit");
            return Ok(hit.value().clone());
        }
        let result = inner(args)?;
        cache.insert(key, result.clone());
        Ok(result)
    })
}

/// Log the wall time of every call under `name`
pub fn timed(name: impl Into<String>, inner: ActionFn) -> ActionFn {
    let name = name.into();
    Arc::new(move |args: Value| {
        let started = Instant::now();
        let result = inner(args);
        debug!(
            action = %name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            success = result.is_ok(),
            "Action timed"
        );
        result
    })
}
