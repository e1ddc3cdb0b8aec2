//! PolicyManager - pluggable provider selection

use crate::error::FaasResult;
use crate::provider::{ProviderRef, ResourceProvider};
use std::fmt;

/// Chooses which provider of an ordered list serves a RAM requirement.
///
/// Implementations keep positional state (cursors, group counters). Every node
/// of an invoker tree owns its own instance obtained through [`PolicyManager::copy`],
/// so state never leaks between subtrees.
pub trait PolicyManager: Send + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Pick a provider whose `max_ram` covers `ram`.
    ///
    /// Fails with `FaasError::NoInvokerAvailable` when none is capable.
    fn get_invoker(&mut self, providers: &[ProviderRef], ram: u64) -> FaasResult<ProviderRef>;

    /// Plan a batch of `invocation_count` calls before they are dispatched
    fn prepare_distribution(
        &mut self,
        _providers: &[ProviderRef],
        _invocation_count: usize,
        _ram: u64,
    ) {
    }

    /// Fully independent instance carrying the same state
    fn copy(&self) -> Box<dyn PolicyManager>;
}

/// The provider's budget can ever hold `ram`
pub fn is_capable(provider: &dyn ResourceProvider, ram: u64) -> bool {
    provider.max_ram() >= ram
}

/// The provider is capable and not momentarily full for `ram`
pub fn has_room(provider: &dyn ResourceProvider, ram: u64) -> bool {
    let available = provider.available_ram();
    available > 0 && available >= ram
}
