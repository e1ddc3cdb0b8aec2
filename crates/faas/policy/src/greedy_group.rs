//! Best-fit selection with a rotating fallback

use faas_types::{has_room, is_capable, FaasError, FaasResult, PolicyManager, ProviderRef};
use tracing::trace;

/// Packs calls onto the provider with the least free RAM that still fits them,
/// filling small providers before spilling onto larger ones. When every capable
/// provider is full, rotates over them like [`crate::RoundRobin`].
#[derive(Debug, Clone, Default)]
pub struct GreedyGroup {
    last: usize,
}

impl GreedyGroup {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyManager for GreedyGroup {
    fn name(&self) -> &'static str {
        "greedy_group"
    }

    fn get_invoker(&mut self, providers: &[ProviderRef], ram: u64) -> FaasResult<ProviderRef> {
        let tightest = providers
            .iter()
            .enumerate()
            .filter(|(_, p)| is_capable(p.as_ref(), ram) && has_room(p.as_ref(), ram))
            .min_by_key(|(i, p)| (p.available_ram(), *i));
        if let Some((index, provider)) = tightest {
            trace!(index, available = provider.available_ram(), "Tightest fit");
            return Ok(provider.clone());
        }

        let n = providers.len();
        let next = (1..=n)
            .map(|step| (self.last + step) % n)
            .find(|&i| is_capable(providers[i].as_ref(), ram))
            .ok_or_else(|| FaasError::no_invoker(ram))?;
        self.last = next;
        Ok(providers[next].clone())
    }

    fn copy(&self) -> Box<dyn PolicyManager> {
        Box::new(self.clone())
    }
}
