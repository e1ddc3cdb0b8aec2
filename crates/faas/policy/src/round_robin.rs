//! Round robin over capable providers

use faas_types::{has_room, is_capable, FaasError, FaasResult, PolicyManager, ProviderRef};

/// Rotates through the providers whose budget covers the request.
///
/// The position after the last pick is preferred. When that provider is full
/// the rest of the cycle is scanned for one with room; when every capable
/// provider is full the preferred one is returned anyway and the call waits
/// for admission there.
#[derive(Debug, Clone, Default)]
pub struct RoundRobin {
    last: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PolicyManager for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn get_invoker(&mut self, providers: &[ProviderRef], ram: u64) -> FaasResult<ProviderRef> {
        let n = providers.len();
        let pointed = (1..=n)
            .map(|step| (self.last + step) % n)
            .find(|&i| is_capable(providers[i].as_ref(), ram))
            .ok_or_else(|| FaasError::no_invoker(ram))?;

        let chosen = (0..n)
            .map(|step| (pointed + step) % n)
            .find(|&i| {
                let p = providers[i].as_ref();
                is_capable(p, ram) && has_room(p, ram)
            })
            .unwrap_or(pointed);

        self.last = chosen;
        Ok(providers[chosen].clone())
    }

    fn copy(&self) -> Box<dyn PolicyManager> {
        Box::new(self.clone())
    }
}
