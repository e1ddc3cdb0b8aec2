//! Planned groups of consecutive calls per provider

use crate::group::GroupState;
use faas_types::{is_capable, FaasError, FaasResult, PolicyManager, ProviderRef};
use tracing::warn;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Sends each planned group of calls to one provider, then moves to the next.
///
/// Fullness is not considered: a full provider still receives its group and
/// the calls wait for admission. A provider whose budget cannot cover the call
/// closes the group early and the next provider is tried, up to `max_attempts`
/// positions.
#[derive(Debug, Clone)]
pub struct BigGroup {
    state: GroupState,
    max_attempts: u32,
}

impl Default for BigGroup {
    fn default() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }
}

impl BigGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            state: GroupState::default(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn select(
        &mut self,
        providers: &[ProviderRef],
        ram: u64,
        attempt: u32,
    ) -> FaasResult<ProviderRef> {
        let n = providers.len();
        let index = if self.state.needs_advance() {
            self.state.advance(n)
        } else {
            self.state.current(n)
        };

        let provider = &providers[index];
        if !is_capable(provider.as_ref(), ram) {
            if attempt >= self.max_attempts {
                warn!(ram, attempts = attempt, "No capable provider within attempt budget");
                return Err(FaasError::no_invoker(ram));
            }
            self.state.in_group = 0;
            return self.select(providers, ram, attempt + 1);
        }

        self.state.in_group += 1;
        Ok(provider.clone())
    }
}

impl PolicyManager for BigGroup {
    fn name(&self) -> &'static str {
        "big_group"
    }

    fn get_invoker(&mut self, providers: &[ProviderRef], ram: u64) -> FaasResult<ProviderRef> {
        if !providers.iter().any(|p| is_capable(p.as_ref(), ram)) {
            return Err(FaasError::no_invoker(ram));
        }
        self.select(providers, ram, 1)
    }

    fn prepare_distribution(&mut self, providers: &[ProviderRef], invocation_count: usize, ram: u64) {
        self.state.plan(providers, invocation_count, ram);
    }

    fn copy(&self) -> Box<dyn PolicyManager> {
        Box::new(self.clone())
    }
}
