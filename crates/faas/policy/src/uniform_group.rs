//! Planned groups that steer around full providers

use crate::group::GroupState;
use faas_types::{has_room, is_capable, FaasError, FaasResult, PolicyManager, ProviderRef};
use tracing::trace;

/// Like [`crate::BigGroup`], but a new group opens on the next capable
/// provider and, with `ignore_full`, skips ahead to one that currently has
/// room. When every capable provider is full the group stays where it opened.
#[derive(Debug, Clone)]
pub struct UniformGroup {
    state: GroupState,
    ignore_full: bool,
}

impl Default for UniformGroup {
    fn default() -> Self {
        Self {
            state: GroupState::default(),
            ignore_full: true,
        }
    }
}

impl UniformGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore_full(mut self, ignore_full: bool) -> Self {
        self.ignore_full = ignore_full;
        self
    }

    pub fn ignore_full(&self) -> bool {
        self.ignore_full
    }

    fn open_group(&mut self, providers: &[ProviderRef], ram: u64) -> FaasResult<usize> {
        let n = providers.len();
        let start = match self.state.cursor {
            None => 0,
            Some(c) => (c + 1) % n,
        };
        let mut index = (0..n)
            .map(|step| (start + step) % n)
            .find(|&i| is_capable(providers[i].as_ref(), ram))
            .ok_or_else(|| FaasError::no_invoker(ram))?;

        if self.ignore_full && !has_room(providers[index].as_ref(), ram) {
            let with_room = (1..n).map(|step| (index + step) % n).find(|&i| {
                let p = providers[i].as_ref();
                is_capable(p, ram) && has_room(p, ram)
            });
            if let Some(free) = with_room {
                trace!(skipped = index, chosen = free, "Skipped full provider");
                index = free;
            }
        }

        self.state.cursor = Some(index);
        self.state.in_group = 0;
        Ok(index)
    }
}

impl PolicyManager for UniformGroup {
    fn name(&self) -> &'static str {
        "uniform_group"
    }

    fn get_invoker(&mut self, providers: &[ProviderRef], ram: u64) -> FaasResult<ProviderRef> {
        let n = providers.len();
        if n == 0 {
            return Err(FaasError::no_invoker(ram));
        }
        let current = self.state.current(n);
        let index = if self.state.needs_advance() || !is_capable(providers[current].as_ref(), ram) {
            self.open_group(providers, ram)?
        } else {
            current
        };
        self.state.in_group += 1;
        Ok(providers[index].clone())
    }

    fn prepare_distribution(&mut self, providers: &[ProviderRef], invocation_count: usize, ram: u64) {
        self.state.plan(providers, invocation_count, ram);
    }

    fn copy(&self) -> Box<dyn PolicyManager> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{leaves, visits};

    #[test]
    fn test_groups_follow_plan() {
        let providers = leaves(&[2, 2]);
        let mut policy = UniformGroup::new();
        policy.prepare_distribution(&providers, 4, 1);
        assert_eq!(visits(&mut policy, &providers, 1, 4, false), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_tight_provider_shrinks_groups() {
        let providers = leaves(&[1, 4]);
        let mut policy = UniformGroup::new().with_ignore_full(false);
        policy.prepare_distribution(&providers, 4, 1);
        assert_eq!(visits(&mut policy, &providers, 1, 4, false), vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_skips_full_provider() {
        let providers = leaves(&[2, 2]);
        providers[0].reserve_ram(2);

        let mut skipping = UniformGroup::new();
        skipping.prepare_distribution(&providers, 2, 1);
        assert_eq!(visits(&mut skipping, &providers, 1, 2, false), vec![1, 1]);

        let mut strict = UniformGroup::new().with_ignore_full(false);
        strict.prepare_distribution(&providers, 2, 1);
        assert_eq!(visits(&mut strict, &providers, 1, 2, false), vec![0, 1]);
    }

    #[test]
    fn test_all_full_keeps_capable_provider() {
        let providers = leaves(&[1, 1]);
        for p in &providers {
            p.reserve_ram(1);
        }
        let mut policy = UniformGroup::new();
        assert_eq!(visits(&mut policy, &providers, 1, 3, false), vec![0, 1, 0]);
    }

    #[test]
    fn test_skips_incapable_provider() {
        let providers = leaves(&[1, 4, 1, 4]);
        let mut policy = UniformGroup::new();
        assert_eq!(visits(&mut policy, &providers, 2, 3, false), vec![1, 3, 1]);
    }

    #[test]
    fn test_copy_carries_cursor() {
        let providers = leaves(&[2, 2, 2]);
        let mut policy = UniformGroup::new();
        visits(&mut policy, &providers, 1, 1, false);
        let mut copy = policy.copy();
        assert_eq!(visits(copy.as_mut(), &providers, 1, 1, false), vec![1]);
        assert_eq!(visits(&mut policy, &providers, 1, 1, false), vec![1]);
    }
}
