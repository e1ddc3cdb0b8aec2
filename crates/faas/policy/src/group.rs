//! Batch planning shared by the group policies
//!
//! A batch of `count` calls is split into groups of consecutive calls that land
//! on the same provider. The group size is the even share of the batch across
//! capable providers, shrunk to what the tightest provider can admit at once
//! when the batch fits the currently free RAM.

use faas_types::{is_capable, ProviderRef};
use tracing::debug;

/// Group size for a batch of `count` calls needing `ram` each
pub fn plan_group_size(providers: &[ProviderRef], count: usize, ram: u64) -> usize {
    if count <= 1 {
        return 1;
    }
    let capable: Vec<&ProviderRef> = providers
        .iter()
        .filter(|p| is_capable(p.as_ref(), ram))
        .collect();
    if capable.is_empty() {
        return 1;
    }
    let even = count.div_ceil(capable.len());
    if ram == 0 {
        return even;
    }

    let fits: Vec<(u64, usize)> = capable
        .iter()
        .map(|p| {
            let available = p.available_ram();
            (available, (available / ram) as usize)
        })
        .collect();
    let total: usize = fits.iter().map(|(_, fit)| fit).sum();
    if total < count {
        return even.max(1);
    }

    let tightest = fits
        .iter()
        .filter(|(_, fit)| *fit > 0)
        .min_by_key(|(available, _)| *available)
        .map(|(_, fit)| *fit)
        .unwrap_or(even);
    even.min(tightest).max(1)
}

/// Cursor and in-group counter of a group policy
#[derive(Debug, Clone)]
pub(crate) struct GroupState {
    pub(crate) group_size: usize,
    pub(crate) in_group: usize,
    pub(crate) cursor: Option<usize>,
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            group_size: 1,
            in_group: 0,
            cursor: None,
        }
    }
}

impl GroupState {
    pub(crate) fn plan(&mut self, providers: &[ProviderRef], count: usize, ram: u64) {
        self.group_size = plan_group_size(providers, count, ram);
        self.in_group = 0;
        debug!(count, ram, group_size = self.group_size, "Planned distribution");
    }

    /// A fresh group must be opened on the next provider
    pub(crate) fn needs_advance(&self) -> bool {
        self.cursor.is_none() || self.in_group == 0 || self.in_group >= self.group_size
    }

    pub(crate) fn advance(&mut self, n: usize) -> usize {
        let next = match self.cursor {
            None => 0,
            Some(c) => (c + 1) % n,
        };
        self.cursor = Some(next);
        self.in_group = 0;
        next
    }

    pub(crate) fn current(&self, n: usize) -> usize {
        self.cursor.unwrap_or(0) % n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::leaves;

    #[test]
    fn test_single_call_is_group_of_one() {
        let providers = leaves(&[4, 4]);
        assert_eq!(plan_group_size(&providers, 0, 1), 1);
        assert_eq!(plan_group_size(&providers, 1, 1), 1);
    }

    #[test]
    fn test_even_share_when_batch_fits() {
        assert_eq!(plan_group_size(&leaves(&[2, 2]), 4, 1), 2);
        assert_eq!(plan_group_size(&leaves(&[4, 4, 4]), 7, 1), 3);
    }

    #[test]
    fn test_tightest_provider_limits_group() {
        assert_eq!(plan_group_size(&leaves(&[1, 4]), 4, 1), 1);
    }

    #[test]
    fn test_overflowing_batch_uses_even_share() {
        assert_eq!(plan_group_size(&leaves(&[1, 1]), 4, 1), 2);
    }

    #[test]
    fn test_incapable_providers_are_ignored() {
        let providers = leaves(&[1, 8]);
        assert_eq!(plan_group_size(&providers, 2, 2), 2);
        assert_eq!(plan_group_size(&providers, 3, 16), 1);
    }

    #[test]
    fn test_zero_ram_uses_even_share() {
        assert_eq!(plan_group_size(&leaves(&[1, 1]), 5, 0), 3);
    }

    #[test]
    fn test_state_opens_new_group_after_plan() {
        let providers = leaves(&[2, 2]);
        let mut state = GroupState::default();
        assert!(state.needs_advance());
        assert_eq!(state.advance(2), 0);
        state.in_group = 1;
        state.plan(&providers, 4, 1);
        assert_eq!(state.group_size, 2);
        assert!(state.needs_advance());
        assert_eq!(state.advance(2), 1);
        assert_eq!(state.current(2), 1);
    }

    #[test]
    fn test_single_call_after_batch_plans_group_of_one() {
        let providers = leaves(&[4, 4]);
        let mut state = GroupState::default();
        state.plan(&providers, 4, 1);
        assert_eq!(state.group_size, 2);
        state.advance(2);
        state.in_group = 1;

        state.plan(&providers, 1, 1);
        assert_eq!(state.group_size, 1);
        assert!(state.needs_advance());
        assert_eq!(state.advance(2), 1);
    }
}
