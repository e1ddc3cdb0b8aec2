//! FaaS Policy - provider selection algorithms
//!
//! | policy | picks |
//! |---|---|
//! | [`RoundRobin`] | next capable provider in rotation, preferring one with room |
//! | [`GreedyGroup`] | tightest fit among providers with room, rotation when all are full |
//! | [`BigGroup`] | planned groups of consecutive calls, retrying past incapable providers |
//! | [`UniformGroup`] | planned groups of consecutive calls, skipping full providers |
//!
//! Every policy is a plain value; `copy()` hands out an independent instance so
//! each node of an invoker tree evolves its own cursor.

#![deny(unsafe_code)]

pub mod big_group;
pub mod greedy_group;
pub mod group;
pub mod round_robin;
pub mod uniform_group;

#[cfg(test)]
pub(crate) mod testing;

pub use big_group::BigGroup;
pub use greedy_group::GreedyGroup;
pub use group::plan_group_size;
pub use round_robin::RoundRobin;
pub use uniform_group::UniformGroup;

use faas_types::{PolicyConfig, PolicyKind, PolicyManager};

/// Build the policy described by `config`
pub fn build_policy(config: &PolicyConfig) -> Box<dyn PolicyManager> {
    match config.kind {
        PolicyKind::RoundRobin => Box::new(RoundRobin::new()),
        PolicyKind::GreedyGroup => Box::new(GreedyGroup::new()),
        PolicyKind::BigGroup => Box::new(BigGroup::with_max_attempts(
            config.big_group_max_attempts,
        )),
        PolicyKind::UniformGroup => {
            Box::new(UniformGroup::new().with_ignore_full(config.uniform_ignore_full))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::leaves;
    use faas_types::{is_capable, FaasError};
    use proptest::prelude::*;

    #[test]
    fn test_build_policy_for_every_kind() {
        for kind in PolicyKind::ALL {
            let config = PolicyConfig {
                kind,
                ..Default::default()
            };
            let policy = build_policy(&config);
            assert_eq!(policy.name(), kind.to_string());
        }
    }

    proptest! {
        #[test]
        fn property_policies_return_capable_providers(
            capacities in proptest::collection::vec(1u64..6, 0..5),
            reserved in proptest::collection::vec(0u64..6, 5),
            ram in 0u64..7,
            count in 1usize..6,
        ) {
            let providers = leaves(&capacities);
            for (p, r) in providers.iter().zip(&reserved) {
                p.reserve_ram(*r);
            }
            let any_capable = providers.iter().any(|p| is_capable(p.as_ref(), ram));

            let mut policies: Vec<Box<dyn PolicyManager>> = vec![
                Box::new(RoundRobin::new()),
                Box::new(GreedyGroup::new()),
                Box::new(BigGroup::with_max_attempts(64)),
                Box::new(UniformGroup::new()),
            ];
            for policy in policies.iter_mut() {
                policy.prepare_distribution(&providers, count, ram);
                for _ in 0..count {
                    match policy.get_invoker(&providers, ram) {
                        Ok(p) => prop_assert!(is_capable(p.as_ref(), ram)),
                        Err(FaasError::NoInvokerAvailable { .. }) => prop_assert!(!any_capable),
                        Err(other) => prop_assert!(false, "unexpected error {}", other),
                    }
                }
            }
        }
    }
}
