//! Provider fixtures for policy tests

use faas_invoker::LeafInvoker;
use faas_types::{InvokerId, PolicyManager, ProviderRef};
use std::sync::Arc;

/// Leaves named `p0`, `p1`, ... with the given budgets
pub(crate) fn leaves(capacities: &[u64]) -> Vec<ProviderRef> {
    capacities
        .iter()
        .enumerate()
        .map(|(i, max_ram)| {
            let leaf = LeafInvoker::with_id(InvokerId::new(format!("p{}", i)), *max_ram, 1)
                .expect("leaf");
            Arc::new(leaf) as ProviderRef
        })
        .collect()
}

pub(crate) fn index_of(providers: &[ProviderRef], chosen: &ProviderRef) -> usize {
    providers
        .iter()
        .position(|p| p.id() == chosen.id())
        .expect("chosen provider is in the list")
}

/// Indices visited by `n` selections. With `hold`, each pick keeps its RAM
/// reserved, as dispatched-but-unfinished work would.
pub(crate) fn visits(
    policy: &mut dyn PolicyManager,
    providers: &[ProviderRef],
    ram: u64,
    n: usize,
    hold: bool,
) -> Vec<usize> {
    (0..n)
        .map(|_| {
            let chosen = policy.get_invoker(providers, ram).expect("provider");
            if hold {
                chosen.reserve_ram(ram);
            }
            index_of(providers, &chosen)
        })
        .collect()
}
