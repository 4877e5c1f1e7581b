//! Dependency ordering of install plan steps.
//!
//! Kahn's algorithm over "provider → dependent" edges, always taking the
//! ready node that appeared first so the output is deterministic and keeps
//! request order among independent modules.  Nodes caught in a cycle are
//! appended in appearance order.

use okapi_kernel::ModuleDescriptor;
use std::collections::BTreeSet;

/// Indices of `nodes` with every provider before its dependents.
pub(crate) fn providers_first(nodes: &[&ModuleDescriptor]) -> Vec<usize> {
    topological_sort(nodes.len(), &edges(nodes))
}

/// Indices of `nodes` with every dependent before its providers.
pub(crate) fn dependents_first(nodes: &[&ModuleDescriptor]) -> Vec<usize> {
    let reversed: Vec<(usize, usize)> = edges(nodes).into_iter().map(|(p, d)| (d, p)).collect();
    topological_sort(nodes.len(), &reversed)
}

/// `(provider, dependent)` pairs among `nodes`, required or optional.
fn edges(nodes: &[&ModuleDescriptor]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for (d, dependent) in nodes.iter().enumerate() {
        for reference in dependent.requires.iter().chain(&dependent.optional) {
            for (p, provider) in nodes.iter().enumerate() {
                if p != d && provider.satisfies(reference) && !out.contains(&(p, d)) {
                    out.push((p, d));
                }
            }
        }
    }
    out
}

fn topological_sort(len: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut in_degree = vec![0usize; len];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); len];
    for &(from, to) in edges {
        outgoing[from].push(to);
        in_degree[to] += 1;
    }

    let mut ready: BTreeSet<usize> = (0..len).filter(|&i| in_degree[i] == 0).collect();
    let mut result = Vec::with_capacity(len);
    while let Some(node) = ready.pop_first() {
        result.push(node);
        for &next in &outgoing[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if result.len() != len {
        let placed: BTreeSet<usize> = result.iter().copied().collect();
        result.extend((0..len).filter(|i| !placed.contains(i)));
    }
    result
}
