//! Free-dof orderings.
//!
//! Every index set used by the decomposition is derived from these orderings,
//! so they must be stable: dofs are numbered node-major (nodes ascending,
//! components ascending within a node), skipping constrained dofs.

use crate::model::{Dof, Model};
use rustc_hash::FxHashMap;

/// A bijection between the free dofs of a dof set and contiguous indices.
#[derive(Debug, Clone)]
pub struct DofOrdering {
    indices: FxHashMap<Dof, usize>,
    dofs: Vec<Dof>,
}

impl DofOrdering {
    fn node_major<'a>(
        nodes: impl Iterator<Item = usize>,
        solution_dim: usize,
        is_constrained: impl Fn(Dof) -> bool + 'a,
    ) -> Self {
        let mut indices = FxHashMap::default();
        let mut dofs = Vec::new();
        for node in nodes {
            for component in 0..solution_dim {
                let dof = Dof::new(node, component);
                if !is_constrained(dof) {
                    indices.insert(dof, dofs.len());
                    dofs.push(dof);
                }
            }
        }
        Self { indices, dofs }
    }

    pub fn num_free_dofs(&self) -> usize {
        self.dofs.len()
    }

    /// The index of `dof`, or `None` if it is constrained or not part of
    /// this dof set.
    pub fn index_of(&self, dof: Dof) -> Option<usize> {
        self.indices.get(&dof).copied()
    }

    /// The dofs in index order.
    pub fn dofs(&self) -> &[Dof] {
        &self.dofs
    }
}

/// Free-dof orderings for the whole model: one global, one per subdomain,
/// plus local-to-global index maps.
#[derive(Debug, Clone)]
pub struct FreeDofOrderings {
    global: DofOrdering,
    subdomain: Vec<DofOrdering>,
    to_global: Vec<Vec<usize>>,
}

impl FreeDofOrderings {
    pub fn num_global_free_dofs(&self) -> usize {
        self.global.num_free_dofs()
    }

    pub fn global(&self) -> &DofOrdering {
        &self.global
    }

    pub fn subdomain(&self, id: usize) -> &DofOrdering {
        &self.subdomain[id]
    }

    /// Map from local free-dof indices of subdomain `id` to global free-dof
    /// indices.
    pub fn to_global(&self, id: usize) -> &[usize] {
        &self.to_global[id]
    }

    /// Sum of the free-dof counts of all subdomains. Shared dofs are counted
    /// once per subdomain containing them.
    pub fn num_expanded_free_dofs(&self) -> usize {
        self.subdomain.iter().map(DofOrdering::num_free_dofs).sum()
    }
}

/// Strategy deciding how free dofs are numbered.
pub trait DofOrderingStrategy {
    fn order_free_dofs(&self, model: &Model) -> FreeDofOrderings;
}

/// Node-major ordering: nodes ascending, solution components ascending.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeMajorOrdering;

impl DofOrderingStrategy for NodeMajorOrdering {
    fn order_free_dofs(&self, model: &Model) -> FreeDofOrderings {
        let global = DofOrdering::node_major(0..model.num_nodes(), model.solution_dim(), |dof| {
            model.is_constrained(dof)
        });
        let subdomain: Vec<_> = model
            .subdomains()
            .iter()
            .map(|sub| {
                DofOrdering::node_major(sub.nodes().iter().copied(), model.solution_dim(), |dof| {
                    model.is_constrained(dof)
                })
            })
            .collect();
        let to_global = subdomain
            .iter()
            .map(|ordering| {
                ordering
                    .dofs()
                    .iter()
                    .map(|&dof| {
                        global
                            .index_of(dof)
                            .expect("Internal error: subdomain free dof must be globally free")
                    })
                    .collect()
            })
            .collect();
        FreeDofOrderings {
            global,
            subdomain,
            to_global,
        }
    }
}
