//! Separation of subdomain free dofs into corner, remainder and boundary sets.

use crate::error::SolverError;
use crate::mapping::CornerBooleanMatrix;
use crate::model::{Dof, Model};
use crate::ordering::FreeDofOrderings;
use rustc_hash::FxHashSet;
use std::collections::BTreeSet;

/// Selects, per subdomain, the mesh nodes kept in the coarse (corner) problem.
pub trait CornerNodeSelection {
    fn select_corner_nodes(&self, model: &Model) -> Vec<FxHashSet<usize>>;
}

/// Designates an explicit set of mesh nodes as corner nodes; each subdomain
/// receives the intersection of that set with its own nodes.
#[derive(Debug, Clone)]
pub struct UserDefinedCornerNodes {
    nodes: FxHashSet<usize>,
}

impl UserDefinedCornerNodes {
    pub fn new(nodes: impl IntoIterator<Item = usize>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }
}

impl CornerNodeSelection for UserDefinedCornerNodes {
    fn select_corner_nodes(&self, model: &Model) -> Vec<FxHashSet<usize>> {
        model
            .subdomains()
            .iter()
            .map(|sub| {
                sub.nodes()
                    .iter()
                    .copied()
                    .filter(|node| self.nodes.contains(node))
                    .collect()
            })
            .collect()
    }
}

const UNMAPPED: usize = usize::MAX;

/// The result of separating every subdomain's free dofs.
///
/// All index arrays preserve the order of the underlying free-dof ordering.
/// `boundary_dofs`/`internal_dofs` partition the positions of the remainder
/// array (not the free-dof indices themselves): a remainder dof is "boundary"
/// if its node is shared with at least one other subdomain.
#[derive(Debug, Clone)]
pub struct DofSeparation {
    remainder_dofs: Vec<Vec<usize>>,
    corner_dofs: Vec<Vec<usize>>,
    boundary_dofs: Vec<Vec<usize>>,
    internal_dofs: Vec<Vec<usize>>,
    boundary_dof_keys: Vec<Vec<Dof>>,
    // local free index -> position in the remainder array, UNMAPPED for corner dofs
    remainder_positions: Vec<Vec<usize>>,
    corner_maps: Vec<CornerBooleanMatrix>,
    global_corner_dofs: Vec<Dof>,
}

impl DofSeparation {
    /// Local free-dof indices of subdomain `s` eliminated by local factorization.
    pub fn remainder_dofs(&self, s: usize) -> &[usize] {
        &self.remainder_dofs[s]
    }

    /// Local free-dof indices of subdomain `s` kept in the coarse problem.
    pub fn corner_dofs(&self, s: usize) -> &[usize] {
        &self.corner_dofs[s]
    }

    /// Positions (into the remainder array of `s`) of the shared boundary dofs.
    pub fn boundary_dofs(&self, s: usize) -> &[usize] {
        &self.boundary_dofs[s]
    }

    /// Positions (into the remainder array of `s`) of the purely local dofs.
    pub fn internal_dofs(&self, s: usize) -> &[usize] {
        &self.internal_dofs[s]
    }

    /// The (node, component) keys of the boundary dofs of `s`, aligned with
    /// [`Self::boundary_dofs`].
    pub fn boundary_dof_keys(&self, s: usize) -> &[Dof] {
        &self.boundary_dof_keys[s]
    }

    /// Position of local free dof `index` of subdomain `s` within the
    /// remainder array, or `None` for a corner dof.
    pub fn remainder_position(&self, s: usize, index: usize) -> Option<usize> {
        match self.remainder_positions[s][index] {
            UNMAPPED => None,
            position => Some(position),
        }
    }

    pub fn corner_map(&self, s: usize) -> &CornerBooleanMatrix {
        &self.corner_maps[s]
    }

    pub fn num_global_corner_dofs(&self) -> usize {
        self.global_corner_dofs.len()
    }

    /// The corner dofs in global corner-index order.
    pub fn global_corner_dofs(&self) -> &[Dof] {
        &self.global_corner_dofs
    }
}

/// Partition each subdomain's free dofs into corner and remainder sets and
/// build the corner mapping matrices.
///
/// A dof is a corner dof iff its node belongs to the subdomain's corner-node
/// set; everything else is remainder. Global corner numbering is assigned in
/// one pass over the sorted set of distinct corner dofs, so a corner dof
/// shared by several subdomains maps to the same global index everywhere.
pub fn separate_dofs(
    model: &Model,
    orderings: &FreeDofOrderings,
    corner_nodes: &[FxHashSet<usize>],
) -> Result<DofSeparation, SolverError> {
    assert_eq!(corner_nodes.len(), model.num_subdomains());

    // The corner status of a node must be consistent across every subdomain
    // containing it, otherwise the coarse numbering would be ambiguous.
    for (s, nodes) in corner_nodes.iter().enumerate() {
        for &node in nodes {
            if !model.subdomain(s).contains_node(node) {
                return Err(SolverError::Configuration(format!(
                    "Corner node {} is not a node of subdomain {}.",
                    node, s
                )));
            }
            for &other in model.node_subdomains(node) {
                if !corner_nodes[other].contains(&node) {
                    return Err(SolverError::Configuration(format!(
                        "Node {} is a corner node of subdomain {} but not of subdomain {}.",
                        node, s, other
                    )));
                }
            }
            if model.node_multiplicity(node) < 2 {
                log::warn!(
                    "Corner node {} belongs to a single subdomain and does not couple anything.",
                    node
                );
            }
        }
    }

    // Global corner numbering: one pass over the distinct corner dofs in
    // (node, component) order.
    let mut distinct_corner_dofs = BTreeSet::new();
    for nodes in corner_nodes {
        for &node in nodes {
            for component in 0..model.solution_dim() {
                let dof = Dof::new(node, component);
                if !model.is_constrained(dof) {
                    distinct_corner_dofs.insert(dof);
                }
            }
        }
    }
    let global_corner_dofs: Vec<Dof> = distinct_corner_dofs.into_iter().collect();
    if global_corner_dofs.is_empty() {
        return Err(SolverError::Configuration(
            "Corner node selection yields zero corner dofs; the coarse problem would be singular."
                .to_string(),
        ));
    }
    let global_index_of = |dof: &Dof| {
        global_corner_dofs
            .binary_search(dof)
            .expect("Internal error: corner dof missing from global numbering")
    };

    let num_subdomains = model.num_subdomains();
    let mut remainder_dofs = Vec::with_capacity(num_subdomains);
    let mut corner_dofs = Vec::with_capacity(num_subdomains);
    let mut boundary_dofs = Vec::with_capacity(num_subdomains);
    let mut internal_dofs = Vec::with_capacity(num_subdomains);
    let mut boundary_dof_keys = Vec::with_capacity(num_subdomains);
    let mut remainder_positions = Vec::with_capacity(num_subdomains);
    let mut corner_maps = Vec::with_capacity(num_subdomains);

    for s in 0..num_subdomains {
        let ordering = orderings.subdomain(s);
        let mut remainder = Vec::new();
        let mut corner = Vec::new();
        let mut boundary = Vec::new();
        let mut internal = Vec::new();
        let mut keys = Vec::new();
        let mut positions = vec![UNMAPPED; ordering.num_free_dofs()];
        let mut corner_globals = Vec::new();

        for (index, dof) in ordering.dofs().iter().enumerate() {
            if corner_nodes[s].contains(&dof.node) {
                corner.push(index);
                corner_globals.push(global_index_of(dof));
            } else {
                positions[index] = remainder.len();
                if model.is_boundary_node(dof.node) {
                    boundary.push(remainder.len());
                    keys.push(*dof);
                } else {
                    internal.push(remainder.len());
                }
                remainder.push(index);
            }
        }

        remainder_dofs.push(remainder);
        corner_dofs.push(corner);
        boundary_dofs.push(boundary);
        internal_dofs.push(internal);
        boundary_dof_keys.push(keys);
        remainder_positions.push(positions);
        corner_maps.push(CornerBooleanMatrix::new(global_corner_dofs.len(), corner_globals));
    }

    Ok(DofSeparation {
        remainder_dofs,
        corner_dofs,
        boundary_dofs,
        internal_dofs,
        boundary_dof_keys,
        remainder_positions,
        corner_maps,
        global_corner_dofs,
    })
}
