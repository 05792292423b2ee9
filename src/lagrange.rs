//! Lagrange multiplier enumeration and the signed Boolean coupling matrices.

use crate::error::SolverError;
use crate::mapping::SignedBooleanMatrix;
use crate::model::{Dof, Model};
use crate::ordering::FreeDofOrderings;
use crate::separation::DofSeparation;

/// Constraint pattern at dofs shared by more than two subdomains.
///
/// Only the fully redundant pattern (one constraint per subdomain pair) is
/// implemented; it is the validated behavior of the method. Requesting the
/// reduced pattern fails instead of guessing its semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrosspointStrategy {
    FullyRedundant,
    MinimumConstraints,
}

/// One continuity constraint between two subdomain instances of a shared dof.
///
/// The sign convention is canonical: the subdomain with the lower id receives
/// the positive coefficient, so enumeration is unambiguous regardless of
/// traversal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LagrangeMultiplier {
    pub dof: Dof,
    pub positive_subdomain: usize,
    pub negative_subdomain: usize,
}

/// The enumerated multipliers and the per-subdomain jump matrices `Br`.
#[derive(Debug, Clone)]
pub struct LagrangeEnumeration {
    multipliers: Vec<LagrangeMultiplier>,
    jump_matrices: Vec<SignedBooleanMatrix>,
}

impl LagrangeEnumeration {
    pub fn num_multipliers(&self) -> usize {
        self.multipliers.len()
    }

    pub fn multipliers(&self) -> &[LagrangeMultiplier] {
        &self.multipliers
    }

    /// The jump matrix of subdomain `s`, over its remainder-dof columns.
    pub fn jump_matrix(&self, s: usize) -> &SignedBooleanMatrix {
        &self.jump_matrices[s]
    }
}

/// Assign one Lagrange multiplier to every pair of subdomains sharing a free
/// boundary dof, and build the signed Boolean matrices enforcing continuity.
///
/// Boundary dofs are visited in (node, component) order and subdomain pairs
/// in ascending id order, so multiplier numbering is deterministic.
pub fn enumerate_lagrange_multipliers(
    model: &Model,
    orderings: &FreeDofOrderings,
    separation: &DofSeparation,
    strategy: CrosspointStrategy,
) -> Result<LagrangeEnumeration, SolverError> {
    match strategy {
        CrosspointStrategy::FullyRedundant => {}
        CrosspointStrategy::MinimumConstraints => {
            return Err(SolverError::Unimplemented(
                "the minimum-constraints crosspoint strategy; use CrosspointStrategy::FullyRedundant",
            ))
        }
    }

    let mut multipliers = Vec::new();
    // (multiplier, subdomain, remainder position, positive?) in discovery order
    let mut entries: Vec<(usize, usize, usize, bool)> = Vec::new();

    for node in 0..model.num_nodes() {
        if !model.is_boundary_node(node) {
            continue;
        }
        let sharing = model.node_subdomains(node);
        // Corner nodes are coupled through the coarse problem, not through
        // multipliers; they are recognized by having no remainder position.
        for component in 0..model.solution_dim() {
            let dof = Dof::new(node, component);
            if model.is_constrained(dof) {
                continue;
            }
            // Remainder position of this dof in each sharing subdomain;
            // `None` means the dof is a corner dof there.
            let positions: Vec<Option<usize>> = sharing
                .iter()
                .map(|&s| {
                    let local = orderings
                        .subdomain(s)
                        .index_of(dof)
                        .expect("Internal error: shared dof must be free in every sharing subdomain");
                    separation.remainder_position(s, local)
                })
                .collect();
            if positions.iter().any(Option::is_none) {
                debug_assert!(
                    positions.iter().all(Option::is_none),
                    "Corner status must be consistent across subdomains"
                );
                continue;
            }

            // Fully redundant constraints: one multiplier per subdomain pair.
            for i in 0..sharing.len() {
                for j in (i + 1)..sharing.len() {
                    let index = multipliers.len();
                    multipliers.push(LagrangeMultiplier {
                        dof,
                        positive_subdomain: sharing[i],
                        negative_subdomain: sharing[j],
                    });
                    entries.push((index, sharing[i], positions[i].unwrap(), true));
                    entries.push((index, sharing[j], positions[j].unwrap(), false));
                }
            }
        }
    }

    let num_multipliers = multipliers.len();
    let mut jump_matrices: Vec<SignedBooleanMatrix> = (0..model.num_subdomains())
        .map(|s| SignedBooleanMatrix::new(num_multipliers, separation.remainder_dofs(s).len()))
        .collect();
    for (multiplier, subdomain, position, positive) in entries {
        jump_matrices[subdomain].push(multiplier, position, positive);
    }

    Ok(LagrangeEnumeration {
        multipliers,
        jump_matrices,
    })
}
