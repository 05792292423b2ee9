//! Weighting of shared boundary dofs across subdomains.
//!
//! Whenever a quantity lives on a dof shared by several subdomains — an
//! applied load, a displacement gather, a preconditioner scaling — each
//! subdomain carries a weight, and the weights of the sharing subdomains sum
//! to one.

use crate::error::SolverError;
use crate::model::{Dof, Model};
use crate::ordering::FreeDofOrderings;
use fetidp_sparse::extract::{extract_diagonal, scatter_add_into};
use nalgebra::{DVector, RealField};
use nalgebra_sparse::CsrMatrix;
use rustc_hash::FxHashMap;

pub trait StiffnessDistribution<T: RealField> {
    /// The weight of `subdomain`'s contribution at a (shared or local) free dof.
    fn boundary_dof_weight(&self, dof: Dof, subdomain: usize) -> T;
}

/// All subdomains share material properties: a dof shared by `m` subdomains
/// is weighted `1/m` everywhere.
#[derive(Debug, Clone)]
pub struct HomogeneousStiffnessDistribution {
    multiplicities: Vec<usize>,
}

impl HomogeneousStiffnessDistribution {
    pub fn new(model: &Model) -> Self {
        Self {
            multiplicities: (0..model.num_nodes()).map(|n| model.node_multiplicity(n)).collect(),
        }
    }
}

impl<T: RealField> StiffnessDistribution<T> for HomogeneousStiffnessDistribution {
    fn boundary_dof_weight(&self, dof: Dof, _subdomain: usize) -> T {
        let multiplicity = self.multiplicities[dof.node].max(1);
        T::one() / T::from_usize(multiplicity).unwrap()
    }
}

/// Material properties differ across subdomains: a stiffer subdomain carries
/// proportionally more of the coupling at a shared dof.
///
/// Weights are the relative diagonal stiffness contributions, taken from the
/// assembled (unfactored) subdomain matrices.
#[derive(Debug, Clone)]
pub struct HeterogeneousStiffnessDistribution<T> {
    weights: FxHashMap<(Dof, usize), T>,
}

impl<T: RealField> HeterogeneousStiffnessDistribution<T> {
    pub fn from_subdomain_matrices(
        model: &Model,
        orderings: &FreeDofOrderings,
        matrices: &[&CsrMatrix<T>],
    ) -> Self {
        assert_eq!(matrices.len(), model.num_subdomains());
        let diagonals: Vec<DVector<T>> = matrices.iter().map(|m| extract_diagonal(m)).collect();

        let mut weights = FxHashMap::default();
        for node in 0..model.num_nodes() {
            if !model.is_boundary_node(node) {
                continue;
            }
            let sharing = model.node_subdomains(node);
            for component in 0..model.solution_dim() {
                let dof = Dof::new(node, component);
                if model.is_constrained(dof) {
                    continue;
                }
                let stiffnesses: Vec<T> = sharing
                    .iter()
                    .map(|&s| {
                        let local = orderings
                            .subdomain(s)
                            .index_of(dof)
                            .expect("Internal error: shared dof must be free in every sharing subdomain");
                        diagonals[s][local].clone()
                    })
                    .collect();
                let total: T = stiffnesses.iter().fold(T::zero(), |acc, k| acc + k.clone());
                for (&s, k) in sharing.iter().zip(&stiffnesses) {
                    weights.insert((dof, s), k.clone() / total.clone());
                }
            }
        }
        Self { weights }
    }
}

impl<T: RealField> StiffnessDistribution<T> for HeterogeneousStiffnessDistribution<T> {
    fn boundary_dof_weight(&self, dof: Dof, subdomain: usize) -> T {
        self.weights
            .get(&(dof, subdomain))
            .cloned()
            .unwrap_or_else(T::one)
    }
}

/// Split nodal loads over the subdomains sharing each loaded dof.
///
/// The per-subdomain shares sum to the applied load, so the globally
/// assembled force vector reproduces it exactly. Returns, per subdomain, the
/// (local free-dof index, increment) contributions to its rhs.
pub fn distribute_nodal_loads<T: RealField>(
    model: &Model,
    orderings: &FreeDofOrderings,
    distribution: &dyn StiffnessDistribution<T>,
    loads: &[(Dof, T)],
) -> Result<Vec<Vec<(usize, T)>>, SolverError> {
    let mut increments = vec![Vec::new(); model.num_subdomains()];
    for (dof, value) in loads {
        if model.is_constrained(*dof) {
            return Err(SolverError::Configuration(format!(
                "Cannot apply a load to constrained dof (node {}, component {}).",
                dof.node, dof.component
            )));
        }
        let sharing = model.node_subdomains(dof.node);
        if sharing.is_empty() {
            return Err(SolverError::Configuration(format!(
                "Node {} does not belong to any subdomain.",
                dof.node
            )));
        }
        for &s in sharing {
            let local = orderings
                .subdomain(s)
                .index_of(*dof)
                .expect("Internal error: free dof must be ordered in its subdomain");
            let weight = distribution.boundary_dof_weight(*dof, s);
            increments[s].push((local, weight * value.clone()));
        }
    }
    Ok(increments)
}

/// Assemble a global free-dof vector by summing the subdomain vectors.
pub fn assemble_global_vector<T: RealField>(
    orderings: &FreeDofOrderings,
    locals: &[&DVector<T>],
) -> DVector<T> {
    let mut global = DVector::zeros(orderings.num_global_free_dofs());
    for (s, &local) in locals.iter().enumerate() {
        scatter_add_into(&mut global, orderings.to_global(s), local);
    }
    global
}

/// Gather the subdomain displacement fields into one global vector.
///
/// Shared dofs are averaged with the distribution weights; for a solution
/// satisfying continuity this reproduces the common value.
pub fn gather_global_displacements<T: RealField>(
    orderings: &FreeDofOrderings,
    distribution: &dyn StiffnessDistribution<T>,
    solutions: &[&DVector<T>],
) -> DVector<T> {
    let mut global = DVector::zeros(orderings.num_global_free_dofs());
    for (s, &solution) in solutions.iter().enumerate() {
        let ordering = orderings.subdomain(s);
        for (local, &dof) in ordering.dofs().iter().enumerate() {
            let weight = distribution.boundary_dof_weight(dof, s);
            let global_index = orderings.to_global(s)[local];
            global[global_index] += weight * solution[local].clone();
        }
    }
    global
}
