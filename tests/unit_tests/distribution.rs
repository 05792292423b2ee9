use crate::common::{grid_2x2, two_subdomain_bar, SubdomainSpringProvider};
use fetidp::assembly::assemble_subdomain_matrices;
use fetidp::distribution::{
    assemble_global_vector, distribute_nodal_loads, gather_global_displacements,
    HeterogeneousStiffnessDistribution, HomogeneousStiffnessDistribution, StiffnessDistribution,
};
use fetidp::model::Dof;
use fetidp::ordering::{DofOrderingStrategy, NodeMajorOrdering};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

#[test]
fn homogeneous_weights_are_reciprocal_multiplicities() {
    let model = grid_2x2();
    let distribution = HomogeneousStiffnessDistribution::new(&model);

    // Crosspoint, two-subdomain interface node, interior node
    let w4: f64 = distribution.boundary_dof_weight(Dof::new(4, 0), 0);
    let w3: f64 = distribution.boundary_dof_weight(Dof::new(3, 0), 0);
    let w6: f64 = distribution.boundary_dof_weight(Dof::new(6, 0), 2);
    assert_eq!(w4, 0.25);
    assert_eq!(w3, 0.5);
    assert_eq!(w6, 1.0);

    // Weights of the sharing subdomains sum to one
    let total: f64 = model
        .node_subdomains(4)
        .iter()
        .map(|&s| -> f64 { distribution.boundary_dof_weight(Dof::new(4, 0), s) })
        .sum();
    assert_eq!(total, 1.0);
}

#[test]
fn heterogeneous_weights_follow_diagonal_stiffness() {
    let model = two_subdomain_bar();
    let orderings = NodeMajorOrdering.order_free_dofs(&model);
    let provider = SubdomainSpringProvider {
        stiffness: vec![10.0, 30.0],
    };
    let matrices = assemble_subdomain_matrices(&model, &orderings, &provider).unwrap();
    let matrix_refs: Vec<&CsrMatrix<f64>> = matrices.iter().collect();
    let distribution =
        HeterogeneousStiffnessDistribution::from_subdomain_matrices(&model, &orderings, &matrix_refs);

    let shared = Dof::new(1, 0);
    let w0: f64 = distribution.boundary_dof_weight(shared, 0);
    let w1: f64 = distribution.boundary_dof_weight(shared, 1);
    assert!((w0 - 0.25).abs() < 1e-14);
    assert!((w1 - 0.75).abs() < 1e-14);
}

#[test]
fn distributed_loads_sum_to_the_applied_load() {
    let model = grid_2x2();
    let orderings = NodeMajorOrdering.order_free_dofs(&model);
    let distribution = HomogeneousStiffnessDistribution::new(&model);

    let loads = [(Dof::new(4, 0), 8.0), (Dof::new(8, 0), 1.0)];
    let increments = distribute_nodal_loads(&model, &orderings, &distribution, &loads).unwrap();

    let mut rhs: Vec<DVector<f64>> = (0..model.num_subdomains())
        .map(|s| DVector::zeros(orderings.subdomain(s).num_free_dofs()))
        .collect();
    for (s, increments) in increments.into_iter().enumerate() {
        for (index, value) in increments {
            rhs[s][index] += value;
        }
    }

    let rhs_refs: Vec<&DVector<f64>> = rhs.iter().collect();
    let global = assemble_global_vector(&orderings, &rhs_refs);
    let global_ordering = orderings.global();
    assert!((global[global_ordering.index_of(Dof::new(4, 0)).unwrap()] - 8.0).abs() < 1e-14);
    assert!((global[global_ordering.index_of(Dof::new(8, 0)).unwrap()] - 1.0).abs() < 1e-14);
    assert!((global.sum() - 9.0).abs() < 1e-14);
}

#[test]
fn gathering_a_continuous_field_reproduces_the_nodal_values() {
    let model = grid_2x2();
    let orderings = NodeMajorOrdering.order_free_dofs(&model);
    let distribution = HomogeneousStiffnessDistribution::new(&model);

    // Per-subdomain restrictions of the field u(node) = node + 0.5
    let solutions: Vec<DVector<f64>> = (0..model.num_subdomains())
        .map(|s| {
            let ordering = orderings.subdomain(s);
            DVector::from_iterator(
                ordering.num_free_dofs(),
                ordering.dofs().iter().map(|dof| dof.node as f64 + 0.5),
            )
        })
        .collect();
    let solution_refs: Vec<&DVector<f64>> = solutions.iter().collect();
    let global = gather_global_displacements(&orderings, &distribution, &solution_refs);

    let global_ordering = orderings.global();
    for (index, dof) in global_ordering.dofs().iter().enumerate() {
        assert!((global[index] - (dof.node as f64 + 0.5)).abs() < 1e-14);
    }
}
