use crate::common::{
    five_node_bar, two_subdomain_bar, SubdomainSpringProvider, UniformSpringProvider,
};
use fetidp::error::SolverError;
use fetidp::model::{Dof, Element, Model};
use fetidp::separation::UserDefinedCornerNodes;
use fetidp::solver::{FetiDPConfig, FetiDPSolver};
use matrixcompare::assert_scalar_eq;

/// Two spring elements, both ends fixed, split at the shared node which is
/// the single corner dof. There are no remainder dofs and no Lagrange
/// multipliers: the interface problem collapses to one scalar coarse
/// equation with the closed-form solution `u = F / (k1 + k2)`.
#[test]
fn two_subdomain_bar_matches_closed_form() {
    let stiffness = 100.0;
    let force = 10.0;

    let config = FetiDPConfig::new(UserDefinedCornerNodes::new([1]));
    let mut solver = FetiDPSolver::new(two_subdomain_bar(), config).unwrap();
    solver.order_dofs().unwrap();
    solver.build_global_matrices(&UniformSpringProvider { stiffness }).unwrap();
    solver.apply_nodal_loads(&[(Dof::new(1, 0), force)]).unwrap();

    let summary = solver.solve().unwrap();
    assert!(summary.converged);
    assert_eq!(summary.interface_iterations, 0);
    assert_eq!(solver.num_lagrange_multipliers(), Some(0));

    let expected = force / (2.0 * stiffness);
    // Both subdomains have a single free dof, the shared node; continuity
    // means both copies carry the same value.
    assert_scalar_eq!(solver.solution(0)[0], expected, comp = abs, tol = 1e-12);
    assert_scalar_eq!(solver.solution(1)[0], expected, comp = abs, tol = 1e-12);
}

#[test]
fn heterogeneous_bar_matches_closed_form() {
    let stiffness = vec![1000.0, 10.0];
    let force = 5.0;

    let mut config = FetiDPConfig::new(UserDefinedCornerNodes::new([1]));
    config.problem_is_homogeneous = false;
    let mut solver = FetiDPSolver::new(two_subdomain_bar(), config).unwrap();
    solver.order_dofs().unwrap();
    solver
        .build_global_matrices(&SubdomainSpringProvider { stiffness: stiffness.clone() })
        .unwrap();
    solver.apply_nodal_loads(&[(Dof::new(1, 0), force)]).unwrap();

    let summary = solver.solve().unwrap();
    assert!(summary.converged);

    let expected = force / (stiffness[0] + stiffness[1]);
    assert_scalar_eq!(solver.solution(0)[0], expected, comp = abs, tol = 1e-12);
    assert_scalar_eq!(solver.solution(1)[0], expected, comp = abs, tol = 1e-12);
}

/// Four spring elements with one remainder dof per subdomain: exercises the
/// static condensation path without any Lagrange multipliers.
#[test]
fn five_node_bar_matches_direct_elimination() {
    let stiffness = 4.0;
    let force = 2.0;

    let config = FetiDPConfig::new(UserDefinedCornerNodes::new([2]));
    let mut solver = FetiDPSolver::new(five_node_bar(), config).unwrap();
    solver.order_dofs().unwrap();
    solver.build_global_matrices(&UniformSpringProvider { stiffness }).unwrap();
    solver.apply_nodal_loads(&[(Dof::new(2, 0), force)]).unwrap();

    let summary = solver.solve().unwrap();
    assert!(summary.converged);

    // Symmetric problem: u(2) = F / k_eff with k_eff = k/2 + k/2, and the
    // interior nodes sit halfway between fixed end and loaded node.
    let u2 = force / stiffness;
    let u_interior = u2 / 2.0;
    // Subdomain 0 free dofs: node 1, node 2 (node-major)
    assert_scalar_eq!(solver.solution(0)[0], u_interior, comp = abs, tol = 1e-12);
    assert_scalar_eq!(solver.solution(0)[1], u2, comp = abs, tol = 1e-12);
    // Subdomain 1 free dofs: node 2, node 3
    assert_scalar_eq!(solver.solution(1)[0], u2, comp = abs, tol = 1e-12);
    assert_scalar_eq!(solver.solution(1)[1], u_interior, comp = abs, tol = 1e-12);
}

#[test]
fn a_single_subdomain_is_rejected_at_construction() {
    let mut model = Model::new(3, 1);
    model.add_subdomain(vec![Element::new(vec![0, 1]), Element::new(vec![1, 2])]);
    model.constrain_node(0);

    let config = FetiDPConfig::<f64>::new(UserDefinedCornerNodes::new([1]));
    let result = FetiDPSolver::new(model, config);
    assert!(matches!(result, Err(SolverError::Configuration(_))));
}
