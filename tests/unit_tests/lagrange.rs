use crate::common::grid_2x2;
use fetidp::error::SolverError;
use fetidp::lagrange::{enumerate_lagrange_multipliers, CrosspointStrategy};
use fetidp::ordering::{DofOrderingStrategy, NodeMajorOrdering};
use fetidp::separation::{separate_dofs, CornerNodeSelection, UserDefinedCornerNodes};
use nalgebra::DVector;

#[test]
fn one_multiplier_per_shared_noncorner_dof_pair() {
    let model = grid_2x2();
    let orderings = NodeMajorOrdering.order_free_dofs(&model);
    let corner_nodes = UserDefinedCornerNodes::new([4]).select_corner_nodes(&model);
    let separation = separate_dofs(&model, &orderings, &corner_nodes).unwrap();
    let enumeration =
        enumerate_lagrange_multipliers(&model, &orderings, &separation, CrosspointStrategy::FullyRedundant)
            .unwrap();

    // Shared free non-corner nodes are 3, 5 and 7, each shared by one pair
    assert_eq!(enumeration.num_multipliers(), 3);
    for multiplier in enumeration.multipliers() {
        assert!(multiplier.positive_subdomain < multiplier.negative_subdomain);
        let sharing = model.node_subdomains(multiplier.dof.node);
        assert!(sharing.contains(&multiplier.positive_subdomain));
        assert!(sharing.contains(&multiplier.negative_subdomain));
    }

    // Each multiplier row carries exactly one +1 and one -1 across the
    // subdomain jump matrices
    for index in 0..enumeration.num_multipliers() {
        let mut positives = 0;
        let mut negatives = 0;
        for s in 0..model.num_subdomains() {
            for (row, _, sign) in enumeration.jump_matrix(s).entries() {
                if row == index {
                    if sign > 0 {
                        positives += 1;
                    } else {
                        negatives += 1;
                    }
                }
            }
        }
        assert_eq!((positives, negatives), (1, 1));
    }
}

#[test]
fn crosspoint_generates_fully_redundant_pairs() {
    // Make nodes 3, 5, 7 the corners instead; the crosspoint node 4 (shared
    // by all four subdomains) then gets one multiplier per subdomain pair.
    let model = grid_2x2();
    let orderings = NodeMajorOrdering.order_free_dofs(&model);
    let corner_nodes = UserDefinedCornerNodes::new([3, 5, 7]).select_corner_nodes(&model);
    let separation = separate_dofs(&model, &orderings, &corner_nodes).unwrap();
    let enumeration =
        enumerate_lagrange_multipliers(&model, &orderings, &separation, CrosspointStrategy::FullyRedundant)
            .unwrap();

    // C(4, 2) pairs at the crosspoint
    assert_eq!(enumeration.num_multipliers(), 6);
    assert!(enumeration.multipliers().iter().all(|m| m.dof.node == 4));
}

#[test]
fn jump_of_a_continuous_field_is_zero() {
    let model = grid_2x2();
    let orderings = NodeMajorOrdering.order_free_dofs(&model);
    let corner_nodes = UserDefinedCornerNodes::new([4]).select_corner_nodes(&model);
    let separation = separate_dofs(&model, &orderings, &corner_nodes).unwrap();
    let enumeration =
        enumerate_lagrange_multipliers(&model, &orderings, &separation, CrosspointStrategy::FullyRedundant)
            .unwrap();

    // Assign each node a distinct global value and restrict it to each
    // subdomain's remainder dofs; the signed jump must vanish.
    let mut jump = DVector::zeros(enumeration.num_multipliers());
    for s in 0..model.num_subdomains() {
        let ordering = orderings.subdomain(s);
        let remainder_values = DVector::from_iterator(
            separation.remainder_dofs(s).len(),
            separation
                .remainder_dofs(s)
                .iter()
                .map(|&local| ordering.dofs()[local].node as f64 * 10.0 + 1.0),
        );
        jump += enumeration.jump_matrix(s).mul_vector(&remainder_values);
    }
    assert_eq!(jump, DVector::zeros(enumeration.num_multipliers()));
}

#[test]
fn minimum_constraints_strategy_is_unimplemented() {
    let model = grid_2x2();
    let orderings = NodeMajorOrdering.order_free_dofs(&model);
    let corner_nodes = UserDefinedCornerNodes::new([4]).select_corner_nodes(&model);
    let separation = separate_dofs(&model, &orderings, &corner_nodes).unwrap();
    let result = enumerate_lagrange_multipliers(
        &model,
        &orderings,
        &separation,
        CrosspointStrategy::MinimumConstraints,
    );
    assert!(matches!(result, Err(SolverError::Unimplemented(_))));
}
