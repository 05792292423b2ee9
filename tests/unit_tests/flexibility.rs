use crate::common::{grid_2x2, LaplaceQuadProvider};
use fetidp::assembly::assemble_subdomain_matrices;
use fetidp::error::SolverError;
use fetidp::flexibility::{FactorizedKrr, FlexibilityMatrix};
use fetidp::lagrange::{enumerate_lagrange_multipliers, CrosspointStrategy};
use fetidp::ordering::{DofOrderingStrategy, NodeMajorOrdering};
use fetidp::separation::{separate_dofs, CornerNodeSelection, UserDefinedCornerNodes};
use fetidp_sparse::extract::extract_dense_submatrix;
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};

#[test]
fn factorization_solves_spd_systems() {
    let matrix = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
    let factorized = FactorizedKrr::factorize(matrix.clone(), 0).unwrap();
    let x0 = DVector::from_vec(vec![1.5, -2.0]);
    let b = &matrix * &x0;
    assert_matrix_eq!(factorized.solve_vector(&b), x0, comp = abs, tol = 1e-12);
}

#[test]
fn indefinite_remainder_block_is_a_singular_system_error() {
    let matrix = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
    let result = FactorizedKrr::factorize(matrix, 3);
    assert!(matches!(result, Err(SolverError::SingularSystem(_))));
}

#[test]
fn empty_remainder_block_degenerates_gracefully() {
    let factorized = FactorizedKrr::factorize(DMatrix::<f64>::zeros(0, 0), 0).unwrap();
    assert_eq!(factorized.dim(), 0);
    let solved = factorized.solve_vector(&DVector::zeros(0));
    assert_eq!(solved.len(), 0);
}

/// The implicit operator application must agree with the explicitly formed
/// dense flexibility matrix on a small problem where forming it is feasible.
#[test]
fn implicit_flexibility_matches_dense_construction() {
    let model = grid_2x2();
    let orderings = NodeMajorOrdering.order_free_dofs(&model);
    let corner_nodes = UserDefinedCornerNodes::new([4]).select_corner_nodes(&model);
    let separation = separate_dofs(&model, &orderings, &corner_nodes).unwrap();
    let lagrange =
        enumerate_lagrange_multipliers(&model, &orderings, &separation, CrosspointStrategy::FullyRedundant)
            .unwrap();
    let matrices = assemble_subdomain_matrices(&model, &orderings, &LaplaceQuadProvider).unwrap();

    let mut factorizations = Vec::new();
    let mut krc = Vec::new();
    let mut dense_f = DMatrix::zeros(lagrange.num_multipliers(), lagrange.num_multipliers());
    for s in 0..model.num_subdomains() {
        let remainder = separation.remainder_dofs(s);
        let corner = separation.corner_dofs(s);
        let krr = extract_dense_submatrix(&matrices[s], remainder, remainder);

        // Dense Br and the explicit contribution Br Krr⁻¹ Brᵀ
        let mut br = DMatrix::zeros(lagrange.num_multipliers(), remainder.len());
        for (row, col, sign) in lagrange.jump_matrix(s).entries() {
            br[(row, col)] = sign as f64;
        }
        let krr_inverse = krr
            .clone()
            .cholesky()
            .expect("Remainder block must be positive definite")
            .inverse();
        dense_f += &br * krr_inverse * br.transpose();

        factorizations.push(FactorizedKrr::factorize(krr, s).unwrap());
        krc.push(extract_dense_submatrix(&matrices[s], remainder, corner));
    }

    let flexibility = FlexibilityMatrix::new(&factorizations, &krc, &separation, &lagrange);
    for j in 0..lagrange.num_multipliers() {
        let mut unit = DVector::zeros(lagrange.num_multipliers());
        unit[j] = 1.0;
        let column = flexibility.apply_irr(&unit);
        assert_matrix_eq!(column, dense_f.column(j), comp = abs, tol = 1e-12);
    }
}
