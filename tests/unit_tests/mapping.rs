use fetidp::mapping::{CornerBooleanMatrix, SignedBooleanMatrix, WeightedBooleanMatrix};
use matrixcompare::assert_matrix_eq;
use nalgebra::{DMatrix, DVector};

fn dense_of_signed(matrix: &SignedBooleanMatrix) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(matrix.nrows(), matrix.ncols());
    for (row, col, sign) in matrix.entries() {
        dense[(row, col)] = sign as f64;
    }
    dense
}

#[test]
fn signed_boolean_products_match_dense() {
    let mut matrix = SignedBooleanMatrix::new(4, 3);
    matrix.push(0, 1, true);
    matrix.push(1, 1, false);
    matrix.push(3, 0, true);
    let dense = dense_of_signed(&matrix);

    let x = DVector::from_vec(vec![2.0, -3.0, 5.0]);
    assert_matrix_eq!(matrix.mul_vector(&x), &dense * &x);

    let y = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    assert_matrix_eq!(matrix.tr_mul_vector(&y), dense.transpose() * &y);
}

#[test]
fn weighted_boolean_products_match_dense() {
    let mut matrix = WeightedBooleanMatrix::new(3, 2);
    matrix.push(0, 0, 0.5);
    matrix.push(2, 1, -0.25);
    let mut dense = DMatrix::zeros(3, 2);
    dense[(0, 0)] = 0.5;
    dense[(2, 1)] = -0.25;

    let x = DVector::from_vec(vec![4.0, 8.0]);
    assert_matrix_eq!(matrix.mul_vector(&x), &dense * &x);
    let y = DVector::from_vec(vec![1.0, 2.0, 3.0]);
    assert_matrix_eq!(matrix.tr_mul_vector(&y), dense.transpose() * &y);
}

#[test]
fn corner_map_restriction_and_accumulation() {
    // Two local corner dofs mapping to global corner dofs 2 and 0
    let map = CornerBooleanMatrix::new(3, vec![2, 0]);

    let global = DVector::from_vec(vec![10.0, 20.0, 30.0]);
    assert_matrix_eq!(map.mul_vector(&global), DVector::from_vec(vec![30.0, 10.0]));

    let mut accumulated = DVector::zeros(3);
    map.tr_add_vector_into(&mut accumulated, &DVector::from_vec(vec![1.0, 2.0]));
    assert_matrix_eq!(accumulated, DVector::from_vec(vec![2.0, 0.0, 1.0]));
}

#[test]
fn corner_map_congruence_matches_dense_triple_product() {
    let map = CornerBooleanMatrix::new(3, vec![2, 0]);
    let local = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);

    // Dense Lc: local x global, one 1 per row
    let mut lc = DMatrix::zeros(2, 3);
    for (row, &col) in map.global_indices().iter().enumerate() {
        lc[(row, col)] = 1.0;
    }
    let expected = lc.transpose() * &local * &lc;

    let mut global = DMatrix::zeros(3, 3);
    map.tr_congruence_add_into(&mut global, &local);
    assert_matrix_eq!(global, expected);
}
