//! Submatrix and subvector primitives for CSR-stored symmetric matrices.

use nalgebra::{ClosedAdd, DMatrix, DVector, DVectorSlice, Scalar};
use nalgebra_sparse::CsrMatrix;
use num::Zero;

/// Extract the dense block `matrix[rows, cols]` of a CSR matrix.
///
/// The index sets may be arbitrary (non-contiguous, unsorted), but must be in
/// bounds. Entries of the block that are not stored in the sparse matrix are
/// zero. The cost is proportional to the number of stored entries in the
/// selected rows, plus a column-position scratch table of size `ncols`.
///
/// # Panics
///
/// Panics if any index is out of bounds.
pub fn extract_dense_submatrix<T>(matrix: &CsrMatrix<T>, rows: &[usize], cols: &[usize]) -> DMatrix<T>
where
    T: Scalar + Zero,
{
    const UNMAPPED: usize = usize::MAX;
    let mut col_positions = vec![UNMAPPED; matrix.ncols()];
    for (position, &col) in cols.iter().enumerate() {
        assert!(col < matrix.ncols(), "Column index out of bounds.");
        col_positions[col] = position;
    }

    let mut block = DMatrix::zeros(rows.len(), cols.len());
    for (block_row, &row) in rows.iter().enumerate() {
        assert!(row < matrix.nrows(), "Row index out of bounds.");
        let csr_row = matrix.row(row);
        for (&col, value) in csr_row.col_indices().iter().zip(csr_row.values()) {
            let position = col_positions[col];
            if position != UNMAPPED {
                block[(block_row, position)] = value.clone();
            }
        }
    }
    block
}

/// Extract the diagonal of a square CSR matrix as a dense vector.
///
/// Missing diagonal entries are zero.
pub fn extract_diagonal<T>(matrix: &CsrMatrix<T>) -> DVector<T>
where
    T: Scalar + Zero,
{
    assert_eq!(matrix.nrows(), matrix.ncols(), "Matrix must be square.");
    let mut diagonal = DVector::zeros(matrix.nrows());
    for (row_idx, row) in matrix.row_iter().enumerate() {
        for (&col, value) in row.col_indices().iter().zip(row.values()) {
            if col == row_idx {
                diagonal[row_idx] = value.clone();
            }
        }
    }
    diagonal
}

/// Gather `v[indices]` into a new contiguous vector.
pub fn gather<'a, T>(v: impl Into<DVectorSlice<'a, T>>, indices: &[usize]) -> DVector<T>
where
    T: Scalar,
{
    let v = v.into();
    DVector::from_iterator(indices.len(), indices.iter().map(|&i| v[i].clone()))
}

/// Scatter `source` into `target` at the given indices: `target[indices[i]] = source[i]`.
pub fn scatter_into<'a, T>(target: &mut DVector<T>, indices: &[usize], source: impl Into<DVectorSlice<'a, T>>)
where
    T: Scalar,
{
    let source = source.into();
    assert_eq!(indices.len(), source.len(), "Index set and source must have the same length.");
    for (&i, value) in indices.iter().zip(source.iter()) {
        target[i] = value.clone();
    }
}

/// Scatter-add `source` into `target` at the given indices: `target[indices[i]] += source[i]`.
pub fn scatter_add_into<'a, T>(target: &mut DVector<T>, indices: &[usize], source: impl Into<DVectorSlice<'a, T>>)
where
    T: Scalar + ClosedAdd,
{
    let source = source.into();
    assert_eq!(indices.len(), source.len(), "Index set and source must have the same length.");
    for (&i, value) in indices.iter().zip(source.iter()) {
        target[i] += value.clone();
    }
}
