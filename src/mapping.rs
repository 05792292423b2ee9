//! Boolean coupling matrices.
//!
//! These matrices are never stored densely: a signed Boolean matrix has at
//! most one ±1 per row, and a corner mapping matrix exactly one 1 per row, so
//! both reduce to index lists. All products against dense vectors and
//! matrices are implemented as gather/scatter loops.

use nalgebra::{DMatrix, DVector, DVectorSlice, RealField};

/// A signed Boolean "jump" matrix `Br` of one subdomain.
///
/// Maps the subdomain's remainder-dof space to the global Lagrange-multiplier
/// space: row = multiplier index, column = local remainder-dof index, entry
/// in {-1, +1}. Each row holds at most one entry, since a multiplier touches
/// a given subdomain through at most one dof.
#[derive(Debug, Clone)]
pub struct SignedBooleanMatrix {
    nrows: usize,
    ncols: usize,
    entries: Vec<(usize, usize, i8)>,
}

impl SignedBooleanMatrix {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, row: usize, col: usize, positive: bool) {
        assert!(row < self.nrows && col < self.ncols);
        self.entries.push((row, col, if positive { 1 } else { -1 }));
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, i8)> + '_ {
        self.entries.iter().copied()
    }

    /// y = Br x, with x in remainder space.
    pub fn mul_vector<'a, T: RealField>(&self, x: impl Into<DVectorSlice<'a, T>>) -> DVector<T> {
        let x = x.into();
        assert_eq!(x.len(), self.ncols);
        let mut y = DVector::zeros(self.nrows);
        for &(row, col, sign) in &self.entries {
            if sign > 0 {
                y[row] += x[col].clone();
            } else {
                y[row] -= x[col].clone();
            }
        }
        y
    }

    /// y = Brᵀ x, with x in Lagrange-multiplier space.
    pub fn tr_mul_vector<'a, T: RealField>(&self, x: impl Into<DVectorSlice<'a, T>>) -> DVector<T> {
        let x = x.into();
        assert_eq!(x.len(), self.nrows);
        let mut y = DVector::zeros(self.ncols);
        for &(row, col, sign) in &self.entries {
            if sign > 0 {
                y[col] += x[row].clone();
            } else {
                y[col] -= x[row].clone();
            }
        }
        y
    }
}

/// A weighted variant of the jump matrix, used for preconditioner scaling.
///
/// Same shape conventions as [`SignedBooleanMatrix`], but each entry carries
/// `sign * weight` instead of ±1.
#[derive(Debug, Clone)]
pub struct WeightedBooleanMatrix<T> {
    nrows: usize,
    ncols: usize,
    entries: Vec<(usize, usize, T)>,
}

impl<T: RealField> WeightedBooleanMatrix<T> {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, row: usize, col: usize, value: T) {
        assert!(row < self.nrows && col < self.ncols);
        self.entries.push((row, col, value));
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// y = B x.
    pub fn mul_vector<'a>(&self, x: impl Into<DVectorSlice<'a, T>>) -> DVector<T> {
        let x = x.into();
        assert_eq!(x.len(), self.ncols);
        let mut y = DVector::zeros(self.nrows);
        for (row, col, value) in &self.entries {
            y[*row] += value.clone() * x[*col].clone();
        }
        y
    }

    /// y = Bᵀ x.
    pub fn tr_mul_vector<'a>(&self, x: impl Into<DVectorSlice<'a, T>>) -> DVector<T> {
        let x = x.into();
        assert_eq!(x.len(), self.nrows);
        let mut y = DVector::zeros(self.ncols);
        for (row, col, value) in &self.entries {
            y[*col] += value.clone() * x[*row].clone();
        }
        y
    }
}

/// The corner mapping matrix `Lc` of one subdomain.
///
/// Maps global corner-dof indices to the subdomain's local corner-dof
/// indices; exactly one 1 per row, so it is stored as the list of global
/// indices, ordered by local corner position. Consistency across subdomains
/// is guaranteed by construction: the global index of a corner dof is
/// assigned once, in a single pass over all subdomains.
#[derive(Debug, Clone)]
pub struct CornerBooleanMatrix {
    num_global_corner_dofs: usize,
    global_indices: Vec<usize>,
}

impl CornerBooleanMatrix {
    pub fn new(num_global_corner_dofs: usize, global_indices: Vec<usize>) -> Self {
        assert!(
            global_indices.iter().all(|&g| g < num_global_corner_dofs),
            "Global corner index out of bounds."
        );
        Self {
            num_global_corner_dofs,
            global_indices,
        }
    }

    /// Number of local corner dofs of the subdomain.
    pub fn nrows(&self) -> usize {
        self.global_indices.len()
    }

    /// Number of global corner dofs.
    pub fn ncols(&self) -> usize {
        self.num_global_corner_dofs
    }

    /// The global corner index of each local corner dof, in local order.
    pub fn global_indices(&self) -> &[usize] {
        &self.global_indices
    }

    /// y = Lc x: restrict a global corner vector to this subdomain.
    pub fn mul_vector<'a, T: RealField>(&self, x: impl Into<DVectorSlice<'a, T>>) -> DVector<T> {
        let x = x.into();
        assert_eq!(x.len(), self.num_global_corner_dofs);
        DVector::from_iterator(
            self.global_indices.len(),
            self.global_indices.iter().map(|&g| x[g].clone()),
        )
    }

    /// y += Lcᵀ x: accumulate a local corner vector into a global one.
    pub fn tr_add_vector_into<'a, T: RealField>(
        &self,
        y: &mut DVector<T>,
        x: impl Into<DVectorSlice<'a, T>>,
    ) {
        let x = x.into();
        assert_eq!(x.len(), self.global_indices.len());
        assert_eq!(y.len(), self.num_global_corner_dofs);
        for (local, &global) in self.global_indices.iter().enumerate() {
            y[global] += x[local].clone();
        }
    }

    /// global += Lcᵀ · local · Lc: accumulate a local corner-space matrix
    /// into the global corner-space matrix.
    pub fn tr_congruence_add_into<T: RealField>(&self, global: &mut DMatrix<T>, local: &DMatrix<T>) {
        let n = self.global_indices.len();
        assert_eq!(local.nrows(), n);
        assert_eq!(local.ncols(), n);
        assert_eq!(global.nrows(), self.num_global_corner_dofs);
        assert_eq!(global.ncols(), self.num_global_corner_dofs);
        for (i, &gi) in self.global_indices.iter().enumerate() {
            for (j, &gj) in self.global_indices.iter().enumerate() {
                global[(gi, gj)] += local[(i, j)].clone();
            }
        }
    }
}
