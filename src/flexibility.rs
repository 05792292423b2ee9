//! The implicit dual (interface) flexibility operator.
//!
//! `F = Σ_s Br[s] · Krr[s]⁻¹ · Br[s]ᵀ` and its corner-coupled companions are
//! never materialized: in Lagrange-multiplier space they would be dense. The
//! operator only exposes its action on a vector; one application costs one
//! pair of triangular solves per subdomain against the cached factorizations,
//! and subdomains are processed in parallel with a sum reduction.

use crate::error::SolverError;
use crate::lagrange::LagrangeEnumeration;
use crate::separation::DofSeparation;
use nalgebra::{Cholesky, DMatrix, DVector, Dynamic, RealField};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

/// The Cholesky factorization of one subdomain's remainder-remainder block.
///
/// A subdomain whose free dofs are all corner dofs has an empty remainder
/// block; that case is represented explicitly so the solve degenerates to a
/// zero-length vector instead of a factorization edge case.
pub struct FactorizedKrr<T: RealField> {
    factorization: Option<Cholesky<T, Dynamic>>,
}

impl<T: RealField> FactorizedKrr<T> {
    /// Factorize the remainder block, consuming it.
    pub fn factorize(matrix: DMatrix<T>, subdomain: usize) -> Result<Self, SolverError> {
        if matrix.nrows() == 0 {
            return Ok(Self { factorization: None });
        }
        match matrix.cholesky() {
            Some(factorization) => Ok(Self {
                factorization: Some(factorization),
            }),
            None => Err(SolverError::SingularSystem(format!(
                "The remainder stiffness block of subdomain {} is not positive definite.",
                subdomain
            ))),
        }
    }

    pub fn dim(&self) -> usize {
        self.factorization.as_ref().map_or(0, |f| f.l_dirty().nrows())
    }

    /// Krr⁻¹ v via forward/backward triangular solves.
    pub fn solve_vector(&self, v: &DVector<T>) -> DVector<T> {
        match &self.factorization {
            Some(factorization) => factorization.solve(v),
            None => {
                assert_eq!(v.len(), 0);
                DVector::zeros(0)
            }
        }
    }

    /// Krr⁻¹ M, column by column.
    pub fn solve_matrix(&self, m: &DMatrix<T>) -> DMatrix<T> {
        match &self.factorization {
            Some(factorization) => factorization.solve(m),
            None => {
                assert_eq!(m.nrows(), 0);
                DMatrix::zeros(0, m.ncols())
            }
        }
    }
}

/// Implicit operator view over the cached per-subdomain factorizations.
pub struct FlexibilityMatrix<'a, T: RealField> {
    factorizations: &'a [FactorizedKrr<T>],
    krc: &'a [DMatrix<T>],
    separation: &'a DofSeparation,
    lagrange: &'a LagrangeEnumeration,
}

impl<'a, T: RealField + Send + Sync> FlexibilityMatrix<'a, T> {
    pub fn new(
        factorizations: &'a [FactorizedKrr<T>],
        krc: &'a [DMatrix<T>],
        separation: &'a DofSeparation,
        lagrange: &'a LagrangeEnumeration,
    ) -> Self {
        assert_eq!(factorizations.len(), krc.len());
        Self {
            factorizations,
            krc,
            separation,
            lagrange,
        }
    }

    pub fn num_lagrange_multipliers(&self) -> usize {
        self.lagrange.num_multipliers()
    }

    pub fn num_corner_dofs(&self) -> usize {
        self.separation.num_global_corner_dofs()
    }

    fn num_subdomains(&self) -> usize {
        self.factorizations.len()
    }

    /// y = Σ_s Br Krr⁻¹ Brᵀ x, for x in Lagrange-multiplier space.
    pub fn apply_irr(&self, x: &DVector<T>) -> DVector<T> {
        assert_eq!(x.len(), self.num_lagrange_multipliers());
        (0..self.num_subdomains())
            .into_par_iter()
            .map(|s| {
                let br = self.lagrange.jump_matrix(s);
                let restricted = br.tr_mul_vector(x);
                let solved = self.factorizations[s].solve_vector(&restricted);
                br.mul_vector(&solved)
            })
            .reduce(|| DVector::zeros(self.num_lagrange_multipliers()), |a, b| a + b)
    }

    /// y = Σ_s Br Krr⁻¹ Krc Lc v, for v in global corner space.
    pub fn apply_irc(&self, v: &DVector<T>) -> DVector<T> {
        assert_eq!(v.len(), self.num_corner_dofs());
        (0..self.num_subdomains())
            .into_par_iter()
            .map(|s| {
                let local_corner = self.separation.corner_map(s).mul_vector(v);
                let coupled = &self.krc[s] * local_corner;
                let solved = self.factorizations[s].solve_vector(&coupled);
                self.lagrange.jump_matrix(s).mul_vector(&solved)
            })
            .reduce(|| DVector::zeros(self.num_lagrange_multipliers()), |a, b| a + b)
    }

    /// y = Σ_s Lcᵀ Krcᵀ Krr⁻¹ Brᵀ x, for x in Lagrange-multiplier space.
    pub fn apply_irc_transposed(&self, x: &DVector<T>) -> DVector<T> {
        assert_eq!(x.len(), self.num_lagrange_multipliers());
        (0..self.num_subdomains())
            .into_par_iter()
            .map(|s| {
                let restricted = self.lagrange.jump_matrix(s).tr_mul_vector(x);
                let solved = self.factorizations[s].solve_vector(&restricted);
                let local_corner = self.krc[s].tr_mul(&solved);
                let mut global = DVector::zeros(self.num_corner_dofs());
                self.separation.corner_map(s).tr_add_vector_into(&mut global, &local_corner);
                global
            })
            .reduce(|| DVector::zeros(self.num_corner_dofs()), |a, b| a + b)
    }
}
