//! The coarse (corner) problem: static condensation of remainder dofs.

use crate::error::SolverError;
use crate::flexibility::FactorizedKrr;
use crate::separation::DofSeparation;
use nalgebra::{Cholesky, DMatrix, DVector, Dynamic, RealField};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

/// The globally coupled corner-dof system
/// `Kcc* = Σ_s Lcᵀ (Kcc[s] − Krc[s]ᵀ Krr[s]⁻¹ Krc[s]) Lc`,
/// assembled and factorized once per stiffness change and read-only during
/// the interface solve.
pub struct CoarseProblem<T: RealField> {
    matrix: DMatrix<T>,
    factorization: Cholesky<T, Dynamic>,
}

impl<T: RealField + Send + Sync> CoarseProblem<T> {
    pub fn assemble(
        separation: &DofSeparation,
        factorizations: &[FactorizedKrr<T>],
        krc: &[DMatrix<T>],
        kcc: &[DMatrix<T>],
    ) -> Result<Self, SolverError> {
        let num_corner_dofs = separation.num_global_corner_dofs();

        // Per-subdomain condensation is independent; only the accumulation
        // into the global matrix is a reduction.
        let local_blocks: Vec<DMatrix<T>> = (0..krc.len())
            .into_par_iter()
            .map(|s| {
                let inv_krr_krc = factorizations[s].solve_matrix(&krc[s]);
                &kcc[s] - krc[s].tr_mul(&inv_krr_krc)
            })
            .collect();

        let mut matrix = DMatrix::zeros(num_corner_dofs, num_corner_dofs);
        for (s, block) in local_blocks.iter().enumerate() {
            separation.corner_map(s).tr_congruence_add_into(&mut matrix, block);
        }

        let factorization = matrix.clone().cholesky().ok_or_else(|| {
            SolverError::SingularSystem(
                "The coarse corner problem is not positive definite; check the corner node selection."
                    .to_string(),
            )
        })?;
        Ok(Self { matrix, factorization })
    }

    pub fn num_corner_dofs(&self) -> usize {
        self.matrix.nrows()
    }

    /// The unfactored coarse matrix, for diagnostics.
    pub fn matrix(&self) -> &DMatrix<T> {
        &self.matrix
    }

    /// Kcc*⁻¹ v.
    pub fn solve(&self, v: &DVector<T>) -> DVector<T> {
        self.factorization.solve(v)
    }

    /// The condensed corner rhs `fc* = Σ_s Lcᵀ (fbc[s] − Krc[s]ᵀ Krr[s]⁻¹ fr[s])`.
    ///
    /// Stiffness-independent; recomputed for every right-hand side.
    pub fn condense_rhs(
        separation: &DofSeparation,
        factorizations: &[FactorizedKrr<T>],
        krc: &[DMatrix<T>],
        fr: &[DVector<T>],
        fbc: &[DVector<T>],
    ) -> DVector<T> {
        let num_corner_dofs = separation.num_global_corner_dofs();
        let locals: Vec<DVector<T>> = (0..krc.len())
            .into_par_iter()
            .map(|s| {
                let solved = factorizations[s].solve_vector(&fr[s]);
                &fbc[s] - krc[s].tr_mul(&solved)
            })
            .collect();

        let mut fc_star = DVector::zeros(num_corner_dofs);
        for (s, local) in locals.iter().enumerate() {
            separation.corner_map(s).tr_add_vector_into(&mut fc_star, local);
        }
        fc_star
    }
}
