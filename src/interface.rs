//! The dual-primal interface problem.
//!
//! Eliminating the remainder dofs and the corner displacements from the
//! tearing formulation leaves a symmetric positive definite system over the
//! Lagrange multipliers,
//!
//! `(F_Irr + F_Irc Kcc*⁻¹ F_Ircᵀ) λ = dr − F_Irc Kcc*⁻¹ fc*`,
//!
//! which is solved by preconditioned conjugate gradients on the implicit
//! flexibility operator. The corner displacements follow by one coarse solve,
//! `uc = Kcc*⁻¹ (fc* + F_Ircᵀ λ)`.

use crate::coarse::CoarseProblem;
use crate::error::SolverError;
use crate::flexibility::FlexibilityMatrix;
use fetidp_sparse::pcg::{ConjugateGradient, LinearOperator, PcgError, StoppingCriterion};
use nalgebra::{DVector, DVectorSlice, DVectorSliceMut, RealField};
use std::error::Error;

/// Configuration of the interface iteration.
#[derive(Debug, Clone)]
pub struct InterfaceSolverConfig<T> {
    /// Relative tolerance against the global force norm.
    pub tolerance: T,
    /// Iteration cap; `None` defaults to the dimension of the interface
    /// problem.
    pub max_iterations: Option<usize>,
}

impl Default for InterfaceSolverConfig<f64> {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: None,
        }
    }
}

impl Default for InterfaceSolverConfig<f32> {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            max_iterations: None,
        }
    }
}

/// Result of the interface solve.
///
/// `converged: false` means the iteration cap was reached; the multipliers
/// and corner displacements then hold the best available estimate.
#[derive(Debug, Clone)]
pub struct InterfaceSolution<T: RealField> {
    pub lagranges: DVector<T>,
    pub corner_displacements: DVector<T>,
    pub iterations: usize,
    pub converged: bool,
}

struct InterfaceOperator<'a, T: RealField> {
    flexibility: &'a FlexibilityMatrix<'a, T>,
    coarse: &'a CoarseProblem<T>,
}

impl<'a, T: RealField + Send + Sync> LinearOperator<T> for InterfaceOperator<'a, T> {
    fn apply(&self, mut y: DVectorSliceMut<T>, x: DVectorSlice<T>) -> Result<(), Box<dyn Error>> {
        let x = x.clone_owned();
        let mut result = self.flexibility.apply_irr(&x);
        let corner = self.coarse.solve(&self.flexibility.apply_irc_transposed(&x));
        result += self.flexibility.apply_irc(&corner);
        y.copy_from(&result);
        Ok(())
    }
}

/// Relative residual against the norm of the externally applied forces,
/// `||r|| <= tol * ||f||`.
///
/// Falls back to the rhs norm when the force norm is zero (e.g. a pure
/// corner-loaded problem whose interface rhs is still nonzero).
struct GlobalForcesNormCriterion<T> {
    tolerance: T,
    forces_norm: T,
}

impl<T: RealField> StoppingCriterion<T> for GlobalForcesNormCriterion<T> {
    fn has_converged(&self, b_norm: T, _iteration: usize, approx_residual: DVectorSlice<T>) -> bool {
        let reference = if self.forces_norm > T::zero() {
            self.forces_norm.clone()
        } else {
            b_norm
        };
        approx_residual.norm() <= self.tolerance.clone() * reference
    }
}

/// Solve the coupled dual-primal system for the Lagrange multipliers and the
/// corner displacements.
pub fn solve_interface_problem<T: RealField + Send + Sync>(
    flexibility: &FlexibilityMatrix<'_, T>,
    preconditioner: &dyn LinearOperator<T>,
    coarse: &CoarseProblem<T>,
    fc_star: &DVector<T>,
    dr: &DVector<T>,
    global_forces_norm: T,
    config: &InterfaceSolverConfig<T>,
) -> Result<InterfaceSolution<T>, SolverError> {
    let num_multipliers = flexibility.num_lagrange_multipliers();
    if num_multipliers == 0 {
        // Continuity is fully enforced through the corner dofs; the dual
        // problem is empty and the coarse solve is the whole interface solve.
        return Ok(InterfaceSolution {
            lagranges: DVector::zeros(0),
            corner_displacements: coarse.solve(fc_star),
            iterations: 0,
            converged: true,
        });
    }

    let rhs = dr - flexibility.apply_irc(&coarse.solve(fc_star));
    let operator = InterfaceOperator { flexibility, coarse };
    let max_iterations = config.max_iterations.unwrap_or(num_multipliers);

    let mut lagranges = DVector::zeros(num_multipliers);
    let output = ConjugateGradient::new()
        .with_operator(&operator)
        .with_preconditioner(preconditioner)
        .with_stopping_criterion(GlobalForcesNormCriterion {
            tolerance: config.tolerance.clone(),
            forces_norm: global_forces_norm,
        })
        .with_max_iter(max_iterations)
        .solve_with_guess(&rhs, &mut lagranges)
        .map_err(|err| match err {
            PcgError::IndefiniteOperator => SolverError::SingularSystem(
                "The interface flexibility operator is not positive definite.".to_string(),
            ),
            PcgError::IndefinitePreconditioner => SolverError::SingularSystem(
                "The interface preconditioner is not positive definite.".to_string(),
            ),
            other => SolverError::SingularSystem(format!("Interface iteration failed: {}", other)),
        })?;

    let corner_displacements = coarse.solve(&(fc_star + flexibility.apply_irc_transposed(&lagranges)));
    Ok(InterfaceSolution {
        lagranges,
        corner_displacements,
        iterations: output.num_iterations,
        converged: output.converged,
    })
}
