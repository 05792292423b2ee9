//! Error taxonomy of the solver.

use core::fmt;
use std::error::Error;

/// Errors reported by the FETI-DP solver.
///
/// Structural and configuration problems are fatal and surface immediately.
/// Non-convergence of the interface iteration is only an error in strict
/// mode; otherwise the solver returns the best available solution and flags
/// it in the [`SolveSummary`](crate::solver::SolveSummary).
#[derive(Debug)]
#[non_exhaustive]
pub enum SolverError {
    /// The solver was configured in a way that makes the decomposition
    /// meaningless or unstable (single subdomain, no corner dofs, ...).
    Configuration(String),
    /// A matrix that must be symmetric positive definite turned out not to
    /// be, or an equivalent numerical breakdown occurred.
    SingularSystem(String),
    /// The interface iteration hit its cap in strict mode. The per-subdomain
    /// solution vectors hold the best available estimate.
    Unconverged { iterations: usize },
    /// A requested operation mode is deliberately not supported.
    Unimplemented(&'static str),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "Invalid solver configuration: {}", msg),
            Self::SingularSystem(msg) => write!(f, "Singular system: {}", msg),
            Self::Unconverged { iterations } => {
                write!(f, "Interface problem did not converge within {} iterations.", iterations)
            }
            Self::Unimplemented(what) => write!(f, "Operation not implemented: {}", what),
        }
    }
}

impl Error for SolverError {}
