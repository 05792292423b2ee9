//! A FETI-DP domain decomposition solver for finite element computations.
//!
//! The global structural model is torn into non-overlapping subdomains; each
//! subdomain's remainder dofs are eliminated by a local Cholesky
//! factorization, the globally shared corner dofs form a coarse problem, and
//! continuity at the remaining shared dofs is enforced by Lagrange
//! multipliers through a preconditioned conjugate gradient iteration on the
//! implicit interface flexibility operator.

pub mod assembly;
pub mod coarse;
pub mod distribution;
pub mod error;
pub mod flexibility;
pub mod interface;
pub mod lagrange;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod ordering;
pub mod preconditioner;
pub mod separation;
pub mod solver;

pub extern crate fetidp_sparse;
pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use crate::error::SolverError;
pub use crate::model::{Dof, Element, Model};
pub use crate::solver::{FetiDPConfig, FetiDPSolver, SolveSummary};
