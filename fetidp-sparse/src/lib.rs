//! Sparse linear algebra building blocks for `fetidp`.
//!
//! Provides the small capability set the domain-decomposition solver needs from
//! its matrix storage — symmetric submatrix extraction, gather/scatter — and a
//! preconditioned conjugate gradient solver over an abstract linear operator.

pub mod extract;
pub mod pcg;

pub use nalgebra_sparse::{CooMatrix, CsrMatrix};
