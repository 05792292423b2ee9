//! Preconditioned conjugate gradient over abstract linear operators.
//!
//! The solver never forms the system matrix: it only requires the action of
//! the operator (and optionally a preconditioner) on a vector. This is the
//! natural shape for interface problems in domain decomposition, where the
//! operator is a sum of per-subdomain triangular solves.

use core::fmt;
use nalgebra::{ClosedAdd, ClosedMul, DMatrix, DVector, DVectorSlice, DVectorSliceMut, RealField, Scalar};
use nalgebra_sparse::ops::serial::spmm_csr_dense;
use nalgebra_sparse::ops::Op;
use nalgebra_sparse::CsrMatrix;
use num::{One, Zero};
use std::error::Error;
use std::ops::{Deref, DerefMut};

pub trait LinearOperator<T: Scalar> {
    fn apply(&self, y: DVectorSliceMut<T>, x: DVectorSlice<T>) -> Result<(), Box<dyn Error>>;
}

impl<'a, T, A> LinearOperator<T> for &'a A
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorSliceMut<T>, x: DVectorSlice<T>) -> Result<(), Box<dyn Error>> {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T, A> LinearOperator<T> for Box<A>
where
    T: Scalar,
    A: ?Sized + LinearOperator<T>,
{
    fn apply(&self, y: DVectorSliceMut<T>, x: DVectorSlice<T>) -> Result<(), Box<dyn Error>> {
        <A as LinearOperator<T>>::apply(self, y, x)
    }
}

impl<T> LinearOperator<T> for DMatrix<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    fn apply(&self, mut y: DVectorSliceMut<T>, x: DVectorSlice<T>) -> Result<(), Box<dyn Error>> {
        y.gemv(T::one(), self, &x, T::zero());
        Ok(())
    }
}

impl<T> LinearOperator<T> for CsrMatrix<T>
where
    T: Scalar + Zero + One + ClosedMul + ClosedAdd,
{
    fn apply(&self, mut y: DVectorSliceMut<T>, x: DVectorSlice<T>) -> Result<(), Box<dyn Error>> {
        spmm_csr_dense(T::zero(), &mut y, T::one(), Op::NoOp(self), Op::NoOp(&x));
        Ok(())
    }
}

pub struct IdentityOperator;

impl<T: Scalar> LinearOperator<T> for IdentityOperator {
    fn apply(&self, mut y: DVectorSliceMut<T>, x: DVectorSlice<T>) -> Result<(), Box<dyn Error>> {
        y.copy_from(&x);
        Ok(())
    }
}

/// Decides convergence of the iteration from the approximate residual.
///
/// The residual passed in is the one maintained by the conjugate gradient
/// recurrence, not the true residual `b - Ax`. For ill-conditioned problems
/// the two can drift apart, but in those cases the iteration is typically
/// unable to improve the solution further anyway.
pub trait StoppingCriterion<T: Scalar> {
    fn has_converged(&self, b_norm: T, iteration: usize, approx_residual: DVectorSlice<T>) -> bool;
}

/// Relative residual tolerance `||r|| <= tol * ||b||`.
#[derive(Debug)]
pub struct RelativeResidualCriterion<T> {
    tol: T,
}

impl<T> RelativeResidualCriterion<T> {
    pub fn new(tol: T) -> Self {
        Self { tol }
    }
}

impl Default for RelativeResidualCriterion<f64> {
    fn default() -> Self {
        Self::new(1e-8)
    }
}

impl Default for RelativeResidualCriterion<f32> {
    fn default() -> Self {
        Self::new(1e-4)
    }
}

impl<T> StoppingCriterion<T> for RelativeResidualCriterion<T>
where
    T: RealField,
{
    fn has_converged(&self, b_norm: T, _iteration: usize, approx_residual: DVectorSlice<T>) -> bool {
        approx_residual.norm() <= self.tol.clone() * b_norm
    }
}

#[derive(Debug, Clone)]
pub struct PcgWorkspace<T: Scalar> {
    r: DVector<T>,
    z: DVector<T>,
    p: DVector<T>,
    ap: DVector<T>,
}

struct Buffers<'a, T: Scalar> {
    r: &'a mut DVector<T>,
    z: &'a mut DVector<T>,
    p: &'a mut DVector<T>,
    ap: &'a mut DVector<T>,
}

impl<T: Scalar + Zero> Default for PcgWorkspace<T> {
    fn default() -> Self {
        Self {
            r: DVector::zeros(0),
            z: DVector::zeros(0),
            p: DVector::zeros(0),
            ap: DVector::zeros(0),
        }
    }
}

impl<T: Scalar + Zero> PcgWorkspace<T> {
    fn prepare_buffers(&mut self, dim: usize) -> Buffers<T> {
        self.r.resize_vertically_mut(dim, T::zero());
        self.z.resize_vertically_mut(dim, T::zero());
        self.p.resize_vertically_mut(dim, T::zero());
        self.ap.resize_vertically_mut(dim, T::zero());
        Buffers {
            r: &mut self.r,
            z: &mut self.z,
            p: &mut self.p,
            ap: &mut self.ap,
        }
    }
}

#[derive(Debug)]
enum OwnedOrMutRef<'a, T> {
    Owned(T),
    MutRef(&'a mut T),
}

impl<'a, T> Deref for OwnedOrMutRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Owned(owned) => owned,
            Self::MutRef(mutref) => mutref,
        }
    }
}

impl<'a, T> DerefMut for OwnedOrMutRef<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Self::Owned(owned) => owned,
            Self::MutRef(mutref) => mutref,
        }
    }
}

/// A builder-configured preconditioned conjugate gradient solver.
///
/// Reaching the iteration cap is not an error: the output reports
/// `converged: false` and the best iterate is left in the solution vector,
/// leaving the caller to decide whether that is acceptable.
#[derive(Debug)]
pub struct ConjugateGradient<'a, T, A, P, Criterion>
where
    T: Scalar,
{
    workspace: OwnedOrMutRef<'a, PcgWorkspace<T>>,
    operator: A,
    preconditioner: P,
    stopping_criterion: Criterion,
    max_iter: Option<usize>,
}

impl<'a, T: Scalar + Zero> ConjugateGradient<'a, T, (), IdentityOperator, ()> {
    pub fn new() -> Self {
        Self {
            workspace: OwnedOrMutRef::Owned(PcgWorkspace::default()),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            max_iter: None,
        }
    }

    pub fn with_workspace(workspace: &'a mut PcgWorkspace<T>) -> Self {
        Self {
            workspace: OwnedOrMutRef::MutRef(workspace),
            operator: (),
            preconditioner: IdentityOperator,
            stopping_criterion: (),
            max_iter: None,
        }
    }
}

impl<'a, T: Scalar, P, Criterion> ConjugateGradient<'a, T, (), P, Criterion> {
    pub fn with_operator<A>(self, operator: A) -> ConjugateGradient<'a, T, A, P, Criterion> {
        ConjugateGradient {
            workspace: self.workspace,
            operator,
            preconditioner: self.preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

impl<'a, T: Scalar, A, P, Criterion> ConjugateGradient<'a, T, A, P, Criterion> {
    pub fn with_preconditioner<P2>(self, preconditioner: P2) -> ConjugateGradient<'a, T, A, P2, Criterion> {
        ConjugateGradient {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner,
            stopping_criterion: self.stopping_criterion,
            max_iter: self.max_iter,
        }
    }

    pub fn with_max_iter(self, max_iter: usize) -> Self {
        Self {
            max_iter: Some(max_iter),
            ..self
        }
    }
}

impl<'a, T: Scalar, A, P> ConjugateGradient<'a, T, A, P, ()> {
    pub fn with_stopping_criterion<Criterion>(
        self,
        stopping_criterion: Criterion,
    ) -> ConjugateGradient<'a, T, A, P, Criterion> {
        ConjugateGradient {
            workspace: self.workspace,
            operator: self.operator,
            preconditioner: self.preconditioner,
            stopping_criterion,
            max_iter: self.max_iter,
        }
    }
}

#[derive(Debug)]
#[non_exhaustive]
pub enum PcgError {
    OperatorError(Box<dyn Error>),
    PreconditionerError(Box<dyn Error>),
    IndefiniteOperator,
    IndefinitePreconditioner,
}

impl fmt::Display for PcgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OperatorError(err) => {
                write!(f, "Error applying operator: ")?;
                err.fmt(f)
            }
            Self::PreconditionerError(err) => {
                write!(f, "Error applying preconditioner: ")?;
                err.fmt(f)
            }
            Self::IndefiniteOperator => write!(f, "Operator appears to be indefinite."),
            Self::IndefinitePreconditioner => write!(f, "Preconditioner appears to be indefinite."),
        }
    }
}

impl Error for PcgError {}

/// y = Ax
fn apply_operator<'a, T, A>(
    y: impl Into<DVectorSliceMut<'a, T>>,
    a: &'a A,
    x: impl Into<DVectorSlice<'a, T>>,
) -> Result<(), Box<dyn Error>>
where
    T: Scalar,
    A: LinearOperator<T>,
{
    a.apply(y.into(), x.into())
}

#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct PcgOutput<T> {
    /// Number of updates made to the solution vector.
    pub num_iterations: usize,
    /// Whether the stopping criterion was met before the iteration cap.
    pub converged: bool,
    /// Norm of the approximate residual at termination.
    pub residual_norm: T,
}

impl<'a, T, A, P, Criterion> ConjugateGradient<'a, T, A, P, Criterion>
where
    T: RealField,
    A: LinearOperator<T>,
    P: LinearOperator<T>,
    Criterion: StoppingCriterion<T>,
{
    pub fn solve_with_guess<'b>(
        &mut self,
        b: impl Into<DVectorSlice<'b, T>>,
        x: impl Into<DVectorSliceMut<'b, T>>,
    ) -> Result<PcgOutput<T>, PcgError> {
        self.solve_with_guess_(b.into(), x.into())
    }

    fn solve_with_guess_(
        &mut self,
        b: DVectorSlice<T>,
        mut x: DVectorSliceMut<T>,
    ) -> Result<PcgOutput<T>, PcgError> {
        use PcgError::*;
        assert_eq!(b.len(), x.len());

        let mut num_iterations = 0;
        let Buffers { r, z, p, ap } = self.workspace.prepare_buffers(x.len());

        // r = b - Ax
        if let Err(err) = apply_operator(&mut *r, &self.operator, &x) {
            return Err(OperatorError(err));
        }
        r.zip_apply(&b, |ax_i, b_i| *ax_i = b_i - ax_i.clone());

        // z = Pr
        if let Err(err) = apply_operator(&mut *z, &self.preconditioner, &*r) {
            return Err(PreconditionerError(err));
        }

        // p = z
        p.copy_from(&z);

        let mut zr = z.dot(r);
        let b_norm = b.norm();

        if b_norm == T::zero() {
            x.fill(T::zero());
            return Ok(PcgOutput {
                num_iterations,
                converged: true,
                residual_norm: T::zero(),
            });
        }

        let converged = loop {
            if self
                .stopping_criterion
                .has_converged(b_norm.clone(), num_iterations, (&*r).into())
            {
                break true;
            } else if let Some(max_iter) = self.max_iter {
                if num_iterations >= max_iter {
                    break false;
                }
            }

            // ap = A * p
            if let Err(err) = apply_operator(&mut *ap, &self.operator, &*p) {
                return Err(OperatorError(err));
            }
            let pap = p.dot(ap);

            if pap <= T::zero() {
                return Err(IndefiniteOperator);
            }
            if zr <= T::zero() {
                return Err(IndefinitePreconditioner);
            }

            let alpha = zr.clone() / pap;
            // x <- x + alpha * p
            x.zip_apply(&*p, |x_i, p_i| *x_i += alpha.clone() * p_i);
            // r <- r - alpha * ap
            r.zip_apply(&*ap, |r_i, ap_i| *r_i -= alpha.clone() * ap_i);

            // Iteration count tracks updates to the solution vector
            num_iterations += 1;

            // z <- P r
            if let Err(err) = apply_operator(&mut *z, &self.preconditioner, &*r) {
                return Err(PreconditionerError(err));
            }
            let zr_next = z.dot(&*r);
            let beta = zr_next.clone() / zr.clone();

            // p <- z + beta * p
            p.zip_apply(&*z, |p_i, z_i| *p_i = z_i + beta.clone() * p_i.clone());

            zr = zr_next;
        };

        Ok(PcgOutput {
            num_iterations,
            converged,
            residual_norm: r.norm(),
        })
    }
}
