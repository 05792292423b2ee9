//! Preconditioning of the dual interface problem.

use crate::distribution::StiffnessDistribution;
use crate::error::SolverError;
use crate::lagrange::LagrangeEnumeration;
use crate::mapping::WeightedBooleanMatrix;
use crate::separation::DofSeparation;
use fetidp_sparse::pcg::LinearOperator;
use itertools::izip;
use nalgebra::{DMatrix, DVector, DVectorSlice, DVectorSliceMut, RealField};
use std::error::Error;

/// Everything a preconditioner may be built from.
///
/// `unfactored_krr` holds the remainder blocks as extracted from the
/// assembled stiffness matrices; the factory runs strictly before those
/// blocks are overwritten by their factorization.
pub struct PreconditionerContext<'a, T: RealField> {
    pub separation: &'a DofSeparation,
    pub lagrange: &'a LagrangeEnumeration,
    pub distribution: &'a dyn StiffnessDistribution<T>,
    pub unfactored_krr: &'a [DMatrix<T>],
}

pub trait PreconditionerFactory<T: RealField> {
    fn create(&self, context: PreconditionerContext<'_, T>) -> Result<Box<dyn LinearOperator<T> + Send + Sync>, SolverError>;
}

/// The lumped preconditioner `M⁻¹ = Σ_s Bpb[s] · Kbb[s] · Bpb[s]ᵀ`.
///
/// `Kbb` is the boundary-boundary block of the unfactored remainder
/// stiffness and `Bpb` the boundary-restricted jump matrix scaled by the
/// stiffness-distribution weights. Applying it involves no solves at all,
/// which makes it cheap to build and to apply at the price of slower
/// interface convergence than solve-based variants.
pub struct LumpedPreconditioner<T: RealField> {
    scaled_jump_matrices: Vec<WeightedBooleanMatrix<T>>,
    boundary_blocks: Vec<DMatrix<T>>,
}

impl<T: RealField> LumpedPreconditioner<T> {
    pub fn new(context: &PreconditionerContext<'_, T>) -> Self {
        let num_subdomains = context.unfactored_krr.len();
        let num_multipliers = context.lagrange.num_multipliers();
        let mut scaled_jump_matrices = Vec::with_capacity(num_subdomains);
        let mut boundary_blocks = Vec::with_capacity(num_subdomains);

        for s in 0..num_subdomains {
            let boundary = context.separation.boundary_dofs(s);
            let keys = context.separation.boundary_dof_keys(s);
            let krr = &context.unfactored_krr[s];

            let kbb = DMatrix::from_fn(boundary.len(), boundary.len(), |i, j| {
                krr[(boundary[i], boundary[j])].clone()
            });

            // Remainder position -> boundary position
            let mut boundary_position = vec![usize::MAX; krr.nrows()];
            for (position, &remainder_position) in boundary.iter().enumerate() {
                boundary_position[remainder_position] = position;
            }

            let mut bpb = WeightedBooleanMatrix::new(num_multipliers, boundary.len());
            for (row, col, sign) in context.lagrange.jump_matrix(s).entries() {
                let position = boundary_position[col];
                assert_ne!(
                    position,
                    usize::MAX,
                    "Internal error: multiplier attached to a non-boundary dof"
                );
                let weight = context.distribution.boundary_dof_weight(keys[position], s);
                let value = if sign > 0 { weight } else { -weight };
                bpb.push(row, position, value);
            }

            scaled_jump_matrices.push(bpb);
            boundary_blocks.push(kbb);
        }

        Self {
            scaled_jump_matrices,
            boundary_blocks,
        }
    }
}

impl<T: RealField> LinearOperator<T> for LumpedPreconditioner<T> {
    fn apply(&self, mut y: DVectorSliceMut<T>, x: DVectorSlice<T>) -> Result<(), Box<dyn Error>> {
        let mut accumulated = DVector::zeros(x.len());
        for (bpb, kbb) in izip!(&self.scaled_jump_matrices, &self.boundary_blocks) {
            let restricted = bpb.tr_mul_vector(&x);
            let scaled = kbb * restricted;
            accumulated += bpb.mul_vector(&scaled);
        }
        y.copy_from(&accumulated);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LumpedPreconditionerFactory;

impl<T: RealField> PreconditionerFactory<T> for LumpedPreconditionerFactory {
    fn create(&self, context: PreconditionerContext<'_, T>) -> Result<Box<dyn LinearOperator<T> + Send + Sync>, SolverError> {
        Ok(Box::new(LumpedPreconditioner::new(&context)))
    }
}
