//! Assembly of per-subdomain stiffness matrices from element matrices.
//!
//! Element stiffness computation (shape functions, materials, quadrature) is
//! a collaborator concern behind [`ElementMatrixProvider`]; this module only
//! scatters the element matrices into one CSR matrix per subdomain, over the
//! subdomain's free dofs. Rows and columns of constrained dofs are dropped.

use crate::model::{Dof, Model, Subdomain};
use crate::ordering::{DofOrdering, FreeDofOrderings};
use nalgebra::{DMatrix, DMatrixSliceMut, RealField, Scalar};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::cell::RefCell;

/// Supplies the stiffness matrix of a single element.
///
/// The output matrix is ordered node-major: row/column `i * solution_dim + c`
/// corresponds to component `c` at the element's `i`-th node. The output is
/// zeroed before the call.
pub trait ElementMatrixProvider<T: Scalar> {
    fn assemble_element_matrix_into(
        &self,
        subdomain: &Subdomain,
        element_index: usize,
        output: DMatrixSliceMut<T>,
    ) -> eyre::Result<()>;
}

/// An assembler for subdomain CSR matrices.
#[derive(Debug)]
pub struct SubdomainCsrAssembler<T: Scalar> {
    // Buffers that prevent per-element allocations when assembling
    // several matrices with the same assembler
    workspace: RefCell<AssemblerWorkspace<T>>,
}

#[derive(Debug)]
struct AssemblerWorkspace<T: Scalar> {
    element_matrix: DMatrix<T>,
    element_dofs: Vec<Option<usize>>,
}

impl<T: Scalar> Default for SubdomainCsrAssembler<T> {
    fn default() -> Self {
        Self {
            workspace: RefCell::new(AssemblerWorkspace {
                element_matrix: DMatrix::from_row_slice(0, 0, &[]),
                element_dofs: Vec::new(),
            }),
        }
    }
}

impl<T: RealField> SubdomainCsrAssembler<T> {
    /// Assemble the stiffness matrix of one subdomain over its free dofs.
    pub fn assemble_subdomain_matrix(
        &self,
        model: &Model,
        subdomain: &Subdomain,
        ordering: &DofOrdering,
        provider: &dyn ElementMatrixProvider<T>,
    ) -> eyre::Result<CsrMatrix<T>> {
        let sdim = model.solution_dim();
        let num_free = ordering.num_free_dofs();
        let mut coo = CooMatrix::new(num_free, num_free);

        let ws = &mut *self.workspace.borrow_mut();
        for (element_index, element) in subdomain.elements().iter().enumerate() {
            let element_dim = element.num_nodes() * sdim;
            ws.element_matrix.resize_mut(element_dim, element_dim, T::zero());
            ws.element_matrix.fill(T::zero());
            provider.assemble_element_matrix_into(
                subdomain,
                element_index,
                DMatrixSliceMut::from(&mut ws.element_matrix),
            )?;

            ws.element_dofs.clear();
            for &node in element.nodes() {
                for component in 0..sdim {
                    ws.element_dofs.push(ordering.index_of(Dof::new(node, component)));
                }
            }

            for (i, row) in ws.element_dofs.iter().enumerate() {
                let row = match row {
                    Some(row) => *row,
                    None => continue,
                };
                for (j, col) in ws.element_dofs.iter().enumerate() {
                    if let Some(col) = col {
                        coo.push(row, *col, ws.element_matrix[(i, j)].clone());
                    }
                }
            }
        }

        // Duplicate triplets from adjacent elements are summed here
        Ok(CsrMatrix::from(&coo))
    }
}

/// Assemble every subdomain's stiffness matrix, in parallel across subdomains.
pub fn assemble_subdomain_matrices<T>(
    model: &Model,
    orderings: &FreeDofOrderings,
    provider: &(dyn Sync + ElementMatrixProvider<T>),
) -> eyre::Result<Vec<CsrMatrix<T>>>
where
    T: RealField + Send + Sync,
{
    model
        .subdomains()
        .par_iter()
        .map(|subdomain| {
            let assembler = SubdomainCsrAssembler::default();
            assembler.assemble_subdomain_matrix(
                model,
                subdomain,
                orderings.subdomain(subdomain.id()),
                provider,
            )
        })
        .collect()
}
