//! Shared fixtures: canonical element matrices, small partitioned models and
//! a direct (undecomposed) reference solve.
#![allow(dead_code)]

use fetidp::assembly::ElementMatrixProvider;
use fetidp::model::{Dof, Element, Model, Subdomain};
use fetidp::ordering::{DofOrderingStrategy, FreeDofOrderings, NodeMajorOrdering};
use nalgebra::{DMatrix, DMatrixSliceMut, DVector};

/// Stiffness of a 1D spring/bar element between two nodes.
pub fn spring_matrix(stiffness: f64) -> DMatrix<f64> {
    DMatrix::from_row_slice(2, 2, &[stiffness, -stiffness, -stiffness, stiffness])
}

/// Laplace stiffness of a bilinear quadrilateral on the unit square, nodes in
/// cyclic order.
pub fn laplace_quad_matrix() -> DMatrix<f64> {
    DMatrix::from_row_slice(
        4,
        4,
        &[
            4.0, -1.0, -2.0, -1.0, //
            -1.0, 4.0, -1.0, -2.0, //
            -2.0, -1.0, 4.0, -1.0, //
            -1.0, -2.0, -1.0, 4.0,
        ],
    ) / 6.0
}

/// Every element is a spring with the same stiffness.
pub struct UniformSpringProvider {
    pub stiffness: f64,
}

impl ElementMatrixProvider<f64> for UniformSpringProvider {
    fn assemble_element_matrix_into(
        &self,
        _subdomain: &Subdomain,
        _element_index: usize,
        mut output: DMatrixSliceMut<f64>,
    ) -> eyre::Result<()> {
        output.copy_from(&spring_matrix(self.stiffness));
        Ok(())
    }
}

/// Spring elements whose stiffness depends on the owning subdomain, for
/// heterogeneous scenarios.
pub struct SubdomainSpringProvider {
    pub stiffness: Vec<f64>,
}

impl ElementMatrixProvider<f64> for SubdomainSpringProvider {
    fn assemble_element_matrix_into(
        &self,
        subdomain: &Subdomain,
        _element_index: usize,
        mut output: DMatrixSliceMut<f64>,
    ) -> eyre::Result<()> {
        output.copy_from(&spring_matrix(self.stiffness[subdomain.id()]));
        Ok(())
    }
}

/// Every element is a unit-square bilinear Laplace quad.
pub struct LaplaceQuadProvider;

impl ElementMatrixProvider<f64> for LaplaceQuadProvider {
    fn assemble_element_matrix_into(
        &self,
        _subdomain: &Subdomain,
        _element_index: usize,
        mut output: DMatrixSliceMut<f64>,
    ) -> eyre::Result<()> {
        output.copy_from(&laplace_quad_matrix());
        Ok(())
    }
}

/// A bar of two spring elements split at the middle node:
///
/// ```text
/// 0 --- 1 --- 2        subdomains: {0,1} | {1,2}
/// ```
///
/// with both ends fixed. The shared node is the only interface node.
pub fn two_subdomain_bar() -> Model {
    let mut model = Model::new(3, 1);
    model.add_subdomain(vec![Element::new(vec![0, 1])]);
    model.add_subdomain(vec![Element::new(vec![1, 2])]);
    model.constrain_node(0);
    model.constrain_node(2);
    model
}

/// A bar of four spring elements split at the middle node:
///
/// ```text
/// 0 - 1 - 2 - 3 - 4    subdomains: {0..2} | {2..4}
/// ```
///
/// with both ends fixed, so each subdomain keeps one remainder dof.
pub fn five_node_bar() -> Model {
    let mut model = Model::new(5, 1);
    model.add_subdomain(vec![Element::new(vec![0, 1]), Element::new(vec![1, 2])]);
    model.add_subdomain(vec![Element::new(vec![2, 3]), Element::new(vec![3, 4])]);
    model.constrain_node(0);
    model.constrain_node(4);
    model
}

/// A 2x2 grid of unit square elements, one element per subdomain, scalar
/// field, bottom edge fixed:
///
/// ```text
/// 6 - 7 - 8
/// | 2 | 3 |
/// 3 - 4 - 5
/// | 0 | 1 |
/// 0 - 1 - 2     (nodes 0, 1, 2 constrained)
/// ```
///
/// Node 4 is the crosspoint shared by all four subdomains; nodes 3, 5, 7 are
/// shared by two subdomains each.
pub fn grid_2x2() -> Model {
    let mut model = Model::new(9, 1);
    model.add_subdomain(vec![Element::new(vec![0, 1, 4, 3])]);
    model.add_subdomain(vec![Element::new(vec![1, 2, 5, 4])]);
    model.add_subdomain(vec![Element::new(vec![3, 4, 7, 6])]);
    model.add_subdomain(vec![Element::new(vec![4, 5, 8, 7])]);
    for node in 0..3 {
        model.constrain_node(node);
    }
    model
}

/// Solve the undecomposed global problem by dense Cholesky, as a reference
/// for the decomposed solver.
///
/// Returns the global free-dof solution together with the orderings used to
/// address it (node-major, the same strategy the solver defaults to).
pub fn direct_global_solution(
    model: &Model,
    provider: &dyn ElementMatrixProvider<f64>,
    loads: &[(Dof, f64)],
) -> (DVector<f64>, FreeDofOrderings) {
    let orderings = NodeMajorOrdering.order_free_dofs(model);
    let global = orderings.global();
    let n = global.num_free_dofs();
    let mut matrix = DMatrix::zeros(n, n);

    for subdomain in model.subdomains() {
        for (element_index, element) in subdomain.elements().iter().enumerate() {
            let dim = element.num_nodes() * model.solution_dim();
            let mut element_matrix = DMatrix::zeros(dim, dim);
            provider
                .assemble_element_matrix_into(
                    subdomain,
                    element_index,
                    DMatrixSliceMut::from(&mut element_matrix),
                )
                .unwrap();
            let dofs: Vec<Option<usize>> = element
                .nodes()
                .iter()
                .flat_map(|&node| {
                    (0..model.solution_dim()).map(move |component| global.index_of(Dof::new(node, component)))
                })
                .collect();
            for (i, row) in dofs.iter().enumerate() {
                for (j, col) in dofs.iter().enumerate() {
                    if let (Some(row), Some(col)) = (row, col) {
                        matrix[(*row, *col)] += element_matrix[(i, j)];
                    }
                }
            }
        }
    }

    let mut rhs = DVector::zeros(n);
    for (dof, value) in loads {
        rhs[global.index_of(*dof).unwrap()] += value;
    }

    let solution = matrix
        .cholesky()
        .expect("Reference problem must be positive definite")
        .solve(&rhs);
    (solution, orderings)
}
