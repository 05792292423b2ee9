//! A minimal structural model: nodes, element connectivity and subdomains.
//!
//! The solver does not know about shape functions, materials or geometry. It
//! consumes the model through a narrow surface: which nodes belong to which
//! subdomain, which dofs are constrained, and — at assembly time — one
//! stiffness matrix per element supplied by a collaborator.

use crate::error::SolverError;
use nalgebra::{DVector, Scalar};
use nalgebra_sparse::CsrMatrix;
use num::Zero;
use rustc_hash::FxHashSet;

/// A degree of freedom: one solution component at one mesh node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dof {
    pub node: usize,
    pub component: usize,
}

impl Dof {
    pub fn new(node: usize, component: usize) -> Self {
        Self { node, component }
    }
}

/// Element connectivity: the global node indices of one finite element.
#[derive(Debug, Clone)]
pub struct Element {
    nodes: Vec<usize>,
}

impl Element {
    pub fn new(nodes: Vec<usize>) -> Self {
        assert!(!nodes.is_empty(), "An element must reference at least one node.");
        Self { nodes }
    }

    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// A non-overlapping partition member of the mesh.
///
/// Owns its element connectivity; the distinct node list is derived and kept
/// sorted so that all downstream numbering passes are deterministic.
#[derive(Debug, Clone)]
pub struct Subdomain {
    id: usize,
    elements: Vec<Element>,
    nodes: Vec<usize>,
}

impl Subdomain {
    fn from_elements(id: usize, elements: Vec<Element>) -> Self {
        let mut nodes: Vec<usize> = elements
            .iter()
            .flat_map(|element| element.nodes().iter().copied())
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        Self { id, elements, nodes }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Sorted distinct node indices of this subdomain.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    pub fn contains_node(&self, node: usize) -> bool {
        self.nodes.binary_search(&node).is_ok()
    }
}

/// The partitioned structural model.
#[derive(Debug, Clone)]
pub struct Model {
    num_nodes: usize,
    solution_dim: usize,
    subdomains: Vec<Subdomain>,
    constrained: FxHashSet<Dof>,
    // node -> sorted ids of the subdomains containing it
    node_subdomains: Vec<Vec<usize>>,
}

impl Model {
    /// Create a model with `num_nodes` mesh nodes and `solution_dim` solution
    /// components per node.
    pub fn new(num_nodes: usize, solution_dim: usize) -> Self {
        assert!(solution_dim >= 1, "The solution must have at least one component per node.");
        Self {
            num_nodes,
            solution_dim,
            subdomains: Vec::new(),
            constrained: FxHashSet::default(),
            node_subdomains: vec![Vec::new(); num_nodes],
        }
    }

    /// Add a subdomain from its element connectivity. Returns the subdomain id.
    pub fn add_subdomain(&mut self, elements: Vec<Element>) -> usize {
        let id = self.subdomains.len();
        let subdomain = Subdomain::from_elements(id, elements);
        for &node in subdomain.nodes() {
            assert!(node < self.num_nodes, "Element references a node outside the model.");
            self.node_subdomains[node].push(id);
        }
        self.subdomains.push(subdomain);
        id
    }

    /// Constrain (fix to zero) one dof.
    pub fn constrain(&mut self, node: usize, component: usize) {
        assert!(node < self.num_nodes && component < self.solution_dim);
        self.constrained.insert(Dof::new(node, component));
    }

    /// Constrain all components of a node.
    pub fn constrain_node(&mut self, node: usize) {
        for component in 0..self.solution_dim {
            self.constrain(node, component);
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn solution_dim(&self) -> usize {
        self.solution_dim
    }

    pub fn num_subdomains(&self) -> usize {
        self.subdomains.len()
    }

    pub fn subdomains(&self) -> &[Subdomain] {
        &self.subdomains
    }

    pub fn subdomain(&self, id: usize) -> &Subdomain {
        &self.subdomains[id]
    }

    pub fn is_constrained(&self, dof: Dof) -> bool {
        self.constrained.contains(&dof)
    }

    /// Sorted ids of the subdomains containing `node`.
    pub fn node_subdomains(&self, node: usize) -> &[usize] {
        &self.node_subdomains[node]
    }

    /// Number of subdomains sharing `node`.
    pub fn node_multiplicity(&self, node: usize) -> usize {
        self.node_subdomains[node].len()
    }

    /// Whether `node` lies on the interface between two or more subdomains.
    pub fn is_boundary_node(&self, node: usize) -> bool {
        self.node_multiplicity(node) >= 2
    }
}

/// The linear system of one subdomain: assembled stiffness, rhs, solution.
///
/// The matrix is absent until assembly has run; rhs and solution are sized by
/// the free-dof ordering.
#[derive(Debug, Clone)]
pub struct SubdomainLinearSystem<T: Scalar> {
    matrix: Option<CsrMatrix<T>>,
    rhs: DVector<T>,
    solution: DVector<T>,
}

impl<T: Scalar + Zero> SubdomainLinearSystem<T> {
    pub(crate) fn empty() -> Self {
        Self {
            matrix: None,
            rhs: DVector::zeros(0),
            solution: DVector::zeros(0),
        }
    }

    pub(crate) fn reset(&mut self, num_free_dofs: usize) {
        self.matrix = None;
        self.rhs = DVector::zeros(num_free_dofs);
        self.solution = DVector::zeros(num_free_dofs);
    }

    pub(crate) fn set_matrix(&mut self, matrix: CsrMatrix<T>) {
        self.matrix = Some(matrix);
    }

    pub(crate) fn matrix_or_err(&self, subdomain: usize) -> Result<&CsrMatrix<T>, SolverError> {
        self.matrix.as_ref().ok_or_else(|| {
            SolverError::Configuration(format!(
                "Subdomain {} has no stiffness matrix; assemble or set one before solving.",
                subdomain
            ))
        })
    }

    pub fn matrix(&self) -> Option<&CsrMatrix<T>> {
        self.matrix.as_ref()
    }

    pub fn rhs(&self) -> &DVector<T> {
        &self.rhs
    }

    pub(crate) fn rhs_mut(&mut self) -> &mut DVector<T> {
        &mut self.rhs
    }

    pub fn solution(&self) -> &DVector<T> {
        &self.solution
    }

    pub(crate) fn set_solution(&mut self, solution: DVector<T>) {
        self.solution = solution;
    }
}
