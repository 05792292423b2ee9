//! The FETI-DP solver orchestrator.
//!
//! The solver is a state machine over two independent cache epochs:
//!
//! - the **topology epoch** (dof orderings, corner/remainder separation,
//!   Lagrange enumeration), rebuilt only by [`FetiDPSolver::order_dofs`];
//! - the **stiffness epoch** (extracted blocks, factorizations,
//!   preconditioner, coarse problem), invalidated by any stiffness
//!   replacement and rebuilt inside [`FetiDPSolver::solve`].
//!
//! Repeated solves with unchanged stiffness reuse every cached object, so a
//! sequence of right-hand sides costs one factorization.

use crate::assembly::{assemble_subdomain_matrices, ElementMatrixProvider};
use crate::coarse::CoarseProblem;
use crate::distribution::{
    assemble_global_vector, distribute_nodal_loads, gather_global_displacements,
    HeterogeneousStiffnessDistribution, HomogeneousStiffnessDistribution, StiffnessDistribution,
};
use crate::error::SolverError;
use crate::flexibility::{FactorizedKrr, FlexibilityMatrix};
use crate::interface::{solve_interface_problem, InterfaceSolverConfig};
use crate::lagrange::{enumerate_lagrange_multipliers, CrosspointStrategy, LagrangeEnumeration};
use crate::logging::SolverLogger;
use crate::model::{Dof, Model, SubdomainLinearSystem};
use crate::ordering::{DofOrderingStrategy, FreeDofOrderings, NodeMajorOrdering};
use crate::preconditioner::{LumpedPreconditionerFactory, PreconditionerContext, PreconditionerFactory};
use crate::separation::{separate_dofs, CornerNodeSelection, DofSeparation};
use fetidp_sparse::extract::{extract_dense_submatrix, gather, scatter_into};
use fetidp_sparse::pcg::LinearOperator;
use nalgebra::{DMatrix, DVector, RealField};
use nalgebra_sparse::CsrMatrix;
use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
use serde::Serialize;
use std::time::Instant;

const SOLVER_NAME: &str = "FETI-DP solver";

/// Configuration of [`FetiDPSolver`], fixed at construction.
pub struct FetiDPConfig<T: RealField> {
    pub corner_nodes: Box<dyn CornerNodeSelection>,
    pub ordering: Box<dyn DofOrderingStrategy>,
    pub preconditioner: Box<dyn PreconditionerFactory<T>>,
    pub interface_solver: InterfaceSolverConfig<T>,
    pub crosspoint_strategy: CrosspointStrategy,
    /// Whether all subdomains share material properties. When false, shared
    /// dofs are weighted by relative diagonal stiffness instead of 1/multiplicity.
    pub problem_is_homogeneous: bool,
    /// Escalate interface non-convergence from a warning to a hard error.
    pub strict_convergence: bool,
}

impl<T: RealField> FetiDPConfig<T>
where
    InterfaceSolverConfig<T>: Default,
{
    /// A configuration with the default ordering, preconditioner and
    /// interface settings.
    pub fn new(corner_nodes: impl CornerNodeSelection + 'static) -> Self {
        Self {
            corner_nodes: Box::new(corner_nodes),
            ordering: Box::new(NodeMajorOrdering),
            preconditioner: Box::new(LumpedPreconditionerFactory),
            interface_solver: InterfaceSolverConfig::default(),
            crosspoint_strategy: CrosspointStrategy::FullyRedundant,
            problem_is_homogeneous: true,
            strict_convergence: false,
        }
    }
}

/// Outcome of one [`FetiDPSolver::solve`] call.
#[derive(Debug, Clone, Serialize)]
pub struct SolveSummary {
    pub interface_iterations: usize,
    pub converged: bool,
}

struct TopologyData {
    orderings: FreeDofOrderings,
    separation: DofSeparation,
    lagrange: LagrangeEnumeration,
}

enum TopologyState {
    Invalid,
    Valid(TopologyData),
}

struct StiffnessData<T: RealField> {
    factorized_krr: Vec<FactorizedKrr<T>>,
    krc: Vec<DMatrix<T>>,
    preconditioner: Box<dyn LinearOperator<T> + Send + Sync>,
    coarse: CoarseProblem<T>,
}

enum StiffnessState<T: RealField> {
    Invalid,
    Valid(StiffnessData<T>),
}

pub struct FetiDPSolver<T: RealField> {
    model: Model,
    config: FetiDPConfig<T>,
    linear_systems: Vec<SubdomainLinearSystem<T>>,
    distribution: Option<Box<dyn StiffnessDistribution<T>>>,
    topology: TopologyState,
    stiffness: StiffnessState<T>,
    num_factorizations: usize,
    logger: SolverLogger,
}

impl<T: RealField + Send + Sync> FetiDPSolver<T> {
    /// Create a solver for the given partitioned model.
    ///
    /// Rejects models with fewer than two subdomains: tearing a single
    /// subdomain decomposes nothing.
    pub fn new(model: Model, config: FetiDPConfig<T>) -> Result<Self, SolverError> {
        if model.num_subdomains() < 2 {
            return Err(SolverError::Configuration(format!(
                "{} cannot be used with fewer than 2 subdomains.",
                SOLVER_NAME
            )));
        }
        let linear_systems = (0..model.num_subdomains())
            .map(|_| SubdomainLinearSystem::empty())
            .collect();
        Ok(Self {
            model,
            config,
            linear_systems,
            distribution: None,
            topology: TopologyState::Invalid,
            stiffness: StiffnessState::Invalid,
            num_factorizations: 0,
            logger: SolverLogger::new(SOLVER_NAME),
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn logger(&self) -> &SolverLogger {
        &self.logger
    }

    /// Number of per-subdomain remainder-block factorizations performed so
    /// far. Stays constant across solves that only change the rhs.
    pub fn num_factorizations(&self) -> usize {
        self.num_factorizations
    }

    /// True whenever a stiffness matrix changed since the last solve.
    pub fn is_stiffness_modified(&self) -> bool {
        matches!(self.stiffness, StiffnessState::Invalid)
    }

    /// The coarse corner matrix of the current stiffness epoch, if built.
    pub fn coarse_matrix(&self) -> Option<&DMatrix<T>> {
        match &self.stiffness {
            StiffnessState::Valid(data) => Some(data.coarse.matrix()),
            StiffnessState::Invalid => None,
        }
    }

    /// Number of Lagrange multipliers of the current topology epoch.
    pub fn num_lagrange_multipliers(&self) -> Option<usize> {
        match &self.topology {
            TopologyState::Valid(topo) => Some(topo.lagrange.num_multipliers()),
            TopologyState::Invalid => None,
        }
    }

    /// (Re)number the free dofs, select corner nodes, separate dof sets and
    /// enumerate Lagrange multipliers.
    ///
    /// Resets the rhs and solution vectors and invalidates the stiffness
    /// epoch: matrices must be (re)assembled afterwards.
    pub fn order_dofs(&mut self) -> Result<(), SolverError> {
        let start = Instant::now();
        let orderings = self.config.ordering.order_free_dofs(&self.model);
        for (s, system) in self.linear_systems.iter_mut().enumerate() {
            system.reset(orderings.subdomain(s).num_free_dofs());
        }

        let corner_nodes = self.config.corner_nodes.select_corner_nodes(&self.model);
        let separation = separate_dofs(&self.model, &orderings, &corner_nodes)?;
        let lagrange = enumerate_lagrange_multipliers(
            &self.model,
            &orderings,
            &separation,
            self.config.crosspoint_strategy,
        )?;

        self.logger.log_task_duration("Dof ordering", start.elapsed());
        self.logger.log_num_dofs("Global dofs", orderings.num_global_free_dofs());
        self.logger
            .log_num_dofs("Expanded domain dofs", orderings.num_expanded_free_dofs());
        self.logger
            .log_num_dofs("Lagrange multipliers", lagrange.num_multipliers());
        self.logger
            .log_num_dofs("Corner dofs", separation.num_global_corner_dofs());

        self.topology = TopologyState::Valid(TopologyData {
            orderings,
            separation,
            lagrange,
        });
        self.stiffness = StiffnessState::Invalid;
        self.distribution = None;
        Ok(())
    }

    /// Assemble every subdomain's stiffness matrix from the element matrix
    /// provider and mark the stiffness epoch invalid.
    pub fn build_global_matrices(
        &mut self,
        provider: &(dyn Sync + ElementMatrixProvider<T>),
    ) -> eyre::Result<()> {
        let topo = match &self.topology {
            TopologyState::Valid(topo) => topo,
            TopologyState::Invalid => {
                return Err(SolverError::Configuration(
                    "Dofs must be ordered before assembly; call order_dofs first.".to_string(),
                )
                .into())
            }
        };

        let start = Instant::now();
        let matrices = assemble_subdomain_matrices(&self.model, &topo.orderings, provider)?;
        for (system, matrix) in self.linear_systems.iter_mut().zip(matrices) {
            system.set_matrix(matrix);
        }
        self.logger.log_task_duration("Matrix assembly", start.elapsed());

        self.stiffness = StiffnessState::Invalid;
        // The fresh stiffness values also determine the weighting of shared dofs
        self.distribution = None;
        self.ensure_distribution()?;
        Ok(())
    }

    /// Replace one subdomain's stiffness matrix directly.
    ///
    /// The matrix must be the subdomain's free-dof stiffness in the current
    /// dof ordering.
    pub fn set_stiffness_matrix(&mut self, subdomain: usize, matrix: CsrMatrix<T>) -> Result<(), SolverError> {
        let topo = match &self.topology {
            TopologyState::Valid(topo) => topo,
            TopologyState::Invalid => {
                return Err(SolverError::Configuration(
                    "Dofs must be ordered before setting matrices; call order_dofs first.".to_string(),
                ))
            }
        };
        let num_free = topo.orderings.subdomain(subdomain).num_free_dofs();
        if matrix.nrows() != num_free || matrix.ncols() != num_free {
            return Err(SolverError::Configuration(format!(
                "Stiffness matrix of subdomain {} must be {}x{}, got {}x{}.",
                subdomain,
                num_free,
                num_free,
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        self.linear_systems[subdomain].set_matrix(matrix);
        self.stiffness = StiffnessState::Invalid;
        self.distribution = None;
        Ok(())
    }

    /// Mutable access to one subdomain's rhs vector.
    pub fn rhs_mut(&mut self, subdomain: usize) -> &mut DVector<T> {
        self.linear_systems[subdomain].rhs_mut()
    }

    pub fn linear_system(&self, subdomain: usize) -> &SubdomainLinearSystem<T> {
        &self.linear_systems[subdomain]
    }

    /// The solution vector of one subdomain, over its free dofs.
    pub fn solution(&self, subdomain: usize) -> &DVector<T> {
        self.linear_systems[subdomain].solution()
    }

    /// Apply nodal loads, splitting loads at shared dofs across the sharing
    /// subdomains so that their contributions sum to the applied value.
    pub fn apply_nodal_loads(&mut self, loads: &[(Dof, T)]) -> Result<(), SolverError> {
        self.ensure_distribution()?;
        let topo = match &self.topology {
            TopologyState::Valid(topo) => topo,
            TopologyState::Invalid => unreachable!("ensure_distribution checks the topology"),
        };
        let distribution = self.distribution.as_deref().unwrap();
        let increments = distribute_nodal_loads(&self.model, &topo.orderings, distribution, loads)?;
        for (system, increments) in self.linear_systems.iter_mut().zip(increments) {
            let rhs = system.rhs_mut();
            for (index, value) in increments {
                rhs[index] += value;
            }
        }
        Ok(())
    }

    /// Gather the per-subdomain solutions into one global free-dof vector.
    pub fn gather_global_displacements(&self) -> Result<DVector<T>, SolverError> {
        let topo = match &self.topology {
            TopologyState::Valid(topo) => topo,
            TopologyState::Invalid => {
                return Err(SolverError::Configuration(
                    "Dofs must be ordered before gathering displacements.".to_string(),
                ))
            }
        };
        let distribution = self.distribution.as_deref().ok_or_else(|| {
            SolverError::Configuration("No stiffness distribution available; solve first.".to_string())
        })?;
        let solutions: Vec<&DVector<T>> = self.linear_systems.iter().map(|ls| ls.solution()).collect();
        Ok(gather_global_displacements(&topo.orderings, distribution, &solutions))
    }

    /// Solve the decomposed system for the current rhs vectors.
    ///
    /// Rebuilds the stiffness-dependent caches if any matrix changed, runs
    /// the interface iteration and writes each subdomain's free-dof
    /// displacement vector in place.
    pub fn solve(&mut self) -> Result<SolveSummary, SolverError> {
        self.ensure_distribution()?;
        let topo = match &self.topology {
            TopologyState::Valid(topo) => topo,
            TopologyState::Invalid => unreachable!("ensure_distribution checks the topology"),
        };
        let num_subdomains = self.model.num_subdomains();

        // Split the rhs into remainder and corner parts
        let start = Instant::now();
        let mut fr = Vec::with_capacity(num_subdomains);
        let mut fbc = Vec::with_capacity(num_subdomains);
        for (s, system) in self.linear_systems.iter().enumerate() {
            fr.push(gather(system.rhs(), topo.separation.remainder_dofs(s)));
            fbc.push(gather(system.rhs(), topo.separation.corner_dofs(s)));
        }
        self.logger
            .log_task_duration("Separating vectors and matrices", start.elapsed());

        if matches!(self.stiffness, StiffnessState::Invalid) {
            // Extract the stiffness blocks
            let start = Instant::now();
            let matrices: Vec<&CsrMatrix<T>> = self
                .linear_systems
                .iter()
                .enumerate()
                .map(|(s, system)| system.matrix_or_err(s))
                .collect::<Result<_, _>>()?;
            let blocks: Vec<(DMatrix<T>, DMatrix<T>, DMatrix<T>)> = (0..num_subdomains)
                .into_par_iter()
                .map(|s| {
                    let matrix = matrices[s];
                    let remainder = topo.separation.remainder_dofs(s);
                    let corner = topo.separation.corner_dofs(s);
                    (
                        extract_dense_submatrix(matrix, remainder, remainder),
                        extract_dense_submatrix(matrix, remainder, corner),
                        extract_dense_submatrix(matrix, corner, corner),
                    )
                })
                .collect();
            let mut krr = Vec::with_capacity(num_subdomains);
            let mut krc = Vec::with_capacity(num_subdomains);
            let mut kcc = Vec::with_capacity(num_subdomains);
            for (krr_s, krc_s, kcc_s) in blocks {
                krr.push(krr_s);
                krc.push(krc_s);
                kcc.push(kcc_s);
            }
            self.logger
                .log_task_duration("Separating vectors and matrices", start.elapsed());

            // The preconditioner needs the remainder blocks before they are
            // consumed by the factorization.
            let start = Instant::now();
            let distribution = self.distribution.as_deref().unwrap();
            let preconditioner = self.config.preconditioner.create(PreconditionerContext {
                separation: &topo.separation,
                lagrange: &topo.lagrange,
                distribution,
                unfactored_krr: &krr,
            })?;
            self.logger
                .log_task_duration("Calculating preconditioner", start.elapsed());

            // Factorize the remainder blocks
            let start = Instant::now();
            let factorized_krr = krr
                .into_par_iter()
                .enumerate()
                .map(|(s, block)| FactorizedKrr::factorize(block, s))
                .collect::<Result<Vec<_>, _>>()?;
            self.num_factorizations += num_subdomains;
            self.logger.log_task_duration("Matrix factorization", start.elapsed());

            // Static condensation of the remainder dofs
            let start = Instant::now();
            let coarse = CoarseProblem::assemble(&topo.separation, &factorized_krr, &krc, &kcc)?;
            self.logger
                .log_task_duration("Setting up interface problem", start.elapsed());

            self.stiffness = StiffnessState::Valid(StiffnessData {
                factorized_krr,
                krc,
                preconditioner,
                coarse,
            });
        }
        let data = match &self.stiffness {
            StiffnessState::Valid(data) => data,
            StiffnessState::Invalid => unreachable!("the stiffness epoch was just rebuilt"),
        };

        // Condensed corner rhs, disconnected displacements, force norm
        let start = Instant::now();
        let fc_star = CoarseProblem::condense_rhs(&topo.separation, &data.factorized_krr, &data.krc, &fr, &fbc);
        let dr = disconnected_displacements(&topo.lagrange, &data.factorized_krr, &fr);
        let rhs_vectors: Vec<&DVector<T>> = self.linear_systems.iter().map(|ls| ls.rhs()).collect();
        let forces_norm = assemble_global_vector(&topo.orderings, &rhs_vectors).norm();
        self.logger
            .log_task_duration("Setting up interface problem", start.elapsed());

        // Interface solve
        let start = Instant::now();
        let flexibility = FlexibilityMatrix::new(&data.factorized_krr, &data.krc, &topo.separation, &topo.lagrange);
        let interface = solve_interface_problem(
            &flexibility,
            data.preconditioner.as_ref(),
            &data.coarse,
            &fc_star,
            &dr,
            forces_norm,
            &self.config.interface_solver,
        )?;
        self.logger
            .log_task_duration("Solving interface problem", start.elapsed());

        if !interface.converged {
            if self.config.strict_convergence {
                return Err(SolverError::Unconverged {
                    iterations: interface.iterations,
                });
            }
            log::warn!(
                "{}: interface problem did not converge within {} iterations; \
                 continuing with the best available estimate.",
                SOLVER_NAME,
                interface.iterations
            );
        }

        // Back-substitution: ur = Krr⁻¹ (fr − Brᵀ λ − Krc Lc uc), then
        // scatter remainder and corner parts into the free-dof vector.
        let start = Instant::now();
        let solutions: Vec<DVector<T>> = (0..num_subdomains)
            .into_par_iter()
            .map(|s| {
                let jump = topo.lagrange.jump_matrix(s);
                let local_corner = topo.separation.corner_map(s).mul_vector(&interface.corner_displacements);
                let mut forces = fr[s].clone();
                forces -= jump.tr_mul_vector(&interface.lagranges);
                forces -= &data.krc[s] * &local_corner;
                let remainder_displacements = data.factorized_krr[s].solve_vector(&forces);

                let mut free = DVector::zeros(topo.orderings.subdomain(s).num_free_dofs());
                scatter_into(&mut free, topo.separation.remainder_dofs(s), &remainder_displacements);
                scatter_into(&mut free, topo.separation.corner_dofs(s), &local_corner);
                free
            })
            .collect();
        for (system, solution) in self.linear_systems.iter_mut().zip(solutions) {
            system.set_solution(solution);
        }
        self.logger
            .log_task_duration("Calculating displacements from Lagrange multipliers", start.elapsed());

        self.logger.increment_analysis_step();
        Ok(SolveSummary {
            interface_iterations: interface.iterations,
            converged: interface.converged,
        })
    }

    fn ensure_distribution(&mut self) -> Result<(), SolverError> {
        if matches!(self.topology, TopologyState::Invalid) {
            return Err(SolverError::Configuration(
                "Dofs must be ordered first; call order_dofs.".to_string(),
            ));
        }
        if self.distribution.is_some() {
            return Ok(());
        }
        let distribution: Box<dyn StiffnessDistribution<T>> = if self.config.problem_is_homogeneous {
            Box::new(HomogeneousStiffnessDistribution::new(&self.model))
        } else {
            let topo = match &self.topology {
                TopologyState::Valid(topo) => topo,
                TopologyState::Invalid => unreachable!(),
            };
            let matrices: Vec<&CsrMatrix<T>> = self
                .linear_systems
                .iter()
                .enumerate()
                .map(|(s, system)| system.matrix_or_err(s))
                .collect::<Result<_, _>>()?;
            Box::new(HeterogeneousStiffnessDistribution::from_subdomain_matrices(
                &self.model,
                &topo.orderings,
                &matrices,
            ))
        };
        self.distribution = Some(distribution);
        Ok(())
    }
}

/// dr = Σ_s Br[s] · Krr[s]⁻¹ · fr[s]: the jump of the subdomain solutions as
/// if they were disconnected.
fn disconnected_displacements<T: RealField + Send + Sync>(
    lagrange: &LagrangeEnumeration,
    factorizations: &[FactorizedKrr<T>],
    fr: &[DVector<T>],
) -> DVector<T> {
    (0..factorizations.len())
        .into_par_iter()
        .map(|s| {
            let solved = factorizations[s].solve_vector(&fr[s]);
            lagrange.jump_matrix(s).mul_vector(&solved)
        })
        .reduce(|| DVector::zeros(lagrange.num_multipliers()), |a, b| a + b)
}
