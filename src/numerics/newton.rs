use crate::numerics::block::LinearSolveError;
use crate::numerics::timing::{record_jacobian, record_linear_solve};
use crate::numerics::{Convergence, Tolerance};
use crate::physics::PhysicsModel;
use nalgebra::DVector;
use thiserror::Error;

/// Newton solver knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverConfig {
    pub max_iterations: u32,
    pub convergence: Convergence,
    /// Largest change of any unknown in one iteration, in thermal voltages.
    pub damping_limit: f64,
    /// Stop as soon as the residual or the update is not finite.
    pub check_finite: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence: Convergence::default(),
            damping_limit: 1.0,
            check_finite: true,
        }
    }
}

impl SolverConfig {
    pub fn with_max_iterations(self, max_iterations: u32) -> Self {
        Self { max_iterations, ..self }
    }

    pub fn with_damping_limit(self, damping_limit: f64) -> Self {
        Self { damping_limit, ..self }
    }

    pub fn with_convergence(self, convergence: Convergence) -> Self {
        Self { convergence, ..self }
    }

    pub fn with_residual_tolerance(self, tol: f64) -> Self {
        let convergence = Convergence {
            residual_tolerance: Tolerance::Absolute(tol),
            ..self.convergence
        };
        Self { convergence, ..self }
    }

    pub fn with_update_tolerance(self, tol: f64) -> Self {
        let convergence = Convergence {
            update_tolerance: Tolerance::Absolute(tol),
            ..self.convergence
        };
        Self { convergence, ..self }
    }

    pub fn with_finite_checks(self, check_finite: bool) -> Self {
        Self { check_finite, ..self }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DivergenceCause {
    #[error("iteration budget exhausted")]
    IterationBudget,
    #[error("non-finite residual or update")]
    NumericOverflow,
    #[error("singular Jacobian: {0}")]
    SingularJacobian(#[from] LinearSolveError),
}

/// Newton's method did not reach a fixed point.
#[derive(Debug, Clone, Error)]
#[error("Newton's method diverged after {iterations} iterations ({cause})")]
pub struct SolverDivergence {
    pub cause: DivergenceCause,
    pub last_iterate: DVector<f64>,
    pub iterations: u32,
    pub residual_history: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SolverResult {
    pub solution: DVector<f64>,
    pub iterations: u32,
    pub final_residual: f64,
    pub residual_history: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
enum NewtonState {
    Initializing,
    Iterating,
    Converged,
    Diverged(DivergenceCause),
}

fn all_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NewtonSolver {
    pub config: SolverConfig,
}

impl NewtonSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Damped Newton iteration on `model` from `initial_guess`.
    ///
    /// Every update component is clamped to `±damping_limit`. The linear
    /// system is row-equilibrated and solved by block elimination.
    pub fn solve<M: PhysicsModel>(
        &self,
        model: &M,
        initial_guess: DVector<f64>,
    ) -> Result<SolverResult, SolverDivergence> {
        let cfg = &self.config;
        let conv = &cfg.convergence;

        let mut x = initial_guess;
        let mut residual = DVector::zeros(0);
        let mut history = Vec::new();
        let mut iterations = 0u32;
        let mut initial_update = None;
        let mut state = NewtonState::Initializing;

        log::debug!("Newton: {} unknowns, {} per node", x.len(), model.num_variables());
        log::debug!("   Iter |   |F(x)|     |  |dx|");

        loop {
            state = match state {
                NewtonState::Initializing => {
                    residual = model.residual(&x);
                    let norm = conv.norm(&residual);
                    history.push(norm);
                    if cfg.check_finite && !all_finite(&residual) {
                        NewtonState::Diverged(DivergenceCause::NumericOverflow)
                    } else if conv.check_initial(norm) {
                        NewtonState::Converged
                    } else {
                        NewtonState::Iterating
                    }
                }
                NewtonState::Iterating => {
                    if iterations >= cfg.max_iterations {
                        NewtonState::Diverged(DivergenceCause::IterationBudget)
                    } else {
                        self.iterate(
                            model,
                            &mut x,
                            &mut residual,
                            &mut history,
                            &mut iterations,
                            &mut initial_update,
                        )
                    }
                }
                NewtonState::Converged => {
                    let final_residual = history.last().copied().unwrap_or(0.0);
                    log::debug!(
                        "Newton converged in {iterations} iterations, |F| = {final_residual:.3e}"
                    );
                    return Ok(SolverResult {
                        solution: x,
                        iterations,
                        final_residual,
                        residual_history: history,
                    });
                }
                NewtonState::Diverged(cause) => {
                    log::warn!("Newton diverged after {iterations} iterations: {cause}");
                    return Err(SolverDivergence {
                        cause,
                        last_iterate: x,
                        iterations,
                        residual_history: history,
                    });
                }
            };
        }
    }

    fn iterate<M: PhysicsModel>(
        &self,
        model: &M,
        x: &mut DVector<f64>,
        residual: &mut DVector<f64>,
        history: &mut Vec<f64>,
        iterations: &mut u32,
        initial_update: &mut Option<f64>,
    ) -> NewtonState {
        let cfg = &self.config;
        let conv = &cfg.convergence;

        let jacobian = record_jacobian(|| model.jacobian(x));
        let step = record_linear_solve(|| {
            jacobian
                .factor_equilibrated()
                .and_then(|lu| lu.solve(&-&*residual))
        });
        let mut delta = match step {
            Ok(delta) => delta,
            Err(err) => return NewtonState::Diverged(err.into()),
        };
        if cfg.check_finite && !all_finite(&delta) {
            return NewtonState::Diverged(DivergenceCause::NumericOverflow);
        }

        let limit = cfg.damping_limit;
        delta.iter_mut().for_each(|d| *d = d.clamp(-limit, limit));
        *x += &delta;
        *iterations += 1;

        *residual = model.residual(x);
        let residual_norm = conv.norm(residual);
        let update_norm = conv.norm(&delta);
        let initial_residual = history[0];
        let initial_update = *initial_update.get_or_insert(update_norm);
        history.push(residual_norm);
        log::debug!("{:>7} | {:>12.4e} | {:>12.4e}", iterations, residual_norm, update_norm);

        if cfg.check_finite && !all_finite(residual) {
            NewtonState::Diverged(DivergenceCause::NumericOverflow)
        } else if conv.check_convergence(
            residual_norm,
            update_norm,
            initial_residual,
            initial_update,
        ) {
            NewtonState::Converged
        } else {
            NewtonState::Iterating
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::block::BlockTridiagonal;
    use crate::numerics::ConvergenceCriteria;
    use approx::assert_relative_eq;

    /// Nodewise `exp(u_i) - c_i = 0` with a weak neighbour coupling.
    struct Exponential {
        target: Vec<f64>,
        coupling: f64,
    }

    impl PhysicsModel for Exponential {
        fn num_variables(&self) -> usize {
            1
        }

        fn num_nodes(&self) -> usize {
            self.target.len()
        }

        fn residual(&self, u: &DVector<f64>) -> DVector<f64> {
            let n = u.len();
            DVector::from_fn(n, |i, _| {
                let left = if i > 0 { u[i - 1] } else { 0.0 };
                let right = if i + 1 < n { u[i + 1] } else { 0.0 };
                u[i].exp() - self.target[i] + self.coupling * (2.0 * u[i] - left - right)
            })
        }

        fn jacobian(&self, u: &DVector<f64>) -> BlockTridiagonal {
            let n = u.len();
            let mut jac = BlockTridiagonal::zeros(n, 1);
            for i in 0..n {
                jac.diag[i][(0, 0)] = u[i].exp() + 2.0 * self.coupling;
                if i + 1 < n {
                    jac.upper[i][(0, 0)] = -self.coupling;
                    jac.lower[i][(0, 0)] = -self.coupling;
                }
            }
            jac
        }
    }

    #[test]
    fn converges_from_a_distant_guess_with_damping() {
        let model = Exponential {
            target: vec![1e6, 2.0, 1e-4, 3.0],
            coupling: 0.1,
        };
        let result = NewtonSolver::default()
            .solve(&model, DVector::zeros(4))
            .unwrap();
        assert!(result.iterations > 5, "damping limits the first steps");
        assert!(model.residual(&result.solution).amax() < 1e-6);
        assert_eq!(result.residual_history.len() as u32, result.iterations + 1);
    }

    #[test]
    fn converged_guess_needs_no_iteration_under_residual_criterion() {
        let model = Exponential {
            target: vec![1.0; 3],
            coupling: 0.5,
        };
        let config = SolverConfig::default().with_convergence(Convergence {
            criteria: ConvergenceCriteria::Either,
            ..Convergence::default()
        });
        let result = NewtonSolver::new(config).solve(&model, DVector::zeros(3)).unwrap();
        assert_eq!(result.iterations, 0);
        assert_relative_eq!(result.final_residual, 0.0);
    }

    #[test]
    fn budget_exhaustion_reports_last_iterate() {
        let model = Exponential {
            target: vec![1e30; 2],
            coupling: 0.0,
        };
        let config = SolverConfig::default().with_max_iterations(5);
        let err = NewtonSolver::new(config).solve(&model, DVector::zeros(2)).unwrap_err();
        assert_eq!(err.cause, DivergenceCause::IterationBudget);
        assert_eq!(err.iterations, 5);
        assert_relative_eq!(err.last_iterate[0], 5.0);
        assert_eq!(err.residual_history.len(), 6);
    }

    #[test]
    fn non_finite_residual_is_an_overflow() {
        let model = Exponential {
            target: vec![1.0; 2],
            coupling: 0.0,
        };
        let err = NewtonSolver::default()
            .solve(&model, DVector::from_element(2, 1e4))
            .unwrap_err();
        assert_eq!(err.cause, DivergenceCause::NumericOverflow);
        assert_eq!(err.iterations, 0);
    }
}
