pub mod block;
pub mod newton;
pub mod spline;
pub mod timing;

use nalgebra::DVector;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    Absolute(f64),
    Relative(f64),
    Combined(f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceMetric {
    L2Norm,
    MaxNorm,
}

/// Convergence criteria for iterative solvers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceCriteria {
    Residual,
    Update,
    Both,
    /// Whichever of the two is met first.
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence {
    pub criteria: ConvergenceCriteria,
    pub residual_tolerance: Tolerance,
    pub update_tolerance: Tolerance,
    pub metric: ConvergenceMetric,
}

impl Default for Convergence {
    fn default() -> Self {
        Self {
            criteria: ConvergenceCriteria::Update,
            residual_tolerance: Tolerance::Absolute(1e-12),
            update_tolerance: Tolerance::Absolute(1e-9),
            metric: ConvergenceMetric::MaxNorm,
        }
    }
}

impl Convergence {
    pub fn norm(&self, vector: &DVector<f64>) -> f64 {
        match self.metric {
            ConvergenceMetric::L2Norm => vector.norm(),
            ConvergenceMetric::MaxNorm => vector.amax(),
        }
    }

    pub fn check_tolerance(tolerance: Tolerance, norm: f64, initial_norm: f64) -> bool {
        match tolerance {
            Tolerance::Absolute(tol) => norm < tol,
            Tolerance::Relative(tol) => initial_norm > 0.0 && norm / initial_norm < tol,
            Tolerance::Combined(abs_tol, rel_tol) => {
                norm < abs_tol || (initial_norm > 0.0 && norm / initial_norm < rel_tol)
            }
        }
    }

    /// Test before the first step: only a residual criterion can already hold.
    pub fn check_initial(&self, residual_norm: f64) -> bool {
        match self.criteria {
            ConvergenceCriteria::Residual | ConvergenceCriteria::Either => {
                Self::check_tolerance(self.residual_tolerance, residual_norm, residual_norm)
            }
            ConvergenceCriteria::Update | ConvergenceCriteria::Both => false,
        }
    }

    pub fn check_convergence(
        &self,
        residual_norm: f64,
        update_norm: f64,
        initial_residual_norm: f64,
        initial_update_norm: f64,
    ) -> bool {
        let residual = || {
            Self::check_tolerance(self.residual_tolerance, residual_norm, initial_residual_norm)
        };
        let update =
            || Self::check_tolerance(self.update_tolerance, update_norm, initial_update_norm);
        match self.criteria {
            ConvergenceCriteria::Residual => residual(),
            ConvergenceCriteria::Update => update(),
            ConvergenceCriteria::Both => residual() && update(),
            ConvergenceCriteria::Either => residual() || update(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_tolerance_needs_a_reference() {
        assert!(!Convergence::check_tolerance(Tolerance::Relative(1e-3), 0.0, 0.0));
        assert!(Convergence::check_tolerance(Tolerance::Combined(1e-3, 1e-6), 0.0, 0.0));
        assert!(Convergence::check_tolerance(Tolerance::Relative(1e-3), 1e-4, 1.0));
    }

    #[test]
    fn either_accepts_a_small_update() {
        let c = Convergence {
            criteria: ConvergenceCriteria::Either,
            ..Convergence::default()
        };
        assert!(c.check_convergence(1.0, 1e-10, 1.0, 1.0));
        assert!(!c.check_convergence(1.0, 1e-3, 1.0, 1.0));
        assert!(!Convergence::default().check_initial(0.0));
        assert!(c.check_initial(0.0));
    }
}
