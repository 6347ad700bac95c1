use crate::error::{DeviceError, Result};
use crate::models::cell::Cell;
use crate::numerics::newton::{NewtonSolver, SolverConfig};
use crate::physics::bc::{boundary, boundary_eq};
use crate::physics::potentials::Potentials;
use crate::physics::residual::Equilibrium;
use nalgebra::DVector;

/// Converged potentials together with the solver diagnostics.
#[derive(Debug, Clone)]
pub struct Solved {
    pub potentials: Potentials,
    pub iterations: u32,
    pub final_residual: f64,
    pub residual_history: Vec<f64>,
}

/// Straight line between the two built-in contact potentials, flat
/// quasi-Fermi levels.
pub fn equilibrium_guess(cell: &Cell) -> Potentials {
    let (phi0, phi_l) = boundary_eq(cell);
    let n = cell.len();
    let last = (n - 1).max(1) as f64;
    Potentials::equilibrium(DVector::from_fn(n, |i, _| {
        phi0 + (phi_l - phi0) * i as f64 / last
    }))
}

pub(crate) fn check_initial(
    cell: &Cell,
    initial: &Potentials,
) -> std::result::Result<(), DeviceError> {
    if initial.len() != cell.len() {
        return Err(DeviceError::LengthMismatch {
            field: "initial potentials",
            expected: cell.len(),
            actual: initial.len(),
        });
    }
    Ok(())
}

/// Zero-bias solve from [`equilibrium_guess`].
pub fn solve_equilibrium(cell: &Cell, config: &SolverConfig) -> Result<Potentials> {
    cell.validate()?;
    Ok(solve_equilibrium_from(cell, &equilibrium_guess(cell), config)?.potentials)
}

/// Zero-bias solve of the potential-only system from `initial`.
///
/// Only `initial.phi` is used; the quasi-Fermi levels of the result are zero.
pub fn solve_equilibrium_from(
    cell: &Cell,
    initial: &Potentials,
    config: &SolverConfig,
) -> Result<Solved> {
    cell.validate()?;
    check_initial(cell, initial)?;

    let model = Equilibrium::new(cell, boundary(cell, 0.0));
    let result = NewtonSolver::new(*config).solve(&model, initial.phi.clone())?;
    log::info!(
        "equilibrium converged in {} iterations, |F| = {:.3e}",
        result.iterations,
        result.final_residual
    );
    Ok(Solved {
        potentials: Potentials::equilibrium(result.solution),
        iterations: result.iterations,
        final_residual: result.final_residual,
        residual_history: result.residual_history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::pn::pn::pn_problem_def;
    use approx::assert_relative_eq;

    #[test]
    fn guess_spans_the_contact_potentials() {
        let problem = pn_problem_def(30, 0.0, false).unwrap();
        let guess = equilibrium_guess(&problem.cell);
        let (phi0, phi_l) = boundary_eq(&problem.cell);
        assert_relative_eq!(guess.phi[0], phi0);
        assert_relative_eq!(guess.phi[29], phi_l, epsilon = 1e-12);
        assert!(guess.phi_n.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn mismatched_initial_guess_is_rejected() {
        let problem = pn_problem_def(30, 0.0, false).unwrap();
        let short = Potentials::equilibrium(DVector::zeros(10));
        let err =
            solve_equilibrium_from(&problem.cell, &short, &SolverConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidDeviceDescription(DeviceError::LengthMismatch {
                expected: 30,
                actual: 10,
                ..
            })
        ));
    }

    #[test]
    fn contact_rows_are_pinned() {
        let problem = pn_problem_def(40, 0.0, false).unwrap();
        let pot = solve_equilibrium(&problem.cell, &SolverConfig::default()).unwrap();
        let (phi0, phi_l) = boundary_eq(&problem.cell);
        assert_relative_eq!(pot.phi[0], phi0, epsilon = 1e-9);
        assert_relative_eq!(pot.phi[39], phi_l, epsilon = 1e-9);
    }
}
