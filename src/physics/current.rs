use crate::models::cell::{Cell, NodeParams, Param};
use crate::physics::flux::{electron_current, hole_current};
use crate::physics::potentials::{Potentials, VARS};
use nalgebra::DVector;
use num_dual::{Dual64, DualNum};

fn face_current<T: DualNum<f64> + Copy>(
    ml: &NodeParams<T>,
    mr: &NodeParams<T>,
    left: &[T; VARS],
    right: &[T; VARS],
    h: f64,
) -> T {
    electron_current(ml, mr, left, right, h) + hole_current(ml, mr, left, right, h)
}

fn node_vars(x: &DVector<f64>, i: usize) -> [f64; VARS] {
    [x[VARS * i], x[VARS * i + 1], x[VARS * i + 2]]
}

/// Total current through face 0, positive left to right.
pub fn total_current(cell: &Cell, pot: &Potentials) -> f64 {
    total_current_interleaved(cell, &pot.to_interleaved())
}

pub fn total_current_interleaved(cell: &Cell, x: &DVector<f64>) -> f64 {
    face_current(
        &cell.node(0),
        &cell.node(1),
        &node_vars(x, 0),
        &node_vars(x, 1),
        cell.grid.spacing[0],
    )
}

/// Total current through every face. Uniform at convergence.
pub fn face_currents(cell: &Cell, pot: &Potentials) -> Vec<f64> {
    let x = pot.to_interleaved();
    (0..cell.grid.num_faces())
        .map(|k| {
            face_current(
                &cell.node(k),
                &cell.node(k + 1),
                &node_vars(&x, k),
                &node_vars(&x, k + 1),
                cell.grid.spacing[k],
            )
        })
        .collect()
}

/// Gradient of [`total_current`] with respect to the interleaved state.
/// Only the first two nodes contribute.
pub fn current_state_gradient(cell: &Cell, x: &DVector<f64>) -> DVector<f64> {
    let (m0, m1) = (cell.node(0).lift::<Dual64>(), cell.node(1).lift::<Dual64>());
    let base = [node_vars(x, 0).map(Dual64::from_re), node_vars(x, 1).map(Dual64::from_re)];
    let mut g = DVector::zeros(x.len());
    for node in 0..2 {
        for v in 0..VARS {
            let mut vars = base;
            vars[node][v].eps = 1.0;
            g[VARS * node + v] =
                face_current(&m0, &m1, &vars[0], &vars[1], cell.grid.spacing[0]).eps;
        }
    }
    g
}

/// Direct dependence of [`total_current`] on `param`, state held fixed.
///
/// One entry per node for per-node parameters, a single zero for the contact
/// velocities.
pub fn current_parameter_gradient(cell: &Cell, x: &DVector<f64>, param: Param) -> DVector<f64> {
    if param.is_scalar() {
        return DVector::zeros(1);
    }
    let left = node_vars(x, 0).map(Dual64::from_re);
    let right = node_vars(x, 1).map(Dual64::from_re);
    let mut g = DVector::zeros(cell.len());
    for node in 0..2 {
        let mut params = [cell.node(0).lift::<Dual64>(), cell.node(1).lift::<Dual64>()];
        if let Some(field) = params[node].field_mut(param) {
            field.eps = 1.0;
        }
        g[node] = face_current(&params[0], &params[1], &left, &right, cell.grid.spacing[0]).eps;
    }
    g
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pn::pn::pn_problem_def;
    use crate::physics::bc::boundary_eq;
    use approx::assert_relative_eq;

    fn sample_state(cell: &Cell) -> DVector<f64> {
        let n = cell.len();
        let (phi0, phi_l) = boundary_eq(cell);
        let mut pot = Potentials::equilibrium(DVector::from_fn(n, |i, _| {
            phi0 + (phi_l - phi0) * i as f64 / (n - 1) as f64
        }));
        pot.phi_n[1] = 1e-3;
        pot.phi_p[1] = -2e-3;
        pot.to_interleaved()
    }

    #[test]
    fn state_gradient_matches_finite_differences() {
        let problem = pn_problem_def(20, 0.0, false).unwrap();
        let cell = &problem.cell;
        let x = sample_state(cell);
        let g = current_state_gradient(cell, &x);
        for r in 0..2 * VARS {
            let h = 1e-6;
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[r] += h;
            xm[r] -= h;
            let fd = (total_current_interleaved(cell, &xp) - total_current_interleaved(cell, &xm))
                / (2.0 * h);
            assert_relative_eq!(g[r], fd, epsilon = 1e-8 * g.amax(), max_relative = 1e-5);
        }
        assert!(g.rows(2 * VARS, x.len() - 2 * VARS).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn mobility_gradient_is_linear_in_the_current() {
        // Both currents scale with the face mobility mean
        let problem = pn_problem_def(20, 0.0, false).unwrap();
        let cell = &problem.cell;
        let x = sample_state(cell);
        let g = current_parameter_gradient(cell, &x, Param::Mn);
        let jn = electron_current(
            &cell.node(0),
            &cell.node(1),
            &node_vars(&x, 0),
            &node_vars(&x, 1),
            cell.grid.spacing[0],
        );
        let mu = 0.5 * (cell.mn[0] + cell.mn[1]);
        assert_relative_eq!(g[0], 0.5 * jn / mu, max_relative = 1e-10);
        assert_relative_eq!(g[1], 0.5 * jn / mu, max_relative = 1e-10);
    }
}
