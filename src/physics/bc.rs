//! Contact boundary conditions.
//!
//! The electrostatic potential is pinned at both contacts. Carrier densities
//! relax towards their equilibrium contact values through the surface
//! recombination velocities, see [`crate::physics::residual`].

use crate::models::cell::{Cell, NodeParams, Param};
use crate::physics::carriers::{electron_density, hole_density};
use nalgebra::DMatrix;
use num_dual::{Dual64, DualNum};

/// Number of scalars in a [`Boundary`].
pub const BOUNDARY_VALUES: usize = 6;

/// Dirichlet potentials and equilibrium carrier densities at both contacts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary<T = f64> {
    pub phi0: T,
    pub phi_l: T,
    pub neq0: T,
    pub neq_l: T,
    pub peq0: T,
    pub peq_l: T,
}

impl<T: Copy> Boundary<T> {
    /// Values in the fixed order `phi0, phiL, neq0, neqL, peq0, peqL`.
    pub fn values(&self) -> [T; BOUNDARY_VALUES] {
        [self.phi0, self.phi_l, self.neq0, self.neq_l, self.peq0, self.peq_l]
    }

    pub fn value_mut(&mut self, k: usize) -> &mut T {
        match k {
            0 => &mut self.phi0,
            1 => &mut self.phi_l,
            2 => &mut self.neq0,
            3 => &mut self.neq_l,
            4 => &mut self.peq0,
            _ => &mut self.peq_l,
        }
    }

    pub fn map<U>(self, f: impl Fn(T) -> U) -> Boundary<U> {
        Boundary {
            phi0: f(self.phi0),
            phi_l: f(self.phi_l),
            neq0: f(self.neq0),
            neq_l: f(self.neq_l),
            peq0: f(self.peq0),
            peq_l: f(self.peq_l),
        }
    }
}

/// Potential at which a node is locally charge neutral with flat quasi-Fermi levels.
pub fn neutral_potential<T: DualNum<f64> + Copy>(m: &NodeParams<T>) -> T {
    let root = (m.ndop * m.ndop + m.nc * m.nv * (-m.eg).exp() * 4.0).sqrt();
    if m.ndop.re() >= 0.0 {
        let x = (m.ndop + root) / (m.nc * 2.0);
        x.ln() - m.chi
    } else {
        let y = (-m.ndop + root) / (m.nv * 2.0);
        -m.chi - m.eg - y.ln()
    }
}

/// Contact potential: set by the metal work function when there is one,
/// by local neutrality otherwise.
pub fn contact_potential<T: DualNum<f64> + Copy>(
    m: &NodeParams<T>,
    work_function: Option<f64>,
) -> T {
    match work_function {
        Some(phi_m) => T::from(-phi_m),
        None => neutral_potential(m),
    }
}

/// Zero-bias boundary from the end-node parameters.
pub fn equilibrium_boundary<T: DualNum<f64> + Copy>(
    first: &NodeParams<T>,
    last: &NodeParams<T>,
    phi_m0: Option<f64>,
    phi_ml: Option<f64>,
) -> Boundary<T> {
    let zero = T::zero();
    let phi0 = contact_potential(first, phi_m0);
    let phi_l = contact_potential(last, phi_ml);
    Boundary {
        phi0,
        phi_l,
        neq0: electron_density(first, phi0, zero),
        neq_l: electron_density(last, phi_l, zero),
        peq0: hole_density(first, phi0, zero),
        peq_l: hole_density(last, phi_l, zero),
    }
}

/// Built-in contact potentials `(phi0, phiL)` at equilibrium.
pub fn boundary_eq(cell: &Cell) -> (f64, f64) {
    let b = equilibrium_boundary(
        &cell.node(0),
        &cell.node(cell.len() - 1),
        cell.phi_m0,
        cell.phi_ml,
    );
    (b.phi0, b.phi_l)
}

/// Boundary at applied bias `v`, added to the right contact.
///
/// The contact densities stay at their equilibrium values.
pub fn boundary(cell: &Cell, v: f64) -> Boundary {
    let mut b = equilibrium_boundary(
        &cell.node(0),
        &cell.node(cell.len() - 1),
        cell.phi_m0,
        cell.phi_ml,
    );
    b.phi_l += v;
    b
}

/// Derivative of the equilibrium boundary with respect to `param`.
///
/// Rows follow [`Boundary::values`]. Per-node parameters have one column per
/// node, only the two end nodes contribute. The contact velocities do not enter
/// the boundary and give a single zero column.
pub fn boundary_derivatives(cell: &Cell, param: Param) -> DMatrix<f64> {
    let n = cell.len();
    if param.is_scalar() {
        return DMatrix::zeros(BOUNDARY_VALUES, 1);
    }
    let mut d = DMatrix::zeros(BOUNDARY_VALUES, n);
    for (column, seed_first) in [(0, true), (n - 1, false)] {
        let mut first: NodeParams<Dual64> = cell.node(0).lift();
        let mut last: NodeParams<Dual64> = cell.node(n - 1).lift();
        let seeded = if seed_first { &mut first } else { &mut last };
        if let Some(field) = seeded.field_mut(param) {
            field.eps = 1.0;
        }
        let b = equilibrium_boundary(&first, &last, cell.phi_m0, cell.phi_ml);
        for (row, value) in b.values().iter().enumerate() {
            d[(row, column)] = value.eps;
        }
    }
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::carriers::intrinsic_density;
    use approx::assert_relative_eq;

    fn node(ndop: f64) -> NodeParams<f64> {
        NodeParams {
            eps: 11.7,
            chi: 156.7,
            eg: 43.3,
            nc: 3.2,
            nv: 1.8,
            mn: 1400.0,
            mp: 450.0,
            tn: 1e5,
            tp: 1e5,
            et: 0.0,
            br: 0.0,
            cn: 0.0,
            cp: 0.0,
            ndop,
            g: 0.0,
        }
    }

    #[test]
    fn neutral_potential_balances_charge() {
        for ndop in [0.1, -0.01, 0.0] {
            let m = node(ndop);
            let phi = neutral_potential(&m);
            let n = electron_density(&m, phi, 0.0);
            let p = hole_density(&m, phi, 0.0);
            assert!((p - n + ndop).abs() < 1e-12 * ndop.abs().max(intrinsic_density(&m)));
        }
    }

    #[test]
    fn work_function_overrides_neutrality() {
        let m = node(0.1);
        assert_eq!(contact_potential(&m, Some(170.0)), -170.0);
        assert_relative_eq!(contact_potential(&m, None), neutral_potential(&m));
    }

    #[test]
    fn bias_moves_only_the_right_potential() {
        let (first, last) = (node(0.1), node(-0.01));
        let eq = equilibrium_boundary(&first, &last, None, None);
        let mut shifted = eq;
        shifted.phi_l += 3.0;
        assert!(eq.phi0 > eq.phi_l);
        assert_eq!(shifted.neq0, eq.neq0);
        assert_eq!(shifted.values()[1], eq.phi_l + 3.0);
    }

    #[test]
    fn dual_derivative_matches_closed_form() {
        // d/dNdop of ln(x) for an n-type contact
        let m = node(0.1);
        let mut seeded: NodeParams<Dual64> = m.lift();
        seeded.ndop.eps = 1.0;
        let d = neutral_potential(&seeded).eps;
        let h = 1e-7;
        let fd =
            (neutral_potential(&node(0.1 + h)) - neutral_potential(&node(0.1 - h))) / (2.0 * h);
        assert_relative_eq!(d, fd, max_relative = 1e-6);
    }
}
