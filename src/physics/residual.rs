//! Discretized drift-diffusion equations.
//!
//! Every node contributes three equations evaluated on the stencil
//! `[i - 1, i, i + 1]`:
//!
//! * contacts: pinned potential, and carrier currents balanced by surface
//!   recombination towards the equilibrium contact densities,
//! * interior: box-integrated Poisson and continuity equations with
//!   Scharfetter-Gummel face currents.
//!
//! The kernels are generic over the number type. Jacobian blocks, parameter
//! partials and boundary partials all come from seeding a single [`Dual64`]
//! direction into the same kernel.

use super::PhysicsModel;
use crate::discretization::mesh::Grid;
use crate::models::cell::{Cell, NodeParams, Param};
use crate::numerics::block::BlockTridiagonal;
use crate::physics::bc::{Boundary, BOUNDARY_VALUES};
use crate::physics::carriers::{electron_density, hole_density, recombination};
use crate::physics::flux::{electron_current, hole_current};
use crate::physics::potentials::VARS;
use nalgebra::{DMatrix, DVector};
use num_dual::{Dual64, DualNum};

/// Boundary values together with the contact recombination velocities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contacts<T> {
    pub bound: Boundary<T>,
    pub snl: T,
    pub snr: T,
    pub spl: T,
    pub spr: T,
}

impl Contacts<f64> {
    pub fn new(cell: &Cell, bound: Boundary) -> Self {
        Self {
            bound,
            snl: cell.snl,
            snr: cell.snr,
            spl: cell.spl,
            spr: cell.spr,
        }
    }

    pub fn lift(&self) -> Contacts<Dual64> {
        Contacts {
            bound: self.bound.map(Dual64::from_re),
            snl: Dual64::from_re(self.snl),
            snr: Dual64::from_re(self.snr),
            spl: Dual64::from_re(self.spl),
            spr: Dual64::from_re(self.spr),
        }
    }
}

impl Contacts<Dual64> {
    fn velocity_mut(&mut self, param: Param) -> Option<&mut Dual64> {
        match param {
            Param::Snl => Some(&mut self.snl),
            Param::Snr => Some(&mut self.snr),
            Param::Spl => Some(&mut self.spl),
            Param::Spr => Some(&mut self.spr),
            _ => None,
        }
    }
}

/// Unknowns and parameters of nodes `i - 1`, `i` and `i + 1`.
///
/// At the two contacts the missing neighbour repeats the centre node and is
/// never read.
#[derive(Debug, Clone, Copy)]
pub struct Stencil<T, const M: usize> {
    pub vars: [[T; M]; 3],
    pub params: [NodeParams<T>; 3],
}

impl<const M: usize> Stencil<f64, M> {
    pub fn lift(&self) -> Stencil<Dual64, M> {
        Stencil {
            vars: self.vars.map(|v| v.map(Dual64::from_re)),
            params: self.params.map(|p| p.lift()),
        }
    }
}

/// Node indices of the stencil around `i`, clamped to the grid.
pub fn neighbours(i: usize, n: usize) -> [usize; 3] {
    [i.saturating_sub(1), i, (i + 1).min(n - 1)]
}

/// Whether stencil slot `k` of node `i` is a real neighbour.
fn is_neighbour(i: usize, k: usize, n: usize) -> bool {
    match k {
        0 => i > 0,
        2 => i + 1 < n,
        _ => true,
    }
}

fn poisson<T: DualNum<f64> + Copy>(
    grid: &Grid,
    i: usize,
    phi: [T; 3],
    params: &[NodeParams<T>; 3],
    n: T,
    p: T,
) -> T {
    let (hl, hr) = (grid.spacing[i - 1], grid.spacing[i]);
    let eps_l = (params[0].eps + params[1].eps) * 0.5;
    let eps_r = (params[1].eps + params[2].eps) * 0.5;
    let div = (eps_r * (phi[2] - phi[1]) / hr - eps_l * (phi[1] - phi[0]) / hl)
        / grid.control_width(i);
    div + p - n + params[1].ndop
}

/// The three residuals of node `i`: Poisson, electron and hole continuity.
pub fn node_residual<T: DualNum<f64> + Copy>(
    grid: &Grid,
    i: usize,
    s: &Stencil<T, VARS>,
    c: &Contacts<T>,
) -> [T; VARS] {
    let last = grid.len() - 1;
    let [ml, mc, mr] = &s.params;
    let [vl, vc, vr] = &s.vars;
    let n = electron_density(mc, vc[0], vc[1]);
    let p = hole_density(mc, vc[0], vc[2]);

    if i == 0 {
        let h = grid.spacing[0];
        let jn = electron_current(mc, mr, vc, vr, h);
        let jp = hole_current(mc, mr, vc, vr, h);
        [
            vc[0] - c.bound.phi0,
            jn - c.snl * (n - c.bound.neq0),
            jp + c.spl * (p - c.bound.peq0),
        ]
    } else if i == last {
        let h = grid.spacing[last - 1];
        let jn = electron_current(ml, mc, vl, vc, h);
        let jp = hole_current(ml, mc, vl, vc, h);
        [
            vc[0] - c.bound.phi_l,
            jn + c.snr * (n - c.bound.neq_l),
            jp - c.spr * (p - c.bound.peq_l),
        ]
    } else {
        let (hl, hr) = (grid.spacing[i - 1], grid.spacing[i]);
        let w = grid.control_width(i);
        let jn_l = electron_current(ml, mc, vl, vc, hl);
        let jn_r = electron_current(mc, mr, vc, vr, hr);
        let jp_l = hole_current(ml, mc, vl, vc, hl);
        let jp_r = hole_current(mc, mr, vc, vr, hr);
        let net = recombination(mc, n, p) - mc.g;
        [
            poisson(grid, i, [vl[0], vc[0], vr[0]], &s.params, n, p),
            (jn_r - jn_l) / w - net,
            (jp_r - jp_l) / w + net,
        ]
    }
}

/// Residual of node `i` in the potential-only equilibrium problem.
pub fn equilibrium_residual<T: DualNum<f64> + Copy>(
    grid: &Grid,
    i: usize,
    s: &Stencil<T, 1>,
    bound: &Boundary<T>,
) -> T {
    let phi = [s.vars[0][0], s.vars[1][0], s.vars[2][0]];
    if i == 0 {
        phi[1] - bound.phi0
    } else if i == grid.len() - 1 {
        phi[1] - bound.phi_l
    } else {
        let zero = T::zero();
        let n = electron_density(&s.params[1], phi[1], zero);
        let p = hole_density(&s.params[1], phi[1], zero);
        poisson(grid, i, phi, &s.params, n, p)
    }
}

/// Full three-unknown drift-diffusion model at a fixed boundary.
pub struct DriftDiffusion<'a> {
    pub cell: &'a Cell,
    pub contacts: Contacts<f64>,
}

impl<'a> DriftDiffusion<'a> {
    pub fn new(cell: &'a Cell, bound: Boundary) -> Self {
        Self {
            cell,
            contacts: Contacts::new(cell, bound),
        }
    }

    pub fn stencil(&self, x: &DVector<f64>, i: usize) -> Stencil<f64, VARS> {
        let nodes = neighbours(i, self.cell.len());
        Stencil {
            vars: nodes.map(|j| [x[VARS * j], x[VARS * j + 1], x[VARS * j + 2]]),
            params: nodes.map(|j| self.cell.node(j)),
        }
    }

    /// Partial derivative of the residual with respect to `param`, holding the
    /// state and the boundary fixed. One column per node for per-node
    /// parameters, a single column for the contact velocities.
    pub fn parameter_partials(&self, x: &DVector<f64>, param: Param) -> DMatrix<f64> {
        let n = self.cell.len();
        let grid = &self.cell.grid;
        if param.is_scalar() {
            let mut d = DMatrix::zeros(VARS * n, 1);
            let mut c = self.contacts.lift();
            if let Some(v) = c.velocity_mut(param) {
                v.eps = 1.0;
            }
            for i in [0, n - 1] {
                let r = node_residual(grid, i, &self.stencil(x, i).lift(), &c);
                for (a, value) in r.iter().enumerate() {
                    d[(VARS * i + a, 0)] = value.eps;
                }
            }
            return d;
        }

        let mut d = DMatrix::zeros(VARS * n, n);
        let c = self.contacts.lift();
        for i in 0..n {
            let base = self.stencil(x, i).lift();
            for (k, &j) in neighbours(i, n).iter().enumerate() {
                if !is_neighbour(i, k, n) {
                    continue;
                }
                let mut s = base;
                if let Some(field) = s.params[k].field_mut(param) {
                    field.eps = 1.0;
                }
                let r = node_residual(grid, i, &s, &c);
                for (a, value) in r.iter().enumerate() {
                    d[(VARS * i + a, j)] = value.eps;
                }
            }
        }
        d
    }

    /// Partial derivative of the residual with respect to the six boundary
    /// values, in [`Boundary::values`] order.
    pub fn boundary_partials(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let n = self.cell.len();
        let mut d = DMatrix::zeros(VARS * n, BOUNDARY_VALUES);
        for col in 0..BOUNDARY_VALUES {
            let mut c = self.contacts.lift();
            c.bound.value_mut(col).eps = 1.0;
            for i in [0, n - 1] {
                let r = node_residual(&self.cell.grid, i, &self.stencil(x, i).lift(), &c);
                for (a, value) in r.iter().enumerate() {
                    d[(VARS * i + a, col)] = value.eps;
                }
            }
        }
        d
    }
}

impl PhysicsModel for DriftDiffusion<'_> {
    fn num_variables(&self) -> usize {
        VARS
    }

    fn num_nodes(&self) -> usize {
        self.cell.len()
    }

    fn residual(&self, x: &DVector<f64>) -> DVector<f64> {
        let n = self.cell.len();
        let mut f = DVector::zeros(VARS * n);
        for i in 0..n {
            let r = node_residual(&self.cell.grid, i, &self.stencil(x, i), &self.contacts);
            for (a, value) in r.into_iter().enumerate() {
                f[VARS * i + a] = value;
            }
        }
        f
    }

    fn jacobian(&self, x: &DVector<f64>) -> BlockTridiagonal {
        let n = self.cell.len();
        let mut jac = BlockTridiagonal::zeros(n, VARS);
        let c = self.contacts.lift();
        for i in 0..n {
            let base = self.stencil(x, i).lift();
            for (k, &j) in neighbours(i, n).iter().enumerate() {
                if !is_neighbour(i, k, n) {
                    continue;
                }
                for v in 0..VARS {
                    let mut s = base;
                    s.vars[k][v].eps = 1.0;
                    let r = node_residual(&self.cell.grid, i, &s, &c);
                    let block = jac.block_mut(i, j);
                    for (a, value) in r.iter().enumerate() {
                        block[(a, v)] = value.eps;
                    }
                }
            }
        }
        jac
    }
}

/// Potential-only model with flat quasi-Fermi levels.
pub struct Equilibrium<'a> {
    pub cell: &'a Cell,
    pub bound: Boundary,
}

impl<'a> Equilibrium<'a> {
    pub fn new(cell: &'a Cell, bound: Boundary) -> Self {
        Self { cell, bound }
    }

    pub fn stencil(&self, phi: &DVector<f64>, i: usize) -> Stencil<f64, 1> {
        let nodes = neighbours(i, self.cell.len());
        Stencil {
            vars: nodes.map(|j| [phi[j]]),
            params: nodes.map(|j| self.cell.node(j)),
        }
    }

    /// Same layout as [`DriftDiffusion::parameter_partials`] with one row per node.
    pub fn parameter_partials(&self, phi: &DVector<f64>, param: Param) -> DMatrix<f64> {
        let n = self.cell.len();
        if param.is_scalar() {
            return DMatrix::zeros(n, 1);
        }
        let bound = self.bound.map(Dual64::from_re);
        let mut d = DMatrix::zeros(n, n);
        for i in 1..n - 1 {
            let base = self.stencil(phi, i).lift();
            for (k, &j) in neighbours(i, n).iter().enumerate() {
                let mut s = base;
                if let Some(field) = s.params[k].field_mut(param) {
                    field.eps = 1.0;
                }
                d[(i, j)] = equilibrium_residual(&self.cell.grid, i, &s, &bound).eps;
            }
        }
        d
    }

    /// Partial derivative with respect to `(phi0, phiL)`. The Dirichlet rows
    /// are linear, so this is `-1` on the two contact rows.
    pub fn boundary_partials(&self) -> DMatrix<f64> {
        let n = self.cell.len();
        let mut d = DMatrix::zeros(n, 2);
        d[(0, 0)] = -1.0;
        d[(n - 1, 1)] = -1.0;
        d
    }
}

impl PhysicsModel for Equilibrium<'_> {
    fn num_variables(&self) -> usize {
        1
    }

    fn num_nodes(&self) -> usize {
        self.cell.len()
    }

    fn residual(&self, phi: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(self.cell.len(), |i, _| {
            equilibrium_residual(&self.cell.grid, i, &self.stencil(phi, i), &self.bound)
        })
    }

    fn jacobian(&self, phi: &DVector<f64>) -> BlockTridiagonal {
        let n = self.cell.len();
        let mut jac = BlockTridiagonal::zeros(n, 1);
        let bound = self.bound.map(Dual64::from_re);
        for i in 0..n {
            let base = self.stencil(phi, i).lift();
            for (k, &j) in neighbours(i, n).iter().enumerate() {
                if !is_neighbour(i, k, n) {
                    continue;
                }
                let mut s = base;
                s.vars[k][0].eps = 1.0;
                jac.block_mut(i, j)[(0, 0)] =
                    equilibrium_residual(&self.cell.grid, i, &s, &bound).eps;
            }
        }
        jac
    }
}
