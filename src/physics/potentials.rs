use crate::models::cell::Cell;
use crate::physics::carriers::{electron_density, hole_density};
use nalgebra::DVector;

/// Unknowns per node of the full drift-diffusion system.
pub const VARS: usize = 3;

/// Solver state: electrostatic potential and the two quasi-Fermi potentials.
///
/// The Newton solver works on the interleaved vector `[phi, phi_n, phi_p]`
/// per node; this struct is the user-facing view.
#[derive(Debug, Clone, PartialEq)]
pub struct Potentials {
    pub phi: DVector<f64>,
    pub phi_n: DVector<f64>,
    pub phi_p: DVector<f64>,
}

impl Potentials {
    /// Flat quasi-Fermi levels around a given electrostatic potential.
    pub fn equilibrium(phi: DVector<f64>) -> Self {
        let n = phi.len();
        Self {
            phi,
            phi_n: DVector::zeros(n),
            phi_p: DVector::zeros(n),
        }
    }

    pub fn len(&self) -> usize {
        self.phi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phi.is_empty()
    }

    pub fn to_interleaved(&self) -> DVector<f64> {
        let n = self.len();
        DVector::from_fn(VARS * n, |r, _| match r % VARS {
            0 => self.phi[r / VARS],
            1 => self.phi_n[r / VARS],
            _ => self.phi_p[r / VARS],
        })
    }

    pub fn from_interleaved(x: &DVector<f64>) -> Self {
        let n = x.len() / VARS;
        Self {
            phi: DVector::from_fn(n, |i, _| x[VARS * i]),
            phi_n: DVector::from_fn(n, |i, _| x[VARS * i + 1]),
            phi_p: DVector::from_fn(n, |i, _| x[VARS * i + 2]),
        }
    }

    pub fn electron_density(&self, cell: &Cell) -> Vec<f64> {
        (0..self.len())
            .map(|i| electron_density(&cell.node(i), self.phi[i], self.phi_n[i]))
            .collect()
    }

    pub fn hole_density(&self, cell: &Cell) -> Vec<f64> {
        (0..self.len())
            .map(|i| hole_density(&cell.node(i), self.phi[i], self.phi_p[i]))
            .collect()
    }

    /// Conduction band edge `-Chi - phi`.
    pub fn conduction_band(&self, cell: &Cell) -> Vec<f64> {
        (0..self.len()).map(|i| -cell.chi[i] - self.phi[i]).collect()
    }

    /// Valence band edge `-Chi - Eg - phi`.
    pub fn valence_band(&self, cell: &Cell) -> Vec<f64> {
        (0..self.len())
            .map(|i| -cell.chi[i] - cell.eg[i] - self.phi[i])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaving_keeps_node_order() {
        let pot = Potentials {
            phi: DVector::from_vec(vec![1.0, 2.0]),
            phi_n: DVector::from_vec(vec![3.0, 4.0]),
            phi_p: DVector::from_vec(vec![5.0, 6.0]),
        };
        let x = pot.to_interleaved();
        assert_eq!(x.as_slice(), &[1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);
        assert_eq!(Potentials::from_interleaved(&x), pot);
    }
}
