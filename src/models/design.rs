use super::cell::Cell;
use super::material::Material;
use crate::discretization::mesh::Grid;
use crate::error::DeviceError;
use crate::scales::{Quantity, Scales};

/// Device description in physical units, painted region by region.
///
/// Every builder returns a modified copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    pub grid: Vec<f64>, // [cm]
    pub materials: Vec<Material>,
    pub ndop: Vec<f64>,       // [cm^-3]
    pub generation: Vec<f64>, // [cm^-3 s^-1]
    pub snl: f64,             // [cm/s]
    pub snr: f64,
    pub spl: f64,
    pub spr: f64,
    pub phi_m0: Option<f64>, // [eV]
    pub phi_ml: Option<f64>,
}

impl Design {
    pub fn new(grid: Vec<f64>) -> Self {
        let n = grid.len();
        Self {
            grid,
            materials: vec![Material::default(); n],
            ndop: vec![0.0; n],
            generation: vec![0.0; n],
            snl: 0.0,
            snr: 0.0,
            spl: 0.0,
            spr: 0.0,
            phi_m0: None,
            phi_ml: None,
        }
    }

    pub fn add_material(&self, material: &Material, region: impl Fn(f64) -> bool) -> Self {
        let mut design = self.clone();
        for (slot, &x) in design.materials.iter_mut().zip(&self.grid) {
            if region(x) {
                *slot = *material;
            }
        }
        design
    }

    /// Sets the net doping (positive donors, negative acceptors) inside `region`.
    pub fn doping(&self, density: f64, region: impl Fn(f64) -> bool) -> Self {
        let mut design = self.clone();
        for (slot, &x) in design.ndop.iter_mut().zip(&self.grid) {
            if region(x) {
                *slot = density;
            }
        }
        design
    }

    /// Donors `n_left` left of the junction at `x`, `n_right` on and after it.
    pub fn single_pn_junction(&self, n_left: f64, n_right: f64, x: f64) -> Self {
        self.doping(n_left, |p| p < x).doping(n_right, |p| p >= x)
    }

    pub fn contacts(&self, snl: f64, snr: f64, spl: f64, spr: f64) -> Self {
        Self {
            snl,
            snr,
            spl,
            spr,
            ..self.clone()
        }
    }

    pub fn work_functions(&self, phi_m0: Option<f64>, phi_ml: Option<f64>) -> Self {
        Self {
            phi_m0,
            phi_ml,
            ..self.clone()
        }
    }

    pub fn generation(&self, generation: Vec<f64>) -> Self {
        Self {
            generation,
            ..self.clone()
        }
    }

    pub fn uniform_generation(&self, rate: f64) -> Self {
        self.generation(vec![rate; self.grid.len()])
    }

    /// Normalizes the design into a solver-ready [`Cell`].
    pub fn to_cell(&self, scales: &Scales) -> Result<Cell, DeviceError> {
        let n = self.grid.len();
        for (field, len) in [("generation", self.generation.len()), ("Ndop", self.ndop.len())] {
            if len != n {
                return Err(DeviceError::LengthMismatch {
                    field,
                    expected: n,
                    actual: len,
                });
            }
        }

        let x0 = self.grid.first().copied().unwrap_or(0.0);
        let nodes = self
            .grid
            .iter()
            .map(|&x| scales.normalize(x - x0, Quantity::Length))
            .collect();
        let grid = Grid::new(nodes)?;

        let per_node = |f: fn(&Material) -> f64, q: Quantity| -> Vec<f64> {
            self.materials.iter().map(|m| scales.normalize(f(m), q)).collect()
        };
        let velocity = |s: f64| scales.normalize(s, Quantity::Velocity);
        let energy = |e: Option<f64>| e.map(|e| scales.normalize(e, Quantity::Energy));

        let cell = Cell {
            grid,
            eps: per_node(|m| m.eps, Quantity::Permittivity),
            chi: per_node(|m| m.chi, Quantity::Energy),
            eg: per_node(|m| m.eg, Quantity::Energy),
            nc: per_node(|m| m.nc, Quantity::Density),
            nv: per_node(|m| m.nv, Quantity::Density),
            mn: per_node(|m| m.mn, Quantity::Mobility),
            mp: per_node(|m| m.mp, Quantity::Mobility),
            tn: per_node(|m| m.tn, Quantity::Time),
            tp: per_node(|m| m.tp, Quantity::Time),
            et: per_node(|m| m.et, Quantity::Energy),
            br: per_node(|m| m.br, Quantity::Radiative),
            cn: per_node(|m| m.cn, Quantity::Auger),
            cp: per_node(|m| m.cp, Quantity::Auger),
            ndop: self.ndop.iter().map(|&d| scales.normalize(d, Quantity::Density)).collect(),
            g: self.generation.iter().map(|&g| scales.normalize(g, Quantity::Rate)).collect(),
            snl: velocity(self.snl),
            snr: velocity(self.snr),
            spl: velocity(self.spl),
            spr: velocity(self.spr),
            phi_m0: energy(self.phi_m0),
            phi_ml: energy(self.phi_ml),
        };
        cell.validate()?;
        Ok(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::uniform;
    use approx::assert_relative_eq;

    #[test]
    fn junction_paints_both_sides() {
        let design = Design::new(uniform(1e-4, 11)).single_pn_junction(1e18, -1e17, 0.5e-4);
        assert_eq!(design.ndop[0], 1e18);
        assert_eq!(design.ndop[4], 1e18);
        assert_eq!(design.ndop[10], -1e17);
    }

    #[test]
    fn cell_is_normalized() {
        let scales = Scales::default();
        let si = Material::default().with_permittivity(11.7).with_bands(4.05, 1.12);
        let cell = Design::new(uniform(1e-4, 5))
            .add_material(&si, |_| true)
            .contacts(1e7, 0.0, 0.0, 1e7)
            .to_cell(&scales)
            .unwrap();
        assert_relative_eq!(cell.eps[2], 11.7);
        assert_relative_eq!(cell.eg[0], 1.12 / scales.energy, max_relative = 1e-12);
        assert_relative_eq!(cell.snl, 1e7 / scales.velocity, max_relative = 1e-12);
        assert_relative_eq!(cell.grid.length(), 1e-4 / scales.length, max_relative = 1e-12);
        assert_eq!(cell.snr, 0.0);
    }
}
