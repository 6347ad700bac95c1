use crate::discretization::mesh::Grid;
use crate::error::DeviceError;
use num_dual::DualNum;
use std::fmt;

/// Every input the solver can be differentiated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Param {
    Eps,
    Chi,
    Eg,
    Nc,
    Nv,
    Mn,
    Mp,
    Tn,
    Tp,
    Et,
    Br,
    Cn,
    Cp,
    Ndop,
    G,
    Snl,
    Snr,
    Spl,
    Spr,
}

impl Param {
    pub const PER_NODE: [Param; 15] = [
        Param::Eps,
        Param::Chi,
        Param::Eg,
        Param::Nc,
        Param::Nv,
        Param::Mn,
        Param::Mp,
        Param::Tn,
        Param::Tp,
        Param::Et,
        Param::Br,
        Param::Cn,
        Param::Cp,
        Param::Ndop,
        Param::G,
    ];

    pub const SCALAR: [Param; 4] = [Param::Snl, Param::Snr, Param::Spl, Param::Spr];

    pub fn all() -> Vec<Param> {
        Self::PER_NODE.iter().chain(Self::SCALAR.iter()).copied().collect()
    }

    pub fn is_scalar(self) -> bool {
        matches!(self, Param::Snl | Param::Snr | Param::Spl | Param::Spr)
    }

    pub fn name(self) -> &'static str {
        match self {
            Param::Eps => "eps",
            Param::Chi => "Chi",
            Param::Eg => "Eg",
            Param::Nc => "Nc",
            Param::Nv => "Nv",
            Param::Mn => "mn",
            Param::Mp => "mp",
            Param::Tn => "tn",
            Param::Tp => "tp",
            Param::Et => "Et",
            Param::Br => "Br",
            Param::Cn => "Cn",
            Param::Cp => "Cp",
            Param::Ndop => "Ndop",
            Param::G => "G",
            Param::Snl => "Snl",
            Param::Snr => "Snr",
            Param::Spl => "Spl",
            Param::Spr => "Spr",
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Material and source parameters of one grid node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeParams<T> {
    pub eps: T,
    pub chi: T,
    pub eg: T,
    pub nc: T,
    pub nv: T,
    pub mn: T,
    pub mp: T,
    pub tn: T,
    pub tp: T,
    pub et: T,
    pub br: T,
    pub cn: T,
    pub cp: T,
    pub ndop: T,
    pub g: T,
}

impl<T> NodeParams<T> {
    /// Field holding `param`, `None` for the contact velocities.
    pub fn field_mut(&mut self, param: Param) -> Option<&mut T> {
        match param {
            Param::Eps => Some(&mut self.eps),
            Param::Chi => Some(&mut self.chi),
            Param::Eg => Some(&mut self.eg),
            Param::Nc => Some(&mut self.nc),
            Param::Nv => Some(&mut self.nv),
            Param::Mn => Some(&mut self.mn),
            Param::Mp => Some(&mut self.mp),
            Param::Tn => Some(&mut self.tn),
            Param::Tp => Some(&mut self.tp),
            Param::Et => Some(&mut self.et),
            Param::Br => Some(&mut self.br),
            Param::Cn => Some(&mut self.cn),
            Param::Cp => Some(&mut self.cp),
            Param::Ndop => Some(&mut self.ndop),
            Param::G => Some(&mut self.g),
            Param::Snl | Param::Snr | Param::Spl | Param::Spr => None,
        }
    }

    pub fn map<U>(self, f: impl Fn(T) -> U) -> NodeParams<U> {
        NodeParams {
            eps: f(self.eps),
            chi: f(self.chi),
            eg: f(self.eg),
            nc: f(self.nc),
            nv: f(self.nv),
            mn: f(self.mn),
            mp: f(self.mp),
            tn: f(self.tn),
            tp: f(self.tp),
            et: f(self.et),
            br: f(self.br),
            cn: f(self.cn),
            cp: f(self.cp),
            ndop: f(self.ndop),
            g: f(self.g),
        }
    }
}

impl NodeParams<f64> {
    pub fn lift<T: DualNum<f64> + Copy>(self) -> NodeParams<T> {
        self.map(T::from)
    }
}

/// A fully assembled, normalized device.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub grid: Grid,
    pub eps: Vec<f64>,
    pub chi: Vec<f64>,
    pub eg: Vec<f64>,
    pub nc: Vec<f64>,
    pub nv: Vec<f64>,
    pub mn: Vec<f64>,
    pub mp: Vec<f64>,
    pub tn: Vec<f64>,
    pub tp: Vec<f64>,
    pub et: Vec<f64>,
    pub br: Vec<f64>,
    pub cn: Vec<f64>,
    pub cp: Vec<f64>,
    pub ndop: Vec<f64>,
    pub g: Vec<f64>,
    pub snl: f64,
    pub snr: f64,
    pub spl: f64,
    pub spr: f64,
    /// Work function of the left contact. `None` means an ohmic, neutral contact.
    pub phi_m0: Option<f64>,
    pub phi_ml: Option<f64>,
}

impl Cell {
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn node(&self, i: usize) -> NodeParams<f64> {
        NodeParams {
            eps: self.eps[i],
            chi: self.chi[i],
            eg: self.eg[i],
            nc: self.nc[i],
            nv: self.nv[i],
            mn: self.mn[i],
            mp: self.mp[i],
            tn: self.tn[i],
            tp: self.tp[i],
            et: self.et[i],
            br: self.br[i],
            cn: self.cn[i],
            cp: self.cp[i],
            ndop: self.ndop[i],
            g: self.g[i],
        }
    }

    pub fn array(&self, param: Param) -> Option<&[f64]> {
        let values = match param {
            Param::Eps => &self.eps,
            Param::Chi => &self.chi,
            Param::Eg => &self.eg,
            Param::Nc => &self.nc,
            Param::Nv => &self.nv,
            Param::Mn => &self.mn,
            Param::Mp => &self.mp,
            Param::Tn => &self.tn,
            Param::Tp => &self.tp,
            Param::Et => &self.et,
            Param::Br => &self.br,
            Param::Cn => &self.cn,
            Param::Cp => &self.cp,
            Param::Ndop => &self.ndop,
            Param::G => &self.g,
            Param::Snl | Param::Snr | Param::Spl | Param::Spr => return None,
        };
        Some(values)
    }

    fn array_mut(&mut self, param: Param) -> Option<&mut Vec<f64>> {
        let values = match param {
            Param::Eps => &mut self.eps,
            Param::Chi => &mut self.chi,
            Param::Eg => &mut self.eg,
            Param::Nc => &mut self.nc,
            Param::Nv => &mut self.nv,
            Param::Mn => &mut self.mn,
            Param::Mp => &mut self.mp,
            Param::Tn => &mut self.tn,
            Param::Tp => &mut self.tp,
            Param::Et => &mut self.et,
            Param::Br => &mut self.br,
            Param::Cn => &mut self.cn,
            Param::Cp => &mut self.cp,
            Param::Ndop => &mut self.ndop,
            Param::G => &mut self.g,
            Param::Snl | Param::Snr | Param::Spl | Param::Spr => return None,
        };
        Some(values)
    }

    pub fn scalar(&self, param: Param) -> Option<f64> {
        match param {
            Param::Snl => Some(self.snl),
            Param::Snr => Some(self.snr),
            Param::Spl => Some(self.spl),
            Param::Spr => Some(self.spr),
            _ => None,
        }
    }

    /// Copy of the cell with the per-node array `param` replaced.
    pub fn with_array(&self, param: Param, values: Vec<f64>) -> Self {
        let mut cell = self.clone();
        if let Some(slot) = cell.array_mut(param) {
            *slot = values;
        }
        cell
    }

    /// Copy of the cell with the contact velocity `param` replaced.
    pub fn with_scalar(&self, param: Param, value: f64) -> Self {
        let mut cell = self.clone();
        match param {
            Param::Snl => cell.snl = value,
            Param::Snr => cell.snr = value,
            Param::Spl => cell.spl = value,
            Param::Spr => cell.spr = value,
            _ => {}
        }
        cell
    }

    /// Copy of the cell with the generation profile replaced.
    pub fn with_generation(&self, g: Vec<f64>) -> Self {
        self.with_array(Param::G, g)
    }

    /// Copy of the cell with new contact recombination velocities.
    pub fn with_contacts(&self, snl: f64, snr: f64, spl: f64, spr: f64) -> Self {
        Self {
            snl,
            snr,
            spl,
            spr,
            ..self.clone()
        }
    }

    pub fn with_work_functions(&self, phi_m0: Option<f64>, phi_ml: Option<f64>) -> Self {
        Self {
            phi_m0,
            phi_ml,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<(), DeviceError> {
        self.grid.validate()?;
        let n = self.len();

        for param in Param::PER_NODE {
            let values = self.array(param).unwrap_or(&[]);
            if values.len() != n {
                return Err(DeviceError::LengthMismatch {
                    field: param.name(),
                    expected: n,
                    actual: values.len(),
                });
            }
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(DeviceError::NonFinite {
                    field: param.name(),
                    index,
                });
            }
        }

        let positive = [
            Param::Eps,
            Param::Nc,
            Param::Nv,
            Param::Mn,
            Param::Mp,
            Param::Tn,
            Param::Tp,
        ];
        for param in positive {
            let values = self.array(param).unwrap_or(&[]);
            if let Some(index) = values.iter().position(|&v| v <= 0.0) {
                return Err(DeviceError::NonPositive {
                    field: param.name(),
                    index,
                    value: values[index],
                });
            }
        }

        for param in Param::SCALAR {
            let value = self.scalar(param).unwrap_or(0.0);
            if !value.is_finite() || value < 0.0 {
                return Err(DeviceError::NegativeVelocity {
                    field: param.name(),
                    value,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_cell(n: usize) -> Cell {
        let grid = Grid::new((0..n).map(|i| i as f64).collect()).unwrap();
        let ones = vec![1.0; n];
        Cell {
            grid,
            eps: ones.clone(),
            chi: ones.clone(),
            eg: ones.clone(),
            nc: ones.clone(),
            nv: ones.clone(),
            mn: ones.clone(),
            mp: ones.clone(),
            tn: ones.clone(),
            tp: ones.clone(),
            et: vec![0.0; n],
            br: vec![0.0; n],
            cn: vec![0.0; n],
            cp: vec![0.0; n],
            ndop: vec![0.0; n],
            g: vec![0.0; n],
            snl: 1.0,
            snr: 1.0,
            spl: 1.0,
            spr: 1.0,
            phi_m0: None,
            phi_ml: None,
        }
    }

    #[test]
    fn validate_reports_first_structural_problem() {
        let cell = flat_cell(5);
        assert!(cell.validate().is_ok());

        let short = cell.with_array(Param::Mn, vec![1.0; 4]);
        assert_eq!(
            short.validate(),
            Err(DeviceError::LengthMismatch {
                field: "mn",
                expected: 5,
                actual: 4
            })
        );

        let mut nv = vec![1.0; 5];
        nv[3] = 0.0;
        assert!(matches!(
            cell.with_array(Param::Nv, nv).validate(),
            Err(DeviceError::NonPositive { field: "Nv", index: 3, .. })
        ));

        assert!(matches!(
            cell.with_scalar(Param::Spr, -1.0).validate(),
            Err(DeviceError::NegativeVelocity { field: "Spr", .. })
        ));
    }

    #[test]
    fn field_mapping_covers_every_per_node_param() {
        let cell = flat_cell(3);
        for param in Param::PER_NODE {
            let mut node = cell.node(1);
            *node.field_mut(param).unwrap() = 42.0;
            let modified = cell.with_array(param, vec![42.0; 3]).node(1);
            assert_eq!(node, modified, "{param}");
        }
        for param in Param::SCALAR {
            assert!(cell.node(0).field_mut(param).is_none());
            assert_eq!(cell.with_scalar(param, 7.0).scalar(param), Some(7.0));
        }
    }
}
