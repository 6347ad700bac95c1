/// Bulk material properties in physical units.
///
/// | field | unit |
/// |-------|------|
/// | `eps` | relative permittivity |
/// | `chi`, `eg`, `et` | eV |
/// | `nc`, `nv` | cm^-3 |
/// | `mn`, `mp` | cm^2 V^-1 s^-1 |
/// | `tn`, `tp` | s |
/// | `br` | cm^3 s^-1 |
/// | `cn`, `cp` | cm^6 s^-1 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub eps: f64,
    pub chi: f64,
    pub eg: f64,
    pub nc: f64,
    pub nv: f64,
    pub mn: f64,
    pub mp: f64,
    pub tn: f64,
    pub tp: f64,
    pub et: f64,
    pub br: f64,
    pub cn: f64,
    pub cp: f64,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            eps: 1.0,
            chi: 1.0,
            eg: 1.0,
            nc: 1e17,
            nv: 1e17,
            mn: 1e2,
            mp: 1e2,
            tn: 1e-8,
            tp: 1e-8,
            et: 0.0,
            br: 0.0,
            cn: 0.0,
            cp: 0.0,
        }
    }
}

impl Material {
    pub fn with_permittivity(self, eps: f64) -> Self {
        Self { eps, ..self }
    }

    pub fn with_bands(self, chi: f64, eg: f64) -> Self {
        Self { chi, eg, ..self }
    }

    pub fn with_density_of_states(self, nc: f64, nv: f64) -> Self {
        Self { nc, nv, ..self }
    }

    pub fn with_mobilities(self, mn: f64, mp: f64) -> Self {
        Self { mn, mp, ..self }
    }

    pub fn with_lifetimes(self, tn: f64, tp: f64) -> Self {
        Self { tn, tp, ..self }
    }

    pub fn with_trap_energy(self, et: f64) -> Self {
        Self { et, ..self }
    }

    pub fn with_radiative(self, br: f64) -> Self {
        Self { br, ..self }
    }

    pub fn with_auger(self, cn: f64, cp: f64) -> Self {
        Self { cn, cp, ..self }
    }
}
