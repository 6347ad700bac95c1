//! Bulk semiconductor presets in physical units.

use crate::models::material::Material;

/// Crystalline silicon at 300 K.
pub fn silicon() -> Material {
    Material::default()
        .with_permittivity(11.7)
        .with_bands(4.05, 1.12)
        .with_density_of_states(3.2e19, 1.8e19)
        .with_mobilities(1400.0, 450.0)
        .with_lifetimes(1e-8, 1e-8)
}

/// Gallium arsenide at 300 K.
pub fn gallium_arsenide() -> Material {
    Material::default()
        .with_permittivity(12.9)
        .with_bands(4.07, 1.424)
        .with_density_of_states(4.7e17, 9.0e18)
        .with_mobilities(8500.0, 400.0)
        .with_lifetimes(1e-8, 1e-8)
        .with_radiative(7.2e-10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_physical() {
        for m in [silicon(), gallium_arsenide()] {
            assert!(m.eps > 1.0 && m.eg > 1.0 && m.chi > 4.0);
            assert!(m.nc > 0.0 && m.nv > 0.0 && m.mn > m.mp);
        }
    }
}
