//! Normalization scales.
//!
//! Every quantity the solver sees is dimensionless. Potentials are measured in
//! thermal voltages, densities in units of `n0`, lengths in the Debye length of
//! a `n0` doped material with unit permittivity.

use crate::models::cell::Param;

pub const BOLTZMANN: f64 = 1.380649e-23; // [J/K]
pub const ELEMENTARY_CHARGE: f64 = 1.602176634e-19; // [C]
pub const VACUUM_PERMITTIVITY: f64 = 8.8541878128e-14; // [F/cm]

/// Physical kind of a quantity, used to pick its scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Length,
    Permittivity,
    Energy,
    Density,
    Mobility,
    Time,
    Velocity,
    CurrentDensity,
    Rate,
    Radiative,
    Auger,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scales {
    pub temperature: f64, // [K]
    pub n: f64,           // [cm^-3]
    pub m: f64,           // [cm^2/(V s)]
    pub energy: f64,      // [V]
    pub time: f64,        // [s]
    pub length: f64,      // [cm]
    pub velocity: f64,    // [cm/s]
    pub current: f64,     // [A/cm^2]
    pub rate: f64,        // [cm^-3 s^-1]
}

impl Default for Scales {
    fn default() -> Self {
        Self::new(300.0, 1e19, 1.0)
    }
}

impl Scales {
    pub fn new(temperature: f64, n: f64, m: f64) -> Self {
        let energy = BOLTZMANN * temperature / ELEMENTARY_CHARGE;
        let time = VACUUM_PERMITTIVITY / (ELEMENTARY_CHARGE * n * m);
        let length = (VACUUM_PERMITTIVITY * energy / (ELEMENTARY_CHARGE * n)).sqrt();
        let velocity = length / time;
        let current = BOLTZMANN * temperature * n * m / length;
        let rate = n * energy * m / (length * length);

        Self {
            temperature,
            n,
            m,
            energy,
            time,
            length,
            velocity,
            current,
            rate,
        }
    }

    /// Physical unit of one normalized `quantity`.
    pub fn unit(&self, quantity: Quantity) -> f64 {
        match quantity {
            Quantity::Length => self.length,
            Quantity::Permittivity => 1.0,
            Quantity::Energy => self.energy,
            Quantity::Density => self.n,
            Quantity::Mobility => self.m,
            Quantity::Time => self.time,
            Quantity::Velocity => self.velocity,
            Quantity::CurrentDensity => self.current,
            Quantity::Rate => self.rate,
            Quantity::Radiative => 1.0 / (self.time * self.n),
            Quantity::Auger => 1.0 / (self.time * self.n * self.n),
        }
    }

    pub fn normalize(&self, value: f64, quantity: Quantity) -> f64 {
        value / self.unit(quantity)
    }

    pub fn denormalize(&self, value: f64, quantity: Quantity) -> f64 {
        value * self.unit(quantity)
    }

    /// Converts a normalized power density into W/m^2.
    pub fn power_density(&self, power: f64) -> f64 {
        power * self.current * self.energy * 1e4
    }

    /// Converts a normalized voltage into volts.
    pub fn volts(&self, v: f64) -> f64 {
        v * self.energy
    }
}

impl Param {
    pub fn quantity(self) -> Quantity {
        match self {
            Param::Eps => Quantity::Permittivity,
            Param::Chi | Param::Eg | Param::Et => Quantity::Energy,
            Param::Nc | Param::Nv | Param::Ndop => Quantity::Density,
            Param::Mn | Param::Mp => Quantity::Mobility,
            Param::Tn | Param::Tp => Quantity::Time,
            Param::Br => Quantity::Radiative,
            Param::Cn | Param::Cp => Quantity::Auger,
            Param::G => Quantity::Rate,
            Param::Snl | Param::Snr | Param::Spl | Param::Spr => Quantity::Velocity,
        }
    }
}
