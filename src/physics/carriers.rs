//! Carrier statistics and recombination.
//!
//! All functions are generic over the number type so the same expressions feed
//! the residual, its Jacobian and the parameter derivatives.

use crate::models::cell::NodeParams;
use num_dual::DualNum;

pub fn electron_density<T: DualNum<f64> + Copy>(m: &NodeParams<T>, phi: T, phi_n: T) -> T {
    m.nc * (m.chi + phi + phi_n).exp()
}

pub fn hole_density<T: DualNum<f64> + Copy>(m: &NodeParams<T>, phi: T, phi_p: T) -> T {
    m.nv * (-m.chi - m.eg - phi - phi_p).exp()
}

pub fn intrinsic_density<T: DualNum<f64> + Copy>(m: &NodeParams<T>) -> T {
    (m.nc * m.nv).sqrt() * (-m.eg * 0.5).exp()
}

/// Shockley-Read-Hall recombination through a single trap level `et`.
pub fn srh<T: DualNum<f64> + Copy>(m: &NodeParams<T>, n: T, p: T) -> T {
    let ni = intrinsic_density(m);
    let excess = n * p - ni * ni;
    excess / (m.tp * (n + ni * m.et.exp()) + m.tn * (p + ni * (-m.et).exp()))
}

pub fn radiative<T: DualNum<f64> + Copy>(m: &NodeParams<T>, n: T, p: T) -> T {
    let ni = intrinsic_density(m);
    m.br * (n * p - ni * ni)
}

pub fn auger<T: DualNum<f64> + Copy>(m: &NodeParams<T>, n: T, p: T) -> T {
    let ni = intrinsic_density(m);
    (m.cn * n + m.cp * p) * (n * p - ni * ni)
}

/// Net recombination rate, positive when carriers are lost.
pub fn recombination<T: DualNum<f64> + Copy>(m: &NodeParams<T>, n: T, p: T) -> T {
    srh(m, n, p) + radiative(m, n, p) + auger(m, n, p)
}
