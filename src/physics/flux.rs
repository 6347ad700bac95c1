//! Scharfetter-Gummel face currents.

use crate::models::cell::NodeParams;
use num_dual::DualNum;

/// `x / (exp(x) - 1)`, expanded near the removable singularity at 0.
pub fn bernoulli<T: DualNum<f64> + Copy>(x: T) -> T {
    if x.re().abs() < 1e-5 {
        T::one() - x * 0.5 + x * x / 12.0
    } else {
        x / x.exp_m1()
    }
}

/// Electron current density across a face of length `h`.
///
/// `left` and `right` are the `[phi, phi_n, phi_p]` unknowns at the two nodes.
pub fn electron_current<T: DualNum<f64> + Copy>(
    ml: &NodeParams<T>,
    mr: &NodeParams<T>,
    left: &[T; 3],
    right: &[T; 3],
    h: f64,
) -> T {
    let psi_l = ml.chi + ml.nc.ln() + left[0];
    let psi_r = mr.chi + mr.nc.ln() + right[0];
    let n_l = (psi_l + left[1]).exp();
    let n_r = (psi_r + right[1]).exp();
    let d = psi_r - psi_l;
    let mu = (ml.mn + mr.mn) * 0.5;
    mu * (n_r * bernoulli(d) - n_l * bernoulli(-d)) / h
}

/// Hole current density across a face of length `h`.
pub fn hole_current<T: DualNum<f64> + Copy>(
    ml: &NodeParams<T>,
    mr: &NodeParams<T>,
    left: &[T; 3],
    right: &[T; 3],
    h: f64,
) -> T {
    let psi_l = -ml.chi - ml.eg + ml.nv.ln() - left[0];
    let psi_r = -mr.chi - mr.eg + mr.nv.ln() - right[0];
    let p_l = (psi_l - left[2]).exp();
    let p_r = (psi_r - right[2]).exp();
    let d = psi_r - psi_l;
    let mu = (ml.mp + mr.mp) * 0.5;
    -(mu * (p_r * bernoulli(d) - p_l * bernoulli(-d))) / h
}
