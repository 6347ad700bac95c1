//! Clamped quadratic spline through sampled power and gradient ascent on it.
//!
//! Segment `j` between knots `x_j` and `x_{j+1}` is `a_j x^2 + b_j x + c_j`.
//! The `3(K - 1)` coefficients satisfy `a_0 = 0`, interpolation at both ends of
//! every segment and continuity of the first derivative at interior knots. The
//! system matrix depends on the knots only, so it is factored once in `f64` and
//! then applied to right-hand sides of any [`DualNum`] type.

use crate::config::PeakPowerConfig;
use nalgebra::{DMatrix, DVector};
use num_dual::{Dual64, DualNum};

/// LU factors of the spline system for a fixed set of ascending knots.
#[derive(Debug, Clone)]
pub struct SplineSystem {
    knots: Vec<f64>,
    lower: DMatrix<f64>,
    upper: DMatrix<f64>,
    /// Row `i` of the permuted system is row `perm[i]` of the original.
    perm: Vec<usize>,
}

impl SplineSystem {
    /// `None` if the knots are fewer than two or not strictly increasing.
    pub fn new(knots: &[f64]) -> Option<Self> {
        let k = knots.len();
        if k < 2 || knots.windows(2).any(|w| !(w[1] > w[0])) {
            return None;
        }
        let dim = 3 * (k - 1);
        let mut m = DMatrix::zeros(dim, dim);
        m[(0, 0)] = 1.0;
        for i in 0..k - 1 {
            for (r, x) in [(3 * i + 1, knots[i]), (3 * i + 2, knots[i + 1])] {
                m[(r, 3 * i)] = x * x;
                m[(r, 3 * i + 1)] = x;
                m[(r, 3 * i + 2)] = 1.0;
            }
        }
        for i in 0..k.saturating_sub(2) {
            let x = knots[i + 1];
            let r = 3 * i + 3;
            m[(r, 3 * i)] = 2.0 * x;
            m[(r, 3 * i + 1)] = 1.0;
            m[(r, 3 * i + 3)] = -2.0 * x;
            m[(r, 3 * i + 4)] = -1.0;
        }

        let lu = m.lu();
        if !lu.is_invertible() {
            return None;
        }
        let mut rows = DVector::from_fn(dim, |i, _| i as f64);
        lu.p().permute_rows(&mut rows);
        Some(Self {
            knots: knots.to_vec(),
            lower: lu.l(),
            upper: lu.u(),
            perm: rows.iter().map(|&r| r as usize).collect(),
        })
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    fn solve<T: DualNum<f64> + Copy>(&self, rhs: &[T]) -> Vec<T> {
        let n = rhs.len();
        let mut z: Vec<T> = self.perm.iter().map(|&r| rhs[r]).collect();
        for i in 0..n {
            let mut s = z[i];
            for j in 0..i {
                s = s - z[j] * self.lower[(i, j)];
            }
            z[i] = s;
        }
        for i in (0..n).rev() {
            let mut s = z[i];
            for j in i + 1..n {
                s = s - z[j] * self.upper[(i, j)];
            }
            z[i] = s / self.upper[(i, i)];
        }
        z
    }

    /// Spline through `(knots, y)`.
    pub fn fit<T: DualNum<f64> + Copy>(&self, y: &[T]) -> QuadSpline<T> {
        let k = self.knots.len();
        let mut rhs = vec![T::zero(); 3 * (k - 1)];
        for i in 0..k - 1 {
            rhs[3 * i + 1] = y[i];
            rhs[3 * i + 2] = y[i + 1];
        }
        let coef = self.solve(&rhs);
        QuadSpline {
            knots: self.knots.clone(),
            a: coef.iter().step_by(3).copied().collect(),
            b: coef.iter().skip(1).step_by(3).copied().collect(),
            c: coef.iter().skip(2).step_by(3).copied().collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuadSpline<T> {
    knots: Vec<f64>,
    pub a: Vec<T>,
    pub b: Vec<T>,
    pub c: Vec<T>,
}

impl<T: DualNum<f64> + Copy> QuadSpline<T> {
    /// Segment holding `x`: left-side binary search minus one, clamped.
    pub fn segment(&self, x: f64) -> usize {
        let idx = self.knots.partition_point(|&k| k < x);
        idx.saturating_sub(1).min(self.knots.len() - 2)
    }

    pub fn predict(&self, x: T) -> T {
        let j = self.segment(x.re());
        self.a[j] * x * x + self.b[j] * x + self.c[j]
    }

    pub fn slope(&self, x: T) -> T {
        let j = self.segment(x.re());
        self.a[j] * x * 2.0 + self.b[j]
    }

    /// Fixed-step gradient ascent from `x0`, kept inside the knot range.
    pub fn ascent(&self, x0: f64, cfg: &PeakPowerConfig) -> T {
        let (lo, hi) = (self.knots[0], self.knots[self.knots.len() - 1]);
        let mut x = T::from(x0);
        for _ in 0..cfg.steps {
            x = x + self.slope(x) * cfg.learning_rate;
            if x.re() < lo {
                x = T::from(lo);
            } else if x.re() > hi {
                x = T::from(hi);
            }
        }
        x
    }
}

fn argmax<T: DualNum<f64>>(p: &[T]) -> usize {
    p.iter()
        .enumerate()
        .fold(0, |best, (i, v)| if v.re() > p[best].re() { i } else { best })
}

/// Refined maximum of `p` sampled at voltages `v`, in any order.
///
/// Fewer than three samples, or repeated voltages, give the best sample.
pub fn max_power<T: DualNum<f64> + Copy>(v: &[f64], p: &[T], cfg: &PeakPowerConfig) -> T {
    if p.is_empty() {
        return T::zero();
    }
    let best = argmax(p);
    if p.len() < 3 {
        return p[best];
    }
    let mut order: Vec<usize> = (0..v.len()).collect();
    order.sort_by(|&i, &j| v[i].total_cmp(&v[j]));
    let knots: Vec<f64> = order.iter().map(|&i| v[i]).collect();
    let Some(system) = SplineSystem::new(&knots) else {
        return p[best];
    };
    let values: Vec<T> = order.iter().map(|&i| p[i]).collect();
    let spline = system.fit(&values);
    let x = spline.ascent(v[best], cfg);
    spline.predict(x)
}

/// Refined maximum of `v * i` and its derivative with respect to every current.
pub fn max_power_gradient(v: &[f64], i: &[f64], cfg: &PeakPowerConfig) -> (f64, Vec<f64>) {
    let base: Vec<Dual64> = v.iter().zip(i).map(|(&v, &i)| Dual64::from_re(v * i)).collect();
    let pmax = max_power(v, &base, cfg).re;
    let grad = (0..i.len())
        .map(|k| {
            let mut p = base.clone();
            p[k].eps = v[k];
            max_power(v, &p, cfg).eps
        })
        .collect();
    (pmax, grad)
}
