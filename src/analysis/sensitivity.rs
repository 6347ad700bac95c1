//! Derivatives of every swept current with respect to device parameters.
//!
//! Each converged state satisfies `F(x(θ), θ, B(θ)) = 0`, so
//!
//! ```text
//! dx/dθ = -J⁻¹ (∂F/∂θ + ∂F/∂B · dB/dθ)
//! ```
//!
//! is one linear solve with the Jacobian at the converged state. The chain starts
//! from the potential-only equilibrium system. At every bias step the contact
//! potential rows of `dB/dθ` are carried over from the previous step's state
//! derivative, and the contact density rows come from the closed form. All
//! derivatives are taken with respect to normalized parameters.

use crate::analysis::sweep::{IvSweep, SweepResult};
use crate::config::{PeakPowerConfig, SimulationConfig};
use crate::error::Result;
use crate::models::cell::{Cell, Param};
use crate::numerics::block::{LinearSolveError, ScaledFactorization};
use crate::numerics::spline;
use crate::numerics::timing::record_sensitivity;
use crate::physics::bc::{boundary, boundary_derivatives};
use crate::physics::current::{current_parameter_gradient, current_state_gradient};
use crate::physics::potentials::{Potentials, VARS};
use crate::physics::residual::{DriftDiffusion, Equilibrium};
use crate::physics::PhysicsModel;
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// `dI_k/dθ` for every accepted step `k`.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivativeTensor {
    /// One entry per step.
    Scalar(DVector<f64>),
    /// `[steps x N]`, one column per node.
    PerNode(DMatrix<f64>),
}

impl DerivativeTensor {
    pub fn steps(&self) -> usize {
        match self {
            DerivativeTensor::Scalar(d) => d.len(),
            DerivativeTensor::PerNode(d) => d.nrows(),
        }
    }

    /// Derivative of the step-`k` current, one entry per parameter column.
    pub fn step(&self, k: usize) -> DVector<f64> {
        match self {
            DerivativeTensor::Scalar(d) => DVector::from_element(1, d[k]),
            DerivativeTensor::PerNode(d) => d.row(k).transpose(),
        }
    }

    fn contract(&self, weights: &[f64]) -> ParamGradient {
        let k = weights.len().min(self.steps());
        let w = DVector::from_column_slice(&weights[..k]);
        match self {
            DerivativeTensor::Scalar(d) => ParamGradient::Scalar(d.rows(0, k).dot(&w)),
            DerivativeTensor::PerNode(d) => ParamGradient::PerNode(d.rows(0, k).transpose() * w),
        }
    }
}

/// Derivative of a scalar figure of merit with respect to one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamGradient {
    Scalar(f64),
    PerNode(DVector<f64>),
}

impl ParamGradient {
    pub fn scaled(&self, factor: f64) -> Self {
        match self {
            ParamGradient::Scalar(g) => ParamGradient::Scalar(g * factor),
            ParamGradient::PerNode(g) => ParamGradient::PerNode(g * factor),
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        match self {
            ParamGradient::Scalar(g) => std::slice::from_ref(g),
            ParamGradient::PerNode(g) => g.as_slice(),
        }
    }
}

/// Per-parameter `dI_k/dθ` over the accepted steps of one sweep.
///
/// The derivatives are taken on a fixed voltage grid. The bias step `dv` is
/// derived from the contact potentials, which depend on Chi, Eg, Nc, Nv and
/// Ndop at the end nodes, but it is held constant here. Compare against
/// perturbed sweeps run with the same `SweepConfig::voltage_increment`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivativeMap {
    tensors: BTreeMap<Param, DerivativeTensor>,
}

impl DerivativeMap {
    pub fn get(&self, param: Param) -> Option<&DerivativeTensor> {
        self.tensors.get(&param)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Param, &DerivativeTensor)> {
        self.tensors.iter()
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// `dPmax/dθ = Σ_k ∂Pmax/∂I_k · dI_k/dθ` with the refined peak power.
    pub fn max_power_gradient(
        &self,
        sweep: &SweepResult,
        config: &PeakPowerConfig,
    ) -> BTreeMap<Param, ParamGradient> {
        let (_, dp_di) = spline::max_power_gradient(&sweep.voltages, &sweep.currents, config);
        self.tensors
            .iter()
            .map(|(param, tensor)| (*param, tensor.contract(&dp_di)))
            .collect()
    }

    pub fn efficiency_gradient(
        &self,
        sweep: &SweepResult,
        config: &PeakPowerConfig,
        incident: f64,
    ) -> BTreeMap<Param, ParamGradient> {
        self.max_power_gradient(sweep, config)
            .into_iter()
            .map(|(param, g)| (param, g.scaled(incident.recip())))
            .collect()
    }
}

/// Quantities of one converged bias step shared by every parameter chain.
struct StepJacobian<'a> {
    model: DriftDiffusion<'a>,
    state: &'a DVector<f64>,
    lu: ScaledFactorization,
    boundary_partials: DMatrix<f64>,
    current_gradient: DVector<f64>,
}

/// Accumulated state derivative of a single parameter.
struct Chain {
    param: Param,
    /// Closed-form `dB/dθ` of the equilibrium boundary, `6 x P`.
    boundary: DMatrix<f64>,
    /// `dx/dθ` of the last processed state, `3N x P`.
    state: DMatrix<f64>,
    currents: Vec<DVector<f64>>,
}

impl Chain {
    fn equilibrium(
        cell: &Cell,
        model: &Equilibrium,
        lu: &ScaledFactorization,
        phi: &DVector<f64>,
        param: Param,
    ) -> std::result::Result<Self, LinearSolveError> {
        let n = cell.len();
        let boundary = boundary_derivatives(cell, param);
        let rhs = model.parameter_partials(phi, param)
            + model.boundary_partials() * boundary.rows(0, 2);
        let s_eq = -lu.solve_matrix(&rhs)?;

        let mut state = DMatrix::zeros(VARS * n, rhs.ncols());
        for i in 0..n {
            state.row_mut(VARS * i).copy_from(&s_eq.row(i));
        }
        Ok(Self {
            param,
            boundary,
            state,
            currents: Vec::new(),
        })
    }

    fn step(
        &mut self,
        cell: &Cell,
        step: &StepJacobian,
    ) -> std::result::Result<(), LinearSolveError> {
        let last = VARS * (cell.len() - 1);
        let mut db = self.boundary.clone();
        db.row_mut(0).copy_from(&self.state.row(0));
        db.row_mut(1).copy_from(&self.state.row(last));

        let rhs =
            step.model.parameter_partials(step.state, self.param) + &step.boundary_partials * db;
        let s = -step.lu.solve_matrix(&rhs)?;
        let di = s.tr_mul(&step.current_gradient)
            + current_parameter_gradient(cell, step.state, self.param);
        self.currents.push(di);
        self.state = s;
        Ok(())
    }

    fn into_tensor(self, nodes: usize) -> (Param, DerivativeTensor) {
        let steps = self.currents.len();
        let tensor = if self.param.is_scalar() {
            DerivativeTensor::Scalar(DVector::from_iterator(
                steps,
                self.currents.iter().map(|d| d[0]),
            ))
        } else {
            DerivativeTensor::PerNode(DMatrix::from_fn(steps, nodes, |k, j| self.currents[k][j]))
        };
        (self.param, tensor)
    }
}

fn for_each_chain(
    chains: &mut [Chain],
    f: impl Fn(&mut Chain) -> std::result::Result<(), LinearSolveError> + Sync + Send,
) -> std::result::Result<(), LinearSolveError> {
    #[cfg(feature = "parallel")]
    return chains.par_iter_mut().try_for_each(f);
    #[cfg(not(feature = "parallel"))]
    return chains.iter_mut().try_for_each(f);
}

fn differentiate(
    cell: &Cell,
    equilibrium: &Potentials,
    sweep: &SweepResult,
    states: &[DVector<f64>],
    params: &[Param],
) -> std::result::Result<DerivativeMap, LinearSolveError> {
    let n = cell.len();
    let params: BTreeSet<Param> = params.iter().copied().collect();

    let eq_model = Equilibrium::new(cell, boundary(cell, 0.0));
    let eq_lu = eq_model.jacobian(&equilibrium.phi).factor_equilibrated()?;
    let mut chains = params
        .iter()
        .map(|&param| Chain::equilibrium(cell, &eq_model, &eq_lu, &equilibrium.phi, param))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for (k, (state, &v)) in states.iter().zip(&sweep.voltages).enumerate() {
        record_sensitivity(|| {
            let model = DriftDiffusion::new(cell, boundary(cell, v));
            let step = StepJacobian {
                lu: model.jacobian(state).factor_equilibrated()?,
                boundary_partials: model.boundary_partials(state),
                current_gradient: current_state_gradient(cell, state),
                model,
                state,
            };
            for_each_chain(&mut chains, |chain| chain.step(cell, &step))
        })?;
        log::debug!("sensitivity step {k} done for {} parameters", chains.len());
    }

    Ok(DerivativeMap {
        tensors: chains.into_iter().map(|c| c.into_tensor(n)).collect(),
    })
}

impl IvSweep<'_> {
    /// Sweep plus `dI_k/dθ` for every parameter in `params`.
    ///
    /// The initial potentials must be the converged equilibrium state. If the
    /// sweep diverges, the tensors cover the accepted steps only.
    pub fn run_with_sensitivity(&self, params: &[Param]) -> Result<(SweepResult, DerivativeMap)> {
        let (sweep, states) = self.run_traced(true)?;
        let derivatives = differentiate(self.cell(), self.initial(), &sweep, &states, params)?;
        log::info!(
            "differentiated {} steps with respect to {} parameters",
            sweep.len(),
            derivatives.len()
        );
        Ok((sweep, derivatives))
    }
}

pub fn run_iv_sweep_with_sensitivity(
    cell: &Cell,
    initial: &Potentials,
    params: &[Param],
    config: &SimulationConfig,
) -> Result<(SweepResult, DerivativeMap)> {
    IvSweep::new(cell, initial.clone())
        .with_config(*config)
        .run_with_sensitivity(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::sweep::SweepStatus;
    use approx::assert_relative_eq;

    fn sweep_of(voltages: Vec<f64>, currents: Vec<f64>) -> SweepResult {
        SweepResult {
            iterations: vec![1; currents.len()],
            voltages,
            currents,
            equilibrium: Potentials::equilibrium(DVector::zeros(2)),
            last: Potentials::equilibrium(DVector::zeros(2)),
            status: SweepStatus::SignReversal,
            divergence: None,
        }
    }

    #[test]
    fn gradients_contract_over_steps() {
        let mut map = DerivativeMap::default();
        map.tensors
            .insert(Param::Snl, DerivativeTensor::Scalar(DVector::from_vec(vec![1.0, 2.0])));
        map.tensors.insert(
            Param::G,
            DerivativeTensor::PerNode(DMatrix::from_row_slice(
                2,
                3,
                &[1.0, 0.0, 2.0, 0.0, 1.0, 4.0],
            )),
        );
        // Two samples: the peak is the best sample, here step 1
        let sweep = sweep_of(vec![0.0, 0.5], vec![1.0, 0.8]);
        let grads = map.max_power_gradient(&sweep, &PeakPowerConfig::default());
        assert_eq!(grads[&Param::Snl], ParamGradient::Scalar(1.0));
        assert_eq!(grads[&Param::G].as_slice(), &[0.0, 0.5, 2.0]);

        let eff = map.efficiency_gradient(&sweep, &PeakPowerConfig::default(), 4.0);
        assert_relative_eq!(eff[&Param::Snl].as_slice()[0], 0.25);
    }

    #[test]
    fn step_extracts_one_row() {
        let t = DerivativeTensor::PerNode(DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]));
        assert_eq!(t.steps(), 2);
        assert_eq!(t.step(1).as_slice(), &[3.0, 4.0]);
        let s = DerivativeTensor::Scalar(DVector::from_vec(vec![5.0, 6.0]));
        assert_eq!(s.step(0).as_slice(), &[5.0]);
    }

    #[test]
    fn tensors_stop_at_the_last_accepted_step() {
        use crate::analysis::equilibrium::solve_equilibrium;
        use crate::models::pn::pn::pn_problem_def;
        use crate::numerics::newton::SolverConfig;

        let problem = pn_problem_def(40, 0.0, false).unwrap();
        let cell = &problem.cell;
        let eq = solve_equilibrium(cell, &SolverConfig::default()).unwrap();
        let config = SimulationConfig::default()
            .with_solver(SolverConfig::default().with_max_iterations(1));
        let params = [Param::G, Param::Ndop, Param::Snl];
        let (sweep, derivatives) =
            run_iv_sweep_with_sensitivity(cell, &eq, &params, &config).unwrap();

        assert_eq!(sweep.status, SweepStatus::Diverged);
        assert!(sweep.divergence.is_some());
        assert_eq!(sweep.len(), 1);
        assert_eq!(derivatives.len(), 3);
        for (param, tensor) in derivatives.iter() {
            assert_eq!(tensor.steps(), sweep.len(), "{param:?}");
            assert!(tensor.step(0).iter().all(|d| d.is_finite()));
        }
    }
}
