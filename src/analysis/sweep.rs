//! Voltage continuation from equilibrium towards open circuit.
//!
//! Every bias point is warm-started from the previous converged state. The
//! sweep ends when the current changes sign, at the step cap, on a Newton
//! divergence or when the caller raises the cancellation flag. A divergence is
//! part of the result, never an error.

use crate::analysis::equilibrium::check_initial;
use crate::config::{PeakPowerConfig, SimulationConfig, SweepConfig};
use crate::error::Result;
use crate::models::cell::Cell;
use crate::numerics::newton::{NewtonSolver, SolverDivergence};
use crate::numerics::spline::max_power;
use crate::physics::bc::{boundary, boundary_eq};
use crate::physics::current::total_current_interleaved;
use crate::physics::potentials::Potentials;
use crate::physics::residual::DriftDiffusion;
use nalgebra::DVector;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Bias step in thermal voltages, signed towards forward bias.
pub fn voltage_increment(cell: &Cell, config: &SweepConfig) -> f64 {
    if let Some(dv) = config.voltage_increment {
        return dv;
    }
    let (phi0, phi_l) = boundary_eq(cell);
    let sign = if phi_l > phi0 { -1.0 } else { 1.0 };
    sign * (phi_l - phi0).abs() / f64::from(config.step_count.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStatus {
    /// The last two currents have opposite signs, or one is zero.
    SignReversal,
    StepCap,
    Diverged,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct SweepResult {
    /// Applied bias per accepted step, in thermal voltages.
    pub voltages: Vec<f64>,
    pub currents: Vec<f64>,
    /// Newton iterations per accepted step.
    pub iterations: Vec<u32>,
    pub equilibrium: Potentials,
    /// State at the last accepted step.
    pub last: Potentials,
    pub status: SweepStatus,
    pub divergence: Option<SolverDivergence>,
}

impl SweepResult {
    pub fn len(&self) -> usize {
        self.currents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.currents.is_empty()
    }

    pub fn powers(&self) -> Vec<f64> {
        self.voltages
            .iter()
            .zip(&self.currents)
            .map(|(v, i)| v * i)
            .collect()
    }

    pub fn max_power_sampled(&self) -> f64 {
        self.powers().into_iter().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Maximum power from the quadratic spline refinement.
    pub fn max_power(&self, config: &PeakPowerConfig) -> f64 {
        max_power(&self.voltages, &self.powers(), config)
    }

    /// `max_power / incident`. Both in the same units.
    pub fn efficiency(&self, config: &PeakPowerConfig, incident: f64) -> f64 {
        self.max_power(config) / incident
    }

    pub fn short_circuit_current(&self) -> Option<f64> {
        self.currents.first().copied()
    }

    /// Bias of the zero crossing, interpolated between the last two steps.
    pub fn open_circuit_voltage(&self) -> Option<f64> {
        if self.status != SweepStatus::SignReversal {
            return None;
        }
        let k = self.len() - 1;
        let (v0, v1) = (self.voltages[k - 1], self.voltages[k]);
        let (i0, i1) = (self.currents[k - 1], self.currents[k]);
        if i0 == i1 {
            return Some(v1);
        }
        Some(v0 - i0 * (v1 - v0) / (i1 - i0))
    }
}

/// Converged interleaved states of every accepted step.
pub(crate) type StateTrace = Vec<DVector<f64>>;

/// I-V sweep builder.
pub struct IvSweep<'a> {
    cell: &'a Cell,
    initial: Potentials,
    config: SimulationConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> IvSweep<'a> {
    /// `initial` warm-starts step 0 and is reported as the equilibrium state.
    pub fn new(cell: &'a Cell, initial: Potentials) -> Self {
        Self {
            cell,
            initial,
            config: SimulationConfig::default(),
            cancel: None,
        }
    }

    pub fn with_config(self, config: SimulationConfig) -> Self {
        Self { config, ..self }
    }

    /// Checked before every bias step.
    pub fn with_cancel_flag(self, flag: Arc<AtomicBool>) -> Self {
        Self {
            cancel: Some(flag),
            ..self
        }
    }

    pub fn cell(&self) -> &Cell {
        self.cell
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn initial(&self) -> &Potentials {
        &self.initial
    }

    pub fn run(&self) -> Result<SweepResult> {
        self.run_traced(false).map(|(result, _)| result)
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub(crate) fn run_traced(&self, keep_states: bool) -> Result<(SweepResult, StateTrace)> {
        let cell = self.cell;
        cell.validate()?;
        check_initial(cell, &self.initial)?;

        let cfg = &self.config;
        let dv = voltage_increment(cell, &cfg.sweep);
        let solver = NewtonSolver::new(cfg.solver);
        log::info!(
            "I-V sweep: {} nodes, dv = {:.4e}, at most {} steps",
            cell.len(),
            dv,
            cfg.sweep.step_cap
        );

        let mut voltages = Vec::new();
        let mut currents = Vec::new();
        let mut iterations = Vec::new();
        let mut states = Vec::new();
        let mut x = self.initial.to_interleaved();
        let mut divergence = None;
        let mut status = SweepStatus::StepCap;

        for k in 0..cfg.sweep.step_cap {
            if self.cancelled() {
                status = SweepStatus::Cancelled;
                break;
            }
            let v = f64::from(k) * dv;
            let model = DriftDiffusion::new(cell, boundary(cell, v));
            let solved = match solver.solve(&model, x.clone()) {
                Ok(solved) => solved,
                Err(err) => {
                    log::warn!("step {k} at v = {v:.4e} diverged: {err}");
                    status = SweepStatus::Diverged;
                    divergence = Some(err);
                    break;
                }
            };
            x = solved.solution;
            let current = total_current_interleaved(cell, &x);
            log::info!(
                "step {k:>3}: v = {v:>10.4e}, I = {current:>12.4e}, {} iterations",
                solved.iterations
            );

            voltages.push(v);
            currents.push(current);
            iterations.push(solved.iterations);
            if keep_states {
                states.push(x.clone());
            }

            let m = currents.len();
            if m >= 2 && currents[m - 1] * currents[m - 2] <= 0.0 {
                status = SweepStatus::SignReversal;
                break;
            }
        }

        log::info!("I-V sweep stopped after {} steps: {:?}", currents.len(), status);
        let last = if currents.is_empty() {
            self.initial.clone()
        } else {
            Potentials::from_interleaved(&x)
        };
        let result = SweepResult {
            voltages,
            currents,
            iterations,
            equilibrium: self.initial.clone(),
            last,
            status,
            divergence,
        };
        Ok((result, states))
    }
}

/// Runs the continuation from `initial`, normally the equilibrium state.
pub fn run_iv_sweep(
    cell: &Cell,
    initial: &Potentials,
    config: &SimulationConfig,
) -> Result<SweepResult> {
    IvSweep::new(cell, initial.clone()).with_config(*config).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pn::pn::pn_problem_def;

    fn sweep_of(currents: Vec<f64>, status: SweepStatus) -> SweepResult {
        let voltages = (0..currents.len()).map(|k| k as f64 * 0.5).collect();
        SweepResult {
            voltages,
            iterations: vec![1; currents.len()],
            currents,
            equilibrium: Potentials::equilibrium(DVector::zeros(2)),
            last: Potentials::equilibrium(DVector::zeros(2)),
            status,
            divergence: None,
        }
    }

    #[test]
    fn increment_points_towards_forward_bias() {
        let problem = pn_problem_def(20, 0.0, false).unwrap();
        let cell = &problem.cell;
        let (phi0, phi_l) = boundary_eq(cell);
        let dv = voltage_increment(cell, &SweepConfig::default());
        assert!(phi0 > phi_l);
        assert!(dv > 0.0);
        approx::assert_relative_eq!(dv, (phi0 - phi_l) / 50.0);
        let fixed = SweepConfig::default().with_voltage_increment(-0.1);
        assert_eq!(voltage_increment(cell, &fixed), -0.1);
    }

    #[test]
    fn open_circuit_voltage_interpolates_the_crossing() {
        let sweep = sweep_of(vec![2.0, 1.0, -1.0], SweepStatus::SignReversal);
        approx::assert_relative_eq!(sweep.open_circuit_voltage().unwrap(), 0.75);
        assert_eq!(sweep.short_circuit_current(), Some(2.0));
        assert_eq!(sweep_of(vec![2.0, 1.0], SweepStatus::StepCap).open_circuit_voltage(), None);
    }

    #[test]
    fn sampled_power_peak() {
        let sweep = sweep_of(vec![2.0, 1.8, 1.0, -1.0], SweepStatus::SignReversal);
        assert_eq!(sweep.powers(), vec![0.0, 0.9, 1.0, -1.5]);
        assert_eq!(sweep.max_power_sampled(), 1.0);
    }

    #[test]
    fn raised_flag_cancels_before_the_first_step() {
        let problem = pn_problem_def(20, 0.0, false).unwrap();
        let flag = Arc::new(AtomicBool::new(true));
        let initial = crate::analysis::equilibrium::equilibrium_guess(&problem.cell);
        let result = IvSweep::new(&problem.cell, initial.clone())
            .with_cancel_flag(flag)
            .run()
            .unwrap();
        assert_eq!(result.status, SweepStatus::Cancelled);
        assert!(result.is_empty());
        assert_eq!(result.last, initial);
    }

    #[test]
    fn divergence_keeps_the_accepted_steps() {
        use crate::numerics::newton::{DivergenceCause, SolverConfig};

        let problem = pn_problem_def(40, 0.0, false).unwrap();
        let cell = &problem.cell;
        let eq = crate::analysis::equilibrium::solve_equilibrium(cell, &SolverConfig::default())
            .unwrap();
        // Step 0 starts on the converged equilibrium and needs a single
        // iteration. Step 1 does not.
        let config = SimulationConfig::default()
            .with_solver(SolverConfig::default().with_max_iterations(1));
        let sweep = IvSweep::new(cell, eq).with_config(config);
        let (result, states) = sweep.run_traced(true).unwrap();

        assert_eq!(result.status, SweepStatus::Diverged);
        assert_eq!(result.len(), 1);
        assert_eq!(result.voltages, vec![0.0]);
        assert_eq!(result.iterations, vec![1]);
        assert_eq!(states.len(), 1);
        let err = result.divergence.as_ref().unwrap();
        assert_eq!(err.cause, DivergenceCause::IterationBudget);
        assert_eq!(err.iterations, 1);
        assert_eq!(err.last_iterate.len(), 3 * cell.len());
        assert_eq!(result.last, Potentials::from_interleaved(&states[0]));
    }
}
