//! Run configuration. Every knob has a default and a `with_*` builder.

use crate::numerics::newton::SolverConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepConfig {
    /// The bias step is the built-in potential divided by this count.
    pub step_count: u32,
    /// Hard limit on the number of bias points.
    pub step_cap: u32,
    /// Replaces the computed bias step, in thermal voltages.
    pub voltage_increment: Option<f64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            step_count: 50,
            step_cap: 100,
            voltage_increment: None,
        }
    }
}

impl SweepConfig {
    pub fn with_step_count(self, step_count: u32) -> Self {
        Self { step_count, ..self }
    }

    pub fn with_step_cap(self, step_cap: u32) -> Self {
        Self { step_cap, ..self }
    }

    pub fn with_voltage_increment(self, dv: f64) -> Self {
        Self {
            voltage_increment: Some(dv),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakPowerConfig {
    pub steps: u32,
    pub learning_rate: f64,
}

impl Default for PeakPowerConfig {
    fn default() -> Self {
        Self {
            steps: 100,
            learning_rate: 1.0,
        }
    }
}

impl PeakPowerConfig {
    pub fn with_steps(self, steps: u32) -> Self {
        Self { steps, ..self }
    }

    pub fn with_learning_rate(self, learning_rate: f64) -> Self {
        Self { learning_rate, ..self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimulationConfig {
    pub solver: SolverConfig,
    pub sweep: SweepConfig,
    pub peak: PeakPowerConfig,
}

impl SimulationConfig {
    pub fn with_solver(self, solver: SolverConfig) -> Self {
        Self { solver, ..self }
    }

    pub fn with_sweep(self, sweep: SweepConfig) -> Self {
        Self { sweep, ..self }
    }

    pub fn with_peak_power(self, peak: PeakPowerConfig) -> Self {
        Self { peak, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SimulationConfig::default();
        assert_eq!(cfg.solver.max_iterations, 100);
        assert_eq!(cfg.solver.damping_limit, 1.0);
        assert_eq!(cfg.sweep.step_count, 50);
        assert_eq!(cfg.sweep.step_cap, 100);
        assert_eq!(cfg.sweep.voltage_increment, None);
        assert_eq!(cfg.peak.steps, 100);
        assert_eq!(cfg.peak.learning_rate, 1.0);
    }

    #[test]
    fn builders_leave_other_fields_alone() {
        let cfg = SimulationConfig::default()
            .with_sweep(SweepConfig::default().with_step_cap(7).with_voltage_increment(-0.5));
        assert_eq!(cfg.sweep.step_cap, 7);
        assert_eq!(cfg.sweep.step_count, 50);
        assert_eq!(cfg.sweep.voltage_increment, Some(-0.5));
        assert_eq!(cfg.solver, SolverConfig::default());
    }
}
