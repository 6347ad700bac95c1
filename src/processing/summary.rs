use crate::analysis::sweep::{SweepResult, SweepStatus};
use crate::config::PeakPowerConfig;
use crate::models::cell::Cell;
use crate::physics::bc::boundary;
use crate::scales::{Quantity, Scales};
use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Plain-text report of one simulation run, in physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    // Grid info
    pub num_nodes: usize,
    pub device_length: f64, // [cm]
    pub min_spacing: f64,   // [cm]
    pub max_spacing: f64,   // [cm]

    // Contacts
    pub builtin_voltage: f64, // [V]
    pub left_n: f64,          // [cm^-3]
    pub left_p: f64,
    pub right_n: f64,
    pub right_p: f64,

    // Equilibrium solve
    pub equilibrium_iterations: Option<u32>,
    pub equilibrium_residual: Option<f64>,

    // Sweep
    pub sweep_steps: Option<usize>,
    pub sweep_status: Option<SweepStatus>,
    pub short_circuit_current: Option<f64>, // [A/cm^2]
    pub open_circuit_voltage: Option<f64>,  // [V]
    pub max_power: Option<f64>,             // [W/m^2]
    pub efficiency: Option<f64>,

    // Normalization scales
    pub v_scale: f64,
    pub l_scale: f64,
    pub n_scale: f64,
}

impl SimulationSummary {
    pub fn from_problem(cell: &Cell, scales: &Scales) -> Self {
        let length = |x: f64| scales.denormalize(x, Quantity::Length);
        let density = |n: f64| scales.denormalize(n, Quantity::Density);
        let b = boundary(cell, 0.0);

        Self {
            num_nodes: cell.len(),
            device_length: length(cell.grid.length()),
            min_spacing: length(cell.grid.min_spacing()),
            max_spacing: length(cell.grid.max_spacing()),
            builtin_voltage: scales.volts(b.phi0 - b.phi_l),
            left_n: density(b.neq0),
            left_p: density(b.peq0),
            right_n: density(b.neq_l),
            right_p: density(b.peq_l),
            equilibrium_iterations: None,
            equilibrium_residual: None,
            sweep_steps: None,
            sweep_status: None,
            short_circuit_current: None,
            open_circuit_voltage: None,
            max_power: None,
            efficiency: None,
            v_scale: scales.energy,
            l_scale: scales.length,
            n_scale: scales.n,
        }
    }

    pub fn add_equilibrium_info(&mut self, iterations: u32, final_residual: f64) {
        self.equilibrium_iterations = Some(iterations);
        self.equilibrium_residual = Some(final_residual);
    }

    /// `incident` is the incident power density in W/m^2.
    pub fn add_sweep(
        &mut self,
        sweep: &SweepResult,
        peak: &PeakPowerConfig,
        scales: &Scales,
        incident: f64,
    ) {
        self.sweep_steps = Some(sweep.len());
        self.sweep_status = Some(sweep.status);
        self.short_circuit_current = sweep
            .short_circuit_current()
            .map(|j| scales.denormalize(j, Quantity::CurrentDensity));
        self.open_circuit_voltage = sweep.open_circuit_voltage().map(|v| scales.volts(v));
        if !sweep.is_empty() {
            let pmax = scales.power_density(sweep.max_power(peak));
            self.max_power = Some(pmax);
            self.efficiency = Some(pmax / incident);
        }
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;
        write!(file, "{self}")
    }
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f, "PV DEVICE SIMULATION SUMMARY")?;
        writeln!(f, "{}", "=".repeat(60))?;
        writeln!(f)?;

        writeln!(f, "GRID")?;
        writeln!(f, "{}", "-".repeat(60))?;
        writeln!(f, "Number of nodes:     {}", self.num_nodes)?;
        writeln!(f, "Device length:       {:.6e} cm", self.device_length)?;
        writeln!(f, "Min spacing:         {:.6e} cm", self.min_spacing)?;
        writeln!(f, "Max spacing:         {:.6e} cm", self.max_spacing)?;
        writeln!(f)?;

        writeln!(f, "NORMALIZATION SCALES")?;
        writeln!(f, "{}", "-".repeat(60))?;
        writeln!(f, "Voltage scale (kT/q): {:.6e} V", self.v_scale)?;
        writeln!(f, "Length scale:         {:.6e} cm", self.l_scale)?;
        writeln!(f, "Density scale:        {:.6e} cm⁻³", self.n_scale)?;
        writeln!(f)?;

        writeln!(f, "CONTACTS")?;
        writeln!(f, "{}", "-".repeat(60))?;
        writeln!(f, "Built-in voltage:    {:.4} V", self.builtin_voltage)?;
        writeln!(
            f,
            "Left contact:        n = {:.2e} cm⁻³, p = {:.2e} cm⁻³",
            self.left_n, self.left_p
        )?;
        writeln!(
            f,
            "Right contact:       n = {:.2e} cm⁻³, p = {:.2e} cm⁻³",
            self.right_n, self.right_p
        )?;
        writeln!(f)?;

        if let (Some(iter), Some(res)) = (self.equilibrium_iterations, self.equilibrium_residual) {
            writeln!(f, "EQUILIBRIUM SOLVE")?;
            writeln!(f, "{}", "-".repeat(60))?;
            writeln!(f, "Iterations:          {}", iter)?;
            writeln!(f, "Final residual:      {:.6e}", res)?;
            writeln!(f)?;
        }

        if let (Some(steps), Some(status)) = (self.sweep_steps, self.sweep_status) {
            writeln!(f, "I-V SWEEP")?;
            writeln!(f, "{}", "-".repeat(60))?;
            writeln!(f, "Steps:               {} ({:?})", steps, status)?;
            if let Some(jsc) = self.short_circuit_current {
                writeln!(f, "Jsc:                 {:.6e} A/cm²", jsc)?;
            }
            if let Some(voc) = self.open_circuit_voltage {
                writeln!(f, "Voc:                 {:.4} V", voc)?;
            }
            if let Some(pmax) = self.max_power {
                writeln!(f, "Pmax:                {:.6e} W/m²", pmax)?;
            }
            if let Some(eff) = self.efficiency {
                writeln!(f, "Efficiency:          {:.4} %", 100.0 * eff)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "{}", "=".repeat(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pn::pn::pn_problem_def;

    #[test]
    fn contact_section_reflects_the_junction() {
        let problem = pn_problem_def(21, 0.0, false).unwrap();
        let summary = SimulationSummary::from_problem(&problem.cell, &problem.scales);
        assert!(summary.builtin_voltage > 0.8 && summary.builtin_voltage < 1.12);
        assert!(summary.left_n > 0.9e18 && summary.right_p > 0.9e17);
        let text = summary.to_string();
        assert!(text.contains("Built-in voltage"));
        assert!(!text.contains("I-V SWEEP"));
    }
}
