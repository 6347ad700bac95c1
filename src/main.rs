use ddpv::analysis::{equilibrium_guess, solve_equilibrium_from, IvSweep};
use ddpv::models::pn::pn::{pn_problem_def, PnProblem};
use ddpv::numerics::timing::{finalize_and_print, reset_timing};
use ddpv::processing::csv_writer;
use ddpv::processing::summary::SimulationSummary;
use ddpv::{Param, Potentials, SimulationConfig, SweepResult};
use std::fs;
use std::time::Instant;

const OUTPUT: &str = "output/main";
/// Uniform generation [cm^-3 s^-1], roughly one sun absorbed in 1 µm of silicon.
const GENERATION: f64 = 1e21;
/// Incident power density [W/m^2].
const INCIDENT: f64 = 1000.0;

fn main() -> ddpv::Result<()> {
    let with_sensitivity = std::env::args().any(|a| a == "--sensitivity");
    fs::create_dir_all(OUTPUT)?;

    let problem = pn_problem_def(400, GENERATION, true)?;
    let PnProblem { scales, cell, .. } = &problem;
    let config = SimulationConfig::default();
    let mut summary = SimulationSummary::from_problem(cell, scales);

    let start = Instant::now();
    reset_timing();

    println!("Solving equilibrium...");
    let eq = solve_equilibrium_from(cell, &equilibrium_guess(cell), &config.solver)?;
    println!("Equilibrium converged in {} iterations.\n", eq.iterations);
    summary.add_equilibrium_info(eq.iterations, eq.final_residual);
    save_band_diagram("equilibrium.csv", &problem, &eq.potentials)?;

    let sweep = IvSweep::new(cell, eq.potentials.clone()).with_config(config);
    let result = if with_sensitivity {
        println!("Running I-V sweep with sensitivities...");
        let (result, derivatives) = sweep.run_with_sensitivity(&Param::all())?;
        let power_scale = scales.power_density(1.0);
        let gradients =
            derivatives.efficiency_gradient(&result, &config.peak, INCIDENT / power_scale);
        csv_writer::write_gradients(
            format!("{OUTPUT}/efficiency_gradient.csv"),
            cell,
            &gradients,
        )?;
        csv_writer::write_scalar_gradients(
            format!("{OUTPUT}/efficiency_gradient_scalar.csv"),
            &gradients,
        )?;
        println!("Efficiency gradients saved to {OUTPUT}/efficiency_gradient*.csv");
        result
    } else {
        println!("Running I-V sweep...");
        sweep.run()?
    };
    report_sweep(&result);

    csv_writer::write_iv_curve(format!("{OUTPUT}/iv_curve.csv"), &result, scales)?;
    save_band_diagram("last_bias.csv", &problem, &result.last)?;
    println!("I-V curve saved to {OUTPUT}/iv_curve.csv");

    finalize_and_print(start.elapsed());

    summary.add_sweep(&result, &config.peak, scales, INCIDENT);
    summary.write_to_file(format!("{OUTPUT}/simulation_summary.txt"))?;
    println!("{summary}");
    println!("Summary saved to {OUTPUT}/simulation_summary.txt");
    Ok(())
}

fn save_band_diagram(name: &str, problem: &PnProblem, pot: &Potentials) -> ddpv::Result<()> {
    let path = format!("{OUTPUT}/{name}");
    csv_writer::write_band_diagram(&path, &problem.cell, pot, &problem.scales)?;
    println!("Band diagram saved to {path}");
    Ok(())
}

fn report_sweep(result: &SweepResult) {
    println!("Sweep stopped after {} steps: {:?}", result.len(), result.status);
    if let Some(err) = &result.divergence {
        eprintln!("Sweep diverged: {err}");
    }
    println!("{:>6} | {:>12} | {:>12} | {:>5}", "step", "v", "I", "iter");
    for (k, ((v, i), it)) in result
        .voltages
        .iter()
        .zip(&result.currents)
        .zip(&result.iterations)
        .enumerate()
    {
        println!("{:>6} | {:>12.4e} | {:>12.4e} | {:>5}", k, v, i, it);
    }
    println!();
}
