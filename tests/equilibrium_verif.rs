use approx::assert_relative_eq;
use ddpv::analysis::equilibrium_guess;
use ddpv::models::pn::pn::pn_problem_def;
use ddpv::physics::bc::boundary_eq;
use ddpv::{solve_equilibrium, solve_equilibrium_from, SolverConfig};

#[test]
fn bulk_regions_are_neutral() {
    let problem = pn_problem_def(200, 0.0, false).unwrap();
    let cell = &problem.cell;
    let pot = solve_equilibrium(cell, &SolverConfig::default()).unwrap();
    let n = pot.electron_density(cell);
    let p = pot.hole_density(cell);

    for i in [cell.len() / 10, 9 * cell.len() / 10] {
        let charge = n[i] - p[i] - cell.ndop[i];
        println!("node {i}: n = {:.4e}, p = {:.4e}, n - p - N = {:.3e}", n[i], p[i], charge);
        assert!(charge.abs() < 1e-2 * cell.ndop[i].abs());
    }
}

#[test]
fn potential_falls_from_n_to_p() {
    let problem = pn_problem_def(120, 0.0, false).unwrap();
    let pot = solve_equilibrium(&problem.cell, &SolverConfig::default()).unwrap();
    let (phi0, phi_l) = boundary_eq(&problem.cell);
    assert!(phi0 > phi_l);
    for w in pot.phi.as_slice().windows(2) {
        assert!(w[1] <= w[0] + 1e-12);
    }
    // Built-in voltage of the n+/p silicon junction in kT/q.
    let vbi = problem.scales.volts(phi0 - phi_l);
    assert!(vbi > 0.8 && vbi < 1.0, "Vbi = {vbi}");
}

#[test]
fn converged_state_is_a_fixed_point() {
    let problem = pn_problem_def(100, 0.0, false).unwrap();
    let cell = &problem.cell;
    let config = SolverConfig::default();
    let first = solve_equilibrium_from(cell, &equilibrium_guess(cell), &config).unwrap();
    assert!(first.iterations > 1);
    assert_eq!(first.residual_history.len() as u32, first.iterations + 1);

    let again = solve_equilibrium_from(cell, &first.potentials, &config).unwrap();
    assert!(again.iterations <= 1, "warm start took {} iterations", again.iterations);
    for (a, b) in again.potentials.phi.iter().zip(first.potentials.phi.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-8);
    }
}
