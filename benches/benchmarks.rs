use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use ddpv::analysis::equilibrium_guess;
use ddpv::models::pn::pn::pn_problem_def;
use ddpv::numerics::newton::NewtonSolver;
use ddpv::physics::bc::boundary;
use ddpv::physics::residual::{DriftDiffusion, Equilibrium};
use ddpv::physics::PhysicsModel;
use ddpv::{
    run_iv_sweep_with_sensitivity, solve_equilibrium, Param, SimulationConfig, SolverConfig,
    SweepConfig,
};

fn problem_sizes() -> Vec<usize> {
    vec![300, 1000]
}

fn solver_sizes() -> Vec<usize> {
    vec![100, 300]
}

fn bench_jacobian(c: &mut Criterion) {
    let mut group = c.benchmark_group("jacobian");
    for &size in &problem_sizes() {
        let problem = pn_problem_def(size, 1e21, false).unwrap();
        let cell = &problem.cell;
        let model = DriftDiffusion::new(cell, boundary(cell, 0.0));
        let x = equilibrium_guess(cell).to_interleaved();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                let jac = model.jacobian(std::hint::black_box(&x));
                std::hint::black_box(jac);
            });
        });
    }
    group.finish();
}

fn bench_block_factor(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_factor");
    for &size in &problem_sizes() {
        let problem = pn_problem_def(size, 1e21, false).unwrap();
        let cell = &problem.cell;
        let model = DriftDiffusion::new(cell, boundary(cell, 0.0));
        let x = equilibrium_guess(cell).to_interleaved();
        let jac = model.jacobian(&x);
        let rhs = model.residual(&x);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter_batched(
                || jac.clone(),
                |jac| {
                    let lu = jac.factor_equilibrated().unwrap();
                    std::hint::black_box(lu.solve(&rhs).unwrap());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_equilibrium(c: &mut Criterion) {
    let mut group = c.benchmark_group("equilibrium");
    for &size in &solver_sizes() {
        let problem = pn_problem_def(size, 0.0, false).unwrap();
        let cell = &problem.cell;
        let model = Equilibrium::new(cell, boundary(cell, 0.0));
        let init = equilibrium_guess(cell).phi;
        let solver = NewtonSolver::new(SolverConfig::default());
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter_batched(
                || init.clone(),
                |u| {
                    let _ = solver.solve(&model, u);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_sensitivity(c: &mut Criterion) {
    let mut group = c.benchmark_group("sensitivity");
    group.sample_size(10);
    for &size in &solver_sizes() {
        let problem = pn_problem_def(size, 1e21, false).unwrap();
        let cell = &problem.cell;
        let eq = solve_equilibrium(cell, &SolverConfig::default()).unwrap();
        let config =
            SimulationConfig::default().with_sweep(SweepConfig::default().with_step_cap(10));
        let params = [Param::G, Param::Ndop, Param::Snl];
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                let out = run_iv_sweep_with_sensitivity(cell, &eq, &params, &config);
                std::hint::black_box(out.ok());
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_jacobian,
    bench_block_factor,
    bench_equilibrium,
    bench_sensitivity
);
criterion_main!(benches);
