pub mod equilibrium;
pub mod sensitivity;
pub mod sweep;

pub use equilibrium::{equilibrium_guess, solve_equilibrium, solve_equilibrium_from, Solved};
pub use sensitivity::{
    run_iv_sweep_with_sensitivity, DerivativeMap, DerivativeTensor, ParamGradient,
};
pub use sweep::{run_iv_sweep, voltage_increment, IvSweep, SweepResult, SweepStatus};
