//! One-dimensional drift-diffusion solver for photovoltaic devices.
//!
//! The pipeline solves the zero-bias equilibrium, sweeps the applied voltage
//! from short circuit towards open circuit with a damped Newton method, and
//! optionally differentiates every swept current with respect to the device
//! parameters by implicit differentiation of the converged states.
//!
//! All solver inputs are normalized, see [`scales`].

pub mod analysis;
pub mod config;
pub mod discretization;
pub mod error;
pub mod models;
pub mod numerics;
pub mod physics;
pub mod processing;
pub mod scales;

pub use analysis::{
    run_iv_sweep, run_iv_sweep_with_sensitivity, solve_equilibrium, solve_equilibrium_from,
    DerivativeMap, DerivativeTensor, IvSweep, ParamGradient, Solved, SweepResult, SweepStatus,
};
pub use config::{PeakPowerConfig, SimulationConfig, SweepConfig};
pub use error::{DeviceError, Error, Result};
pub use models::cell::{Cell, Param};
pub use numerics::newton::{DivergenceCause, SolverConfig, SolverDivergence};
pub use physics::potentials::Potentials;
