pub mod bc;
pub mod carriers;
pub mod current;
pub mod flux;
pub mod potentials;
pub mod residual;

use crate::numerics::block::BlockTridiagonal;
use nalgebra::DVector;

/// Discretized nonlinear system `F(x) = 0` with a nodewise interleaved state.
pub trait PhysicsModel {
    /// Unknowns per grid node.
    fn num_variables(&self) -> usize;

    fn num_nodes(&self) -> usize;

    /// Residual vector `F(x)`, one block of `num_variables` rows per node.
    fn residual(&self, x: &DVector<f64>) -> DVector<f64>;

    /// Jacobian `dF/dx`. Each node only couples to its two neighbours.
    fn jacobian(&self, x: &DVector<f64>) -> BlockTridiagonal;
}
