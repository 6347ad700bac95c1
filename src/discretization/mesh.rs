use crate::error::DeviceError;

/// The 1-D computational grid.
///
/// Node `i` owns the unknowns of index `i`. Face `i` sits between nodes `i`
/// and `i + 1` and has length `spacing[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub nodes: Vec<f64>,
    pub spacing: Vec<f64>,
}

impl Grid {
    pub fn new(nodes: Vec<f64>) -> Result<Self, DeviceError> {
        if nodes.len() < 2 {
            return Err(DeviceError::TooFewNodes(nodes.len()));
        }
        if let Some(index) = nodes.iter().position(|x| !x.is_finite()) {
            return Err(DeviceError::NonFiniteGrid { index });
        }
        let spacing: Vec<f64> = nodes.windows(2).map(|w| w[1] - w[0]).collect();
        if let Some(index) = spacing.iter().position(|&h| h <= 0.0) {
            return Err(DeviceError::GridNotIncreasing { index: index + 1 });
        }
        Ok(Self { nodes, spacing })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_faces(&self) -> usize {
        self.spacing.len()
    }

    pub fn length(&self) -> f64 {
        self.nodes[self.nodes.len() - 1] - self.nodes[0]
    }

    /// Width of the control volume around interior node `i`.
    pub fn control_width(&self, i: usize) -> f64 {
        0.5 * (self.spacing[i - 1] + self.spacing[i])
    }

    /// Re-checks the invariants, for grids assembled by hand.
    pub fn validate(&self) -> Result<(), DeviceError> {
        Grid::new(self.nodes.clone()).map(|_| ())
    }

    pub fn min_spacing(&self) -> f64 {
        self.spacing.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn max_spacing(&self) -> f64 {
        self.spacing.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }
}
