//! Block tridiagonal matrices and their direct solver.
//!
//! A 1-D stencil couples every node only to its two neighbours, so the Jacobian
//! is block tridiagonal with one `m x m` block per node pair. The factorization
//! is the block Thomas algorithm with a partially pivoted LU of every pivot
//! block.

use nalgebra::{DMatrix, DVector, Dyn, LU};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinearSolveError {
    #[error("pivot block {block} is singular")]
    SingularBlock { block: usize },
    #[error("pivot block {block} contains non-finite entries")]
    NonFinite { block: usize },
    #[error("right-hand side has {actual} rows, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockTridiagonal {
    block: usize,
    /// `lower[i]` couples row block `i + 1` to column block `i`.
    pub lower: Vec<DMatrix<f64>>,
    pub diag: Vec<DMatrix<f64>>,
    /// `upper[i]` couples row block `i` to column block `i + 1`.
    pub upper: Vec<DMatrix<f64>>,
}

impl BlockTridiagonal {
    pub fn zeros(num_blocks: usize, block: usize) -> Self {
        let zero = DMatrix::zeros(block, block);
        Self {
            block,
            lower: vec![zero.clone(); num_blocks.saturating_sub(1)],
            diag: vec![zero.clone(); num_blocks],
            upper: vec![zero; num_blocks.saturating_sub(1)],
        }
    }

    pub fn block_size(&self) -> usize {
        self.block
    }

    pub fn num_blocks(&self) -> usize {
        self.diag.len()
    }

    pub fn dim(&self) -> usize {
        self.block * self.diag.len()
    }

    /// Block coupling row block `i` to column block `j`, `|i - j| <= 1`.
    pub fn block_mut(&mut self, i: usize, j: usize) -> &mut DMatrix<f64> {
        if j + 1 == i {
            &mut self.lower[j]
        } else if i + 1 == j {
            &mut self.upper[i]
        } else {
            &mut self.diag[i]
        }
    }

    pub fn mul_vector(&self, x: &DVector<f64>) -> DVector<f64> {
        let m = self.block;
        let n = self.num_blocks();
        let mut y = DVector::zeros(self.dim());
        for i in 0..n {
            let mut yi = &self.diag[i] * x.rows(i * m, m);
            if i > 0 {
                yi += &self.lower[i - 1] * x.rows((i - 1) * m, m);
            }
            if i + 1 < n {
                yi += &self.upper[i] * x.rows((i + 1) * m, m);
            }
            y.rows_mut(i * m, m).copy_from(&yi);
        }
        y
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let m = self.block;
        let n = self.num_blocks();
        let mut a = DMatrix::zeros(self.dim(), self.dim());
        for i in 0..n {
            a.view_mut((i * m, i * m), (m, m)).copy_from(&self.diag[i]);
            if i + 1 < n {
                a.view_mut((i * m, (i + 1) * m), (m, m)).copy_from(&self.upper[i]);
                a.view_mut(((i + 1) * m, i * m), (m, m)).copy_from(&self.lower[i]);
            }
        }
        a
    }

    /// Scales every row to unit max-norm and returns the applied factors.
    ///
    /// Rows of zeros keep a factor of one.
    pub fn equilibrate_rows(&mut self) -> DVector<f64> {
        let m = self.block;
        let n = self.num_blocks();
        let mut scale = DVector::from_element(self.dim(), 1.0);
        for i in 0..n {
            for a in 0..m {
                let mut amax = self.diag[i].row(a).amax();
                if i > 0 {
                    amax = amax.max(self.lower[i - 1].row(a).amax());
                }
                if i + 1 < n {
                    amax = amax.max(self.upper[i].row(a).amax());
                }
                if amax > 0.0 && amax.is_finite() {
                    let s = amax.recip();
                    scale[i * m + a] = s;
                    self.diag[i].row_mut(a).scale_mut(s);
                    if i > 0 {
                        self.lower[i - 1].row_mut(a).scale_mut(s);
                    }
                    if i + 1 < n {
                        self.upper[i].row_mut(a).scale_mut(s);
                    }
                }
            }
        }
        scale
    }

    pub fn factor(&self) -> Result<BlockFactorization, LinearSolveError> {
        let n = self.num_blocks();
        let mut pivots: Vec<LU<f64, Dyn, Dyn>> = Vec::with_capacity(n);
        let mut coupling: Vec<DMatrix<f64>> = Vec::with_capacity(n.saturating_sub(1));

        for i in 0..n {
            let d = if i == 0 {
                self.diag[0].clone()
            } else {
                &self.diag[i] - &self.lower[i - 1] * &coupling[i - 1]
            };
            if d.iter().any(|v| !v.is_finite()) {
                return Err(LinearSolveError::NonFinite { block: i });
            }
            let lu = d.lu();
            if !lu.is_invertible() {
                return Err(LinearSolveError::SingularBlock { block: i });
            }
            if i + 1 < n {
                let c = lu
                    .solve(&self.upper[i])
                    .ok_or(LinearSolveError::SingularBlock { block: i })?;
                coupling.push(c);
            }
            pivots.push(lu);
        }

        Ok(BlockFactorization {
            block: self.block,
            pivots,
            lower: self.lower.clone(),
            coupling,
        })
    }

    /// Row-equilibrates, then factors.
    pub fn factor_equilibrated(mut self) -> Result<ScaledFactorization, LinearSolveError> {
        let row_scale = self.equilibrate_rows();
        let lu = self.factor()?;
        Ok(ScaledFactorization { lu, row_scale })
    }
}

/// Factorization of a row-equilibrated matrix. Solves the original system.
#[derive(Debug, Clone)]
pub struct ScaledFactorization {
    lu: BlockFactorization,
    row_scale: DVector<f64>,
}

impl ScaledFactorization {
    pub fn dim(&self) -> usize {
        self.lu.dim()
    }

    pub fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, LinearSolveError> {
        if rhs.len() != self.dim() {
            return Err(LinearSolveError::DimensionMismatch {
                expected: self.dim(),
                actual: rhs.len(),
            });
        }
        self.lu.solve(&rhs.component_mul(&self.row_scale))
    }

    pub fn solve_matrix(&self, rhs: &DMatrix<f64>) -> Result<DMatrix<f64>, LinearSolveError> {
        let mut scaled = rhs.clone();
        for (mut row, &s) in scaled.row_iter_mut().zip(self.row_scale.iter()) {
            row.scale_mut(s);
        }
        self.lu.solve_matrix(&scaled)
    }
}

/// Factored block tridiagonal matrix, reusable for any number of right-hand sides.
#[derive(Debug, Clone)]
pub struct BlockFactorization {
    block: usize,
    pivots: Vec<LU<f64, Dyn, Dyn>>,
    lower: Vec<DMatrix<f64>>,
    coupling: Vec<DMatrix<f64>>,
}

impl BlockFactorization {
    pub fn dim(&self) -> usize {
        self.block * self.pivots.len()
    }

    pub fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, LinearSolveError> {
        let b = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
        let x = self.solve_matrix(&b)?;
        Ok(DVector::from_column_slice(x.as_slice()))
    }

    /// Solves for every column of `rhs` at once.
    pub fn solve_matrix(&self, rhs: &DMatrix<f64>) -> Result<DMatrix<f64>, LinearSolveError> {
        let m = self.block;
        let n = self.pivots.len();
        if rhs.nrows() != self.dim() {
            return Err(LinearSolveError::DimensionMismatch {
                expected: self.dim(),
                actual: rhs.nrows(),
            });
        }

        let mut y: Vec<DMatrix<f64>> = Vec::with_capacity(n);
        for i in 0..n {
            let mut bi = rhs.rows(i * m, m).into_owned();
            if i > 0 {
                bi -= &self.lower[i - 1] * &y[i - 1];
            }
            let yi = self.pivots[i]
                .solve(&bi)
                .ok_or(LinearSolveError::SingularBlock { block: i })?;
            y.push(yi);
        }

        let mut x = DMatrix::zeros(rhs.nrows(), rhs.ncols());
        for i in (0..n).rev() {
            let xi = if i + 1 < n {
                &y[i] - &self.coupling[i] * x.rows((i + 1) * m, m)
            } else {
                y[i].clone()
            };
            x.rows_mut(i * m, m).copy_from(&xi);
        }
        Ok(x)
    }
}
