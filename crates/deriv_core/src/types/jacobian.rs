//! Jacobian block storage.
//!
//! Blocks are declared in one of two forms: a dense row-major matrix, or a
//! sparse (rows, cols, values) index triple with an explicit dense shape.
//! Two blocks are comparable only when their dense shapes match, so sparse
//! blocks are densified before any comparison.

use crate::types::error::CheckError;

/// Dense row-major Jacobian block of shape `(rows, cols)`.
///
/// Row count equals the flattened output size, column count the flattened
/// input size of the pair the block belongs to.
///
/// # Examples
/// ```
/// use deriv_core::types::DenseBlock;
///
/// let mut block = DenseBlock::zeros(2, 2);
/// block.set(0, 1, 3.0);
/// assert_eq!(block.get(0, 1), 3.0);
/// assert_eq!(block.norm(), 3.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DenseBlock {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl DenseBlock {
    /// Creates a zero-filled block.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Creates a block from row-major data.
    ///
    /// # Errors
    /// [`CheckError::ArrayLength`] when `data.len() != rows * cols`.
    pub fn from_row_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self, CheckError> {
        if data.len() != rows * cols {
            return Err(CheckError::ArrayLength {
                name: "dense block".to_string(),
                expected: rows * cols,
                actual: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Creates a 1x1 block holding a single value.
    pub fn scalar(value: f64) -> Self {
        Self {
            rows: 1,
            cols: 1,
            data: vec![value],
        }
    }

    /// Creates an n-by-n identity block.
    pub fn identity(n: usize) -> Self {
        let mut block = Self::zeros(n, n);
        for i in 0..n {
            block.set(i, i, 1.0);
        }
        block
    }

    /// Row count.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Column count.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)` shape.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Element at `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    /// Sets the element at `(i, j)`.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.cols + j] = value;
    }

    /// Overwrites column `j` with the given values.
    pub fn set_column(&mut self, j: usize, column: &[f64]) {
        for (i, &v) in column.iter().enumerate() {
            self.set(i, j, v);
        }
    }

    /// Overwrites row `i` with the given values.
    pub fn set_row(&mut self, i: usize, row: &[f64]) {
        self.data[i * self.cols..(i + 1) * self.cols].copy_from_slice(row);
    }

    /// Row-major data slice.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Entrywise (Frobenius) norm.
    pub fn norm(&self) -> f64 {
        self.data.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Entrywise difference, `None` when shapes differ.
    pub fn sub(&self, other: &DenseBlock) -> Option<DenseBlock> {
        if self.shape() != other.shape() {
            return None;
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a - b)
            .collect();
        Some(DenseBlock {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    /// Matrix-vector product `J x`.
    pub fn matvec(&self, x: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.rows];
        for i in 0..self.rows {
            let row = &self.data[i * self.cols..(i + 1) * self.cols];
            out[i] = row.iter().zip(x).map(|(a, b)| a * b).sum();
        }
        out
    }

    /// Transposed matrix-vector product `J^T y`.
    pub fn matvec_transposed(&self, y: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.cols];
        for i in 0..self.rows {
            for j in 0..self.cols {
                out[j] += self.get(i, j) * y[i];
            }
        }
        out
    }

    /// Restricts the block to the given row and column subsets.
    pub fn subset(&self, row_idx: &[usize], col_idx: &[usize]) -> DenseBlock {
        let mut out = DenseBlock::zeros(row_idx.len(), col_idx.len());
        for (oi, &i) in row_idx.iter().enumerate() {
            for (oj, &j) in col_idx.iter().enumerate() {
                out.set(oi, oj, self.get(i, j));
            }
        }
        out
    }
}

/// A Jacobian block as declared by a component.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JacobianBlock {
    /// A literal dense block.
    Dense(DenseBlock),
    /// Sparse index triples with an explicit dense shape.
    Sparse {
        /// Dense shape `(rows, cols)`.
        shape: (usize, usize),
        /// Row index of each stored entry.
        rows: Vec<usize>,
        /// Column index of each stored entry.
        cols: Vec<usize>,
        /// Stored entry values.
        values: Vec<f64>,
    },
}

impl JacobianBlock {
    /// Wraps a dense block.
    pub fn dense(block: DenseBlock) -> Self {
        JacobianBlock::Dense(block)
    }

    /// Builds a sparse block from index triples.
    ///
    /// # Errors
    /// [`CheckError::SparseLayout`] when the triple lengths disagree or an
    /// index falls outside the declared shape.
    pub fn sparse(
        shape: (usize, usize),
        rows: Vec<usize>,
        cols: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self, CheckError> {
        if rows.len() != cols.len() || rows.len() != values.len() {
            return Err(CheckError::SparseLayout {
                reason: format!(
                    "triple lengths disagree: {} rows, {} cols, {} values",
                    rows.len(),
                    cols.len(),
                    values.len()
                ),
            });
        }
        for (&r, &c) in rows.iter().zip(&cols) {
            if r >= shape.0 || c >= shape.1 {
                return Err(CheckError::SparseLayout {
                    reason: format!(
                        "index ({}, {}) outside declared shape {}x{}",
                        r, c, shape.0, shape.1
                    ),
                });
            }
        }
        Ok(JacobianBlock::Sparse {
            shape,
            rows,
            cols,
            values,
        })
    }

    /// The dense `(rows, cols)` shape.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            JacobianBlock::Dense(b) => b.shape(),
            JacobianBlock::Sparse { shape, .. } => *shape,
        }
    }

    /// Densifies the block. Repeated sparse indices accumulate.
    pub fn densify(&self) -> DenseBlock {
        match self {
            JacobianBlock::Dense(b) => b.clone(),
            JacobianBlock::Sparse {
                shape,
                rows,
                cols,
                values,
            } => {
                let mut out = DenseBlock::zeros(shape.0, shape.1);
                for ((&r, &c), &v) in rows.iter().zip(cols).zip(values) {
                    out.set(r, c, out.get(r, c) + v);
                }
                out
            }
        }
    }
}
