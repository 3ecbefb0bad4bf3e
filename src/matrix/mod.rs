//! Square integer matrices
//!
//! A [`Matrix`] owns one contiguous row-major buffer. All accessors are
//! bounds-checked and return an error instead of panicking, since indices
//! arriving from workers are untrusted.

pub mod source;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use source::MatrixSource;

/// Matrix element type
pub type Element = i64;

/// Square N×N matrix of integers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matrix {
    dimension: usize,
    data: Vec<Element>,
}

impl Matrix {
    /// Create an all-zero matrix
    pub fn zeros(dimension: usize) -> Self {
        Self {
            dimension,
            data: vec![0; dimension * dimension],
        }
    }

    /// Create an identity matrix
    pub fn identity(dimension: usize) -> Self {
        let mut matrix = Self::zeros(dimension);
        for i in 0..dimension {
            matrix.data[i * dimension + i] = 1;
        }
        matrix
    }

    /// Create a matrix from row-major data
    pub fn from_vec(dimension: usize, data: Vec<Element>) -> Result<Self> {
        if data.len() != dimension * dimension {
            anyhow::bail!(
                "Data length {} does not match dimensions {}x{}",
                data.len(),
                dimension,
                dimension
            );
        }
        Ok(Self { dimension, data })
    }

    /// Create a matrix from a list of rows
    ///
    /// Rejects ragged input and non-square shapes.
    pub fn from_rows(rows: Vec<Vec<Element>>) -> Result<Self> {
        let dimension = rows.len();
        let mut data = Vec::with_capacity(dimension * dimension);

        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dimension {
                anyhow::bail!(
                    "Matrix must be square: row {} has {} values, expected {}",
                    i,
                    row.len(),
                    dimension
                );
            }
            data.extend(row);
        }

        Ok(Self { dimension, data })
    }

    /// Build a matrix by evaluating `f(row, col)` for every cell
    pub fn from_fn(dimension: usize, mut f: impl FnMut(usize, usize) -> Element) -> Self {
        let data = (0..dimension * dimension)
            .map(|k| f(k / dimension, k % dimension))
            .collect();
        Self { dimension, data }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of cells (N²)
    pub fn cell_count(&self) -> usize {
        self.data.len()
    }

    /// Set a value at a specific position
    pub fn set(&mut self, row: usize, col: usize, value: Element) -> Result<()> {
        let index = self.index(row, col)?;
        self.data[index] = value;
        Ok(())
    }

    /// Get a row as a slice
    pub fn row(&self, row: usize) -> Result<&[Element]> {
        if row >= self.dimension {
            anyhow::bail!("Row index {} out of bounds for {} rows", row, self.dimension);
        }
        let start = row * self.dimension;
        Ok(&self.data[start..start + self.dimension])
    }

    /// Copy a column into a new vector
    pub fn column(&self, col: usize) -> Result<Vec<Element>> {
        if col >= self.dimension {
            anyhow::bail!("Column index {} out of bounds for {} cols", col, self.dimension);
        }
        Ok(self
            .data
            .iter()
            .skip(col)
            .step_by(self.dimension)
            .copied()
            .collect())
    }

    /// Iterate over rows
    pub fn rows(&self) -> impl Iterator<Item = &[Element]> {
        // chunks(0) panics; an empty matrix simply has no rows
        self.data.chunks(self.dimension.max(1))
    }

    /// Local reference product `self * other`
    ///
    /// Uses the same wrapping dot product as the workers, so a distributed
    /// product can be compared against it cell for cell.
    pub fn multiply(&self, other: &Matrix) -> Result<Matrix> {
        if self.dimension != other.dimension {
            anyhow::bail!(
                "Matrix dimensions incompatible: {}x{} * {}x{}",
                self.dimension,
                self.dimension,
                other.dimension,
                other.dimension
            );
        }

        let n = self.dimension;
        let mut result = Matrix::zeros(n);
        for i in 0..n {
            let row = self.row(i)?;
            for j in 0..n {
                result.data[i * n + j] = dot(row, &other.column(j)?);
            }
        }

        Ok(result)
    }

    fn index(&self, row: usize, col: usize) -> Result<usize> {
        if row >= self.dimension || col >= self.dimension {
            anyhow::bail!(
                "Index out of bounds: ({}, {}) for matrix {}x{}",
                row,
                col,
                self.dimension,
                self.dimension
            );
        }
        Ok(row * self.dimension + col)
    }
}

/// Dot product with two's-complement wrapping
///
/// Callers guarantee equal lengths; extra elements of the longer slice are
/// ignored.
pub fn dot(a: &[Element], b: &[Element]) -> Element {
    a.iter()
        .zip(b)
        .fold(0, |acc: Element, (&x, &y)| acc.wrapping_add(x.wrapping_mul(y)))
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .data
            .iter()
            .map(|v| v.to_string().len())
            .max()
            .unwrap_or(1);

        for row in self.rows() {
            let line = row
                .iter()
                .map(|v| format!("{:>width$}", v, width = width))
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
