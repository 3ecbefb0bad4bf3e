//! Matrix input sources
//!
//! The coordinator only needs two N×N matrices; where they come from is a
//! configuration choice.

use super::{Element, Matrix};
use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Where the input matrices A and B come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatrixSource {
    /// Fixed example model: `A[i][j] = i + j`, `B[i][j] = i * j`
    Example,
    /// Seeded uniform values in `min..=max`
    Random { seed: u64, min: Element, max: Element },
    /// Two text files, one row per line
    Files { a: PathBuf, b: PathBuf },
    /// 2N² whitespace-separated integers on stdin, A then B
    Stdin,
}

impl Default for MatrixSource {
    fn default() -> Self {
        Self::Example
    }
}

impl MatrixSource {
    /// Produce (A, B) for the given dimension
    pub fn load(&self, dimension: usize) -> Result<(Matrix, Matrix)> {
        match self {
            Self::Example => Ok(example_pair(dimension)),
            Self::Random { seed, min, max } => random_pair(dimension, *seed, *min, *max),
            Self::Files { a, b } => {
                let a = load_from_file(a).context("Failed to load matrix A")?;
                let b = load_from_file(b).context("Failed to load matrix B")?;
                check_dimension("A", &a, dimension)?;
                check_dimension("B", &b, dimension)?;
                Ok((a, b))
            }
            Self::Stdin => read_pair(std::io::stdin().lock(), dimension),
        }
    }
}

/// Example model matrices
pub fn example_pair(dimension: usize) -> (Matrix, Matrix) {
    let a = Matrix::from_fn(dimension, |i, j| (i + j) as Element);
    let b = Matrix::from_fn(dimension, |i, j| (i * j) as Element);
    (a, b)
}

/// Reproducible random matrices
pub fn random_pair(dimension: usize, seed: u64, min: Element, max: Element) -> Result<(Matrix, Matrix)> {
    if min > max {
        anyhow::bail!("Random value range is empty: min {} > max {}", min, max);
    }
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let a = Matrix::from_fn(dimension, |_, _| rng.gen_range(min..=max));
    let b = Matrix::from_fn(dimension, |_, _| rng.gen_range(min..=max));
    Ok((a, b))
}

/// Read A then B as 2N² whitespace-separated integers
pub fn read_pair<R: Read>(mut reader: R, dimension: usize) -> Result<(Matrix, Matrix)> {
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .context("Failed to read matrix values")?;

    let values = contents
        .split_whitespace()
        .enumerate()
        .map(|(i, token)| {
            token
                .parse::<Element>()
                .with_context(|| format!("Invalid integer '{}' at position {}", token, i + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    let cells = dimension * dimension;
    if values.len() != 2 * cells {
        anyhow::bail!(
            "Expected {} values ({} for A and {} for B), got {}",
            2 * cells,
            cells,
            cells,
            values.len()
        );
    }

    let (a, b) = values.split_at(cells);
    Ok((
        Matrix::from_vec(dimension, a.to_vec())?,
        Matrix::from_vec(dimension, b.to_vec())?,
    ))
}

/// Load a matrix from a text file
///
/// Format: space-separated values, one row per line. Blank lines are skipped.
pub fn load_from_file(path: &Path) -> Result<Matrix> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read matrix file: {}", path.display()))?;
    parse_matrix(&contents).with_context(|| format!("Failed to parse matrix file: {}", path.display()))
}

/// Parse the text matrix format
pub fn parse_matrix(contents: &str) -> Result<Matrix> {
    let mut rows = Vec::new();

    for (line_num, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let row = trimmed
            .split_whitespace()
            .map(|s| s.parse::<Element>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to parse value on line {}", line_num + 1))?;

        rows.push(row);
    }

    if rows.is_empty() {
        anyhow::bail!("Matrix file is empty");
    }

    Matrix::from_rows(rows)
}

/// Save a matrix in the text format read by [`load_from_file`]
pub fn save_to_file(matrix: &Matrix, path: &Path) -> Result<()> {
    let contents: String = matrix
        .rows()
        .map(|row| {
            let mut line = row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ");
            line.push('\n');
            line
        })
        .collect();

    fs::write(path, contents).with_context(|| format!("Failed to write matrix file: {}", path.display()))
}

fn check_dimension(name: &str, matrix: &Matrix, dimension: usize) -> Result<()> {
    if matrix.dimension() != dimension {
        anyhow::bail!(
            "Matrix {} is {}x{} but dimension {} was requested",
            name,
            matrix.dimension(),
            matrix.dimension(),
            dimension
        );
    }
    Ok(())
}
