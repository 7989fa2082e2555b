//! # Painting Summary Matrices
//!
//! `<prefix>.viterbiLengths` and `<prefix>.viterbiCounts`: one row per target
//! haplotype, one space-delimited column per donor haplotype.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{AbacusError, Result};
use crate::io::text::{create_writer, open_reader};
use crate::io::with_suffix;
use crate::model::blocks::{PaintingSummaries, SummaryMatrix};

pub const LENGTHS_SUFFIX: &str = ".viterbiLengths";
pub const COUNTS_SUFFIX: &str = ".viterbiCounts";

pub fn lengths_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, LENGTHS_SUFFIX)
}

pub fn counts_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, COUNTS_SUFFIX)
}

/// Write a matrix, one space-delimited row per line
pub fn write_matrix(path: &Path, matrix: &SummaryMatrix) -> Result<()> {
    let mut writer = create_writer(path)?;
    for row in matrix.rows() {
        let mut first = true;
        for value in row {
            if !first {
                write!(writer, " ")?;
            }
            write!(writer, "{}", value)?;
            first = false;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read a square matrix of finite, non-negative values.
///
/// With `expected_n`, the matrix must have exactly that many rows and columns.
pub fn read_matrix(path: &Path, expected_n: Option<usize>) -> Result<SummaryMatrix> {
    let reader = open_reader(path)?;
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|tok| match tok.parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
                _ => Err(AbacusError::parse(
                    path,
                    line_num + 1,
                    format!("Invalid summary value '{}'", tok),
                )),
            })
            .collect::<Result<Vec<f64>>>()?;
        if let Some(width) = rows.first().map(Vec::len) {
            if row.len() != width {
                return Err(AbacusError::parse(
                    path,
                    line_num + 1,
                    format!("Expected {} values, got {}", width, row.len()),
                ));
            }
        }
        rows.push(row);
    }

    if let Some(n) = expected_n {
        if rows.len() != n {
            return Err(AbacusError::invalid_data(format!(
                "{} has {} rows, expected one per haplotype ({})",
                path.display(),
                rows.len(),
                n
            )));
        }
    }
    SummaryMatrix::from_rows(rows).map_err(|e| {
        AbacusError::invalid_data(format!("{} is not square: {}", path.display(), e))
    })
}

/// Write both summary matrices next to `prefix`
pub fn write_summaries(prefix: &Path, summaries: &PaintingSummaries) -> Result<()> {
    write_matrix(&lengths_path(prefix), &summaries.lengths)?;
    write_matrix(&counts_path(prefix), &summaries.counts)?;
    Ok(())
}

/// Read a lengths/counts pair for an `n_haps` panel
pub fn read_summaries(lengths: &Path, counts: &Path, n_haps: usize) -> Result<PaintingSummaries> {
    Ok(PaintingSummaries {
        lengths: read_matrix(lengths, Some(n_haps))?,
        counts: read_matrix(counts, Some(n_haps))?,
    })
}

/// Elementwise sum of two summary files, e.g. pooling chromosomes
pub fn combine(first: &Path, second: &Path, output: &Path) -> Result<()> {
    let a = read_matrix(first, None)?;
    let b = read_matrix(second, None)?;
    let sum = a.add(&b)?;
    write_matrix(output, &sum)?;
    info!(n = sum.n(), output = ?output, "Combined summary matrices");
    Ok(())
}
