//! # Genetic Map
//!
//! This module provides:
//! - `GeneticMap`: cumulative genetic position (cM) for every SNP of the panel
//! - `RecombinationMap`: a HapMap-format recombination map used to build a
//!   `GeneticMap` for arbitrary SNP positions

use std::io::{BufRead, Write};
use std::path::Path;

use tracing::info_span;

use crate::data::marker::SnpIdx;
use crate::error::{AbacusError, Result};
use crate::io::text::{create_writer, open_reader};

/// Base pairs per megabase, the unit of HapMap recombination rates
const BP_PER_MB: f64 = 1_000_000.0;

/// Cumulative genetic positions (cM), one per SNP, non-decreasing
#[derive(Clone, Debug, PartialEq)]
pub struct GeneticMap {
    cm: Vec<f64>,
}

impl GeneticMap {
    /// Create from per-SNP cumulative positions.
    ///
    /// Rejects non-finite and decreasing values so block lengths can never be negative.
    pub fn new(cm: Vec<f64>) -> Result<Self> {
        if let Some(i) = cm.iter().position(|v| !v.is_finite()) {
            return Err(AbacusError::invalid_data(format!(
                "Genetic map value at SNP {} is not finite",
                i
            )));
        }
        if let Some(i) = (1..cm.len()).find(|&i| cm[i] < cm[i - 1]) {
            return Err(AbacusError::invalid_data(format!(
                "Genetic map decreases at SNP {} ({} < {})",
                i,
                cm[i],
                cm[i - 1]
            )));
        }
        Ok(Self { cm })
    }

    /// Load from a file with one cumulative cM value per line
    pub fn from_file(path: &Path) -> Result<Self> {
        info_span!("genetic_map_from_file", path = ?path).in_scope(|| {
            let reader = open_reader(path)?;
            let mut cm = Vec::new();
            for (line_num, line) in reader.lines().enumerate() {
                let line = line?;
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let value: f64 = line.parse().map_err(|_| {
                    AbacusError::parse(
                        path,
                        line_num + 1,
                        format!("Invalid genetic position '{}'", line),
                    )
                })?;
                cm.push(value);
            }
            Self::new(cm)
        })
    }

    /// Write one value per line
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let mut writer = create_writer(path)?;
        for value in &self.cm {
            writeln!(writer, "{}", value)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Number of SNPs covered
    pub fn len(&self) -> usize {
        self.cm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cm.is_empty()
    }

    /// Genetic position (cM) of a SNP
    #[inline]
    pub fn cm(&self, snp: SnpIdx) -> f64 {
        self.cm[snp.as_usize()]
    }

    /// Genetic distance (cM) from `from` to `to`
    #[inline]
    pub fn distance_cm(&self, from: SnpIdx, to: SnpIdx) -> f64 {
        self.cm(to) - self.cm(from)
    }

    /// Total span from the first to the last SNP
    pub fn span(&self) -> f64 {
        match (self.cm.first(), self.cm.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0.0,
        }
    }

    /// All genetic positions
    pub fn positions(&self) -> &[f64] {
        &self.cm
    }
}

/// One row of a HapMap-format recombination map
#[derive(Clone, Copy, Debug, PartialEq)]
struct MappedPosition {
    pos: u32,
    rate_cm_per_mb: f64,
    cumulative_cm: f64,
}

/// HapMap-format recombination map: `position rate(cM/Mb) cumulative(cM)`
#[derive(Clone, Debug)]
pub struct RecombinationMap {
    rows: Vec<MappedPosition>,
}

impl RecombinationMap {
    /// Load from a HapMap-format file. The first line is a header.
    pub fn from_hapmap_file(path: &Path) -> Result<Self> {
        let reader = open_reader(path)?;
        let mut rows = Vec::new();

        for (line_num, line) in reader.lines().enumerate().skip(1) {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 3 {
                return Err(AbacusError::parse(
                    path,
                    line_num + 1,
                    format!("Expected 3 columns, got {}", parts.len()),
                ));
            }

            let pos: u32 = parts[0]
                .parse()
                .map_err(|_| AbacusError::parse(path, line_num + 1, "Invalid position"))?;
            let rate_cm_per_mb: f64 = parts[1]
                .parse()
                .map_err(|_| AbacusError::parse(path, line_num + 1, "Invalid recombination rate"))?;
            let cumulative_cm: f64 = parts[2]
                .parse()
                .map_err(|_| AbacusError::parse(path, line_num + 1, "Invalid genetic position"))?;

            if !rate_cm_per_mb.is_finite() || !cumulative_cm.is_finite() {
                return Err(AbacusError::parse(path, line_num + 1, "Value is not finite"));
            }

            rows.push(MappedPosition {
                pos,
                rate_cm_per_mb,
                cumulative_cm,
            });
        }

        Self::from_rows(rows)
    }

    fn from_rows(rows: Vec<MappedPosition>) -> Result<Self> {
        if rows.is_empty() {
            return Err(AbacusError::invalid_data("Recombination map has no rows"));
        }
        for i in 1..rows.len() {
            if rows[i].pos <= rows[i - 1].pos {
                return Err(AbacusError::invalid_data(format!(
                    "Recombination map positions not in ascending order at position {}",
                    rows[i].pos
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Interpolate cumulative cM at a physical position
    pub fn gen_pos(&self, phys_pos: u32) -> f64 {
        let first = self.rows[0];
        let last = self.rows[self.rows.len() - 1];

        if phys_pos <= first.pos {
            return 0.0;
        }
        if phys_pos >= last.pos {
            return last.cumulative_cm
                + (phys_pos - last.pos) as f64 / BP_PER_MB * last.rate_cm_per_mb;
        }

        // Last mapped row at or before phys_pos; the rate of the following row
        // applies to the interval between them.
        let i = match self.rows.binary_search_by_key(&phys_pos, |r| r.pos) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let row = self.rows[i];
        let next = self.rows[i + 1];
        row.cumulative_cm + (phys_pos - row.pos) as f64 / BP_PER_MB * next.rate_cm_per_mb
    }

    /// Build the per-SNP genetic map for sorted SNP positions.
    ///
    /// Leading zero positions are back-filled in proportion to physical
    /// position, scaled by the first positive value.
    pub fn genetic_map_for(&self, positions: &[u32]) -> Result<GeneticMap> {
        let mut cm: Vec<f64> = positions.iter().map(|&p| self.gen_pos(p)).collect();

        if let Some(first_positive) = cm.iter().position(|&v| v > 0.0) {
            let anchor_pos = positions[first_positive] as f64;
            let anchor_cm = cm[first_positive];
            for j in 0..first_positive {
                cm[j] = positions[j] as f64 / anchor_pos * anchor_cm;
            }
        }

        GeneticMap::new(cm)
    }
}
