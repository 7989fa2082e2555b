//! # Block Extraction
//!
//! Turns a decoded donor path into copying blocks (maximal runs of SNPs with
//! the same donor) and per-donor length/count statistics.
//!
//! Block edges sit halfway between the last SNP of one block and the first
//! SNP of the next; the chromosome ends are the first and last mapped SNPs.
//! Lengths therefore sum to the total map span, and a single-SNP block at the
//! start of the chromosome is credited half the distance to the next SNP.

use crate::data::genetic_map::GeneticMap;
use crate::data::haplotype::HapIdx;
use crate::error::{AbacusError, Result};

/// Per-SNP decode of one target haplotype
#[derive(Clone, Debug, PartialEq)]
pub struct HaplotypePainting {
    pub target: HapIdx,
    /// Donor haplotype copied at each SNP
    pub donors: Vec<HapIdx>,
    /// Genetic length (cM) of the block each SNP belongs to
    pub block_lengths: Vec<f64>,
}

impl HaplotypePainting {
    pub fn n_snps(&self) -> usize {
        self.donors.len()
    }
}

/// Per-donor totals for one target: copied length and number of blocks.
///
/// Indexed by donor haplotype; entries for non-donors are zero.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockStats {
    pub totals: Vec<f64>,
    pub counts: Vec<f64>,
}

impl BlockStats {
    pub fn new(n_haps: usize) -> Self {
        Self {
            totals: vec![0.0; n_haps],
            counts: vec![0.0; n_haps],
        }
    }

    pub fn n_haplotypes(&self) -> usize {
        self.totals.len()
    }

    /// Total genetic length over all donors
    pub fn total_length(&self) -> f64 {
        self.totals.iter().sum()
    }

    fn add_block(&mut self, donor: HapIdx, length: f64) {
        self.totals[donor.as_usize()] += length;
        self.counts[donor.as_usize()] += 1.0;
    }
}

/// Square haplotype x haplotype matrix, row-major. Row = target, column = donor.
#[derive(Clone, Debug, PartialEq)]
pub struct SummaryMatrix {
    n: usize,
    values: Vec<f64>,
}

impl SummaryMatrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            values: vec![0.0; n * n],
        }
    }

    /// Build from rows; every row must have one entry per row
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let mut values = Vec::with_capacity(n * n);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n {
                return Err(AbacusError::invalid_data(format!(
                    "Row {} has {} values, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            values.extend(row);
        }
        Ok(Self { n, values })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, row: HapIdx, col: HapIdx) -> f64 {
        self.values[row.as_usize() * self.n + col.as_usize()]
    }

    pub fn row(&self, row: HapIdx) -> &[f64] {
        let start = row.as_usize() * self.n;
        &self.values[start..start + self.n]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.values.chunks(self.n.max(1))
    }

    pub fn set_row(&mut self, row: HapIdx, values: &[f64]) {
        let start = row.as_usize() * self.n;
        self.values[start..start + self.n].copy_from_slice(values);
    }

    /// Elementwise sum, e.g. to pool chromosomes
    pub fn add(&self, other: &SummaryMatrix) -> Result<SummaryMatrix> {
        if self.n != other.n {
            return Err(AbacusError::invalid_data(format!(
                "Cannot combine {}x{} and {}x{} summary matrices",
                self.n, self.n, other.n, other.n
            )));
        }
        Ok(Self {
            n: self.n,
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| a + b)
                .collect(),
        })
    }
}

/// Genome-wide painting totals: copied length and block count per (target, donor)
#[derive(Clone, Debug, PartialEq)]
pub struct PaintingSummaries {
    pub lengths: SummaryMatrix,
    pub counts: SummaryMatrix,
}

impl PaintingSummaries {
    /// Stack per-target statistics; `stats[i]` belongs to haplotype `i`
    pub fn from_stats(stats: &[BlockStats]) -> Result<Self> {
        let n = stats.len();
        let mut lengths = SummaryMatrix::zeros(n);
        let mut counts = SummaryMatrix::zeros(n);
        for (i, s) in stats.iter().enumerate() {
            if s.n_haplotypes() != n {
                return Err(AbacusError::invalid_data(format!(
                    "Statistics for haplotype {} cover {} donors, expected {}",
                    i,
                    s.n_haplotypes(),
                    n
                )));
            }
            lengths.set_row(HapIdx::from(i), &s.totals);
            counts.set_row(HapIdx::from(i), &s.counts);
        }
        Ok(Self { lengths, counts })
    }
}

/// Split a donor path into blocks and accumulate their statistics
pub fn extract_blocks(
    target: HapIdx,
    donors: Vec<HapIdx>,
    map: &GeneticMap,
    n_haps: usize,
) -> Result<(HaplotypePainting, BlockStats)> {
    let n_snps = donors.len();
    if n_snps == 0 || n_snps != map.len() {
        return Err(AbacusError::invalid_data(format!(
            "Path for haplotype {} covers {} SNPs, genetic map has {}",
            target.0,
            n_snps,
            map.len()
        )));
    }
    if let Some(bad) = donors.iter().find(|d| d.as_usize() >= n_haps) {
        return Err(AbacusError::invalid_data(format!(
            "Donor {} out of range for {} haplotypes",
            bad.0, n_haps
        )));
    }

    let cm = map.positions();
    let edge = |t: usize| -> f64 {
        if t == 0 {
            cm[0]
        } else if t == n_snps {
            cm[n_snps - 1]
        } else {
            0.5 * (cm[t - 1] + cm[t])
        }
    };

    let mut stats = BlockStats::new(n_haps);
    let mut block_lengths = vec![0.0; n_snps];
    let mut start = 0;
    for end in 1..=n_snps {
        if end < n_snps && donors[end] == donors[start] {
            continue;
        }
        let length = edge(end) - edge(start);
        block_lengths[start..end].fill(length);
        stats.add_block(donors[start], length);
        start = end;
    }

    Ok((
        HaplotypePainting {
            target,
            donors,
            block_lengths,
        },
        stats,
    ))
}
