//! # Allele Matrix
//!
//! SNPs x haplotypes matrix of biallelic alleles, stored one bit-packed column
//! per SNP. Immutable once loaded and shared read-only by every painting task.

use crate::data::haplotype::HapIdx;
use crate::data::marker::SnpIdx;
use crate::data::storage::DenseColumn;
use crate::error::{AbacusError, Result};

/// The allele matrix (one column per SNP)
#[derive(Clone, Debug)]
pub struct AlleleMatrix {
    columns: Vec<DenseColumn>,
    n_haplotypes: usize,
}

impl AlleleMatrix {
    /// Build from columns; every column must cover the same haplotypes.
    pub fn from_columns(columns: Vec<DenseColumn>) -> Result<Self> {
        let n_haplotypes = columns.first().map(|c| c.n_haplotypes()).unwrap_or(0);
        if let Some((snp, col)) = columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.n_haplotypes() != n_haplotypes)
        {
            return Err(AbacusError::invalid_data(format!(
                "SNP {} has {} haplotypes, expected {}",
                snp,
                col.n_haplotypes(),
                n_haplotypes
            )));
        }
        Ok(Self {
            columns,
            n_haplotypes,
        })
    }

    /// Number of SNPs
    pub fn n_snps(&self) -> usize {
        self.columns.len()
    }

    /// Number of haplotypes
    pub fn n_haplotypes(&self) -> usize {
        self.n_haplotypes
    }

    /// Get the column for a SNP
    pub fn column(&self, snp: SnpIdx) -> &DenseColumn {
        &self.columns[snp.as_usize()]
    }

    /// Get allele at (snp, haplotype)
    #[inline]
    pub fn allele(&self, snp: SnpIdx, hap: HapIdx) -> bool {
        self.columns[snp.as_usize()].get(hap)
    }

    /// Alleles of one SNP as a plain vector (haplotype order)
    pub fn site_alleles(&self, snp: SnpIdx) -> Vec<bool> {
        self.column(snp).iter().collect()
    }

    /// Total memory usage in bytes (approximate)
    pub fn size_bytes(&self) -> usize {
        let column_bytes: usize = self.columns.iter().map(|c| c.size_bytes()).sum();
        column_bytes + std::mem::size_of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_access() {
        let matrix = AlleleMatrix::from_columns(vec![
            DenseColumn::from_alleles([true, false, false]),
            DenseColumn::from_alleles([false, true, true]),
        ])
        .expect("valid matrix");

        assert_eq!(matrix.n_snps(), 2);
        assert_eq!(matrix.n_haplotypes(), 3);
        assert!(matrix.allele(SnpIdx::new(0), HapIdx::new(0)));
        assert!(matrix.allele(SnpIdx::new(1), HapIdx::new(2)));
        assert_eq!(matrix.site_alleles(SnpIdx::new(1)), vec![false, true, true]);
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let result = AlleleMatrix::from_columns(vec![
            DenseColumn::from_alleles([true, false]),
            DenseColumn::from_alleles([true]),
        ]);
        assert!(matches!(result, Err(AbacusError::InvalidData { .. })));
    }
}
