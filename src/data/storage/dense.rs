//! # Dense Bit-Packed Storage
//!
//! One bit per haplotype for a single biallelic SNP (`true` = derived allele).

use bitvec::prelude::*;

use crate::data::HapIdx;

/// Dense bit-packed allele column
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DenseColumn {
    bits: BitVec<u64, Lsb0>,
}

impl DenseColumn {
    /// Create a column with every haplotype carrying the ancestral allele
    pub fn new(n_haplotypes: usize) -> Self {
        Self {
            bits: bitvec![u64, Lsb0; 0; n_haplotypes],
        }
    }

    /// Create from an iterator of alleles
    pub fn from_alleles(alleles: impl IntoIterator<Item = bool>) -> Self {
        Self {
            bits: alleles.into_iter().collect(),
        }
    }

    /// Get allele for haplotype
    #[inline]
    pub fn get(&self, hap: HapIdx) -> bool {
        self.bits[hap.as_usize()]
    }

    /// Set allele for haplotype
    pub fn set(&mut self, hap: HapIdx, allele: bool) {
        self.bits.set(hap.as_usize(), allele);
    }

    /// Number of haplotypes
    pub fn n_haplotypes(&self) -> usize {
        self.bits.len()
    }

    /// Count of derived alleles
    pub fn derived_count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Iterate over all alleles in haplotype order
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().by_vals()
    }

    /// Memory usage in bytes
    pub fn size_bytes(&self) -> usize {
        self.bits.as_raw_slice().len() * std::mem::size_of::<u64>()
    }
}
