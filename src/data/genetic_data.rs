//! # Genetic Data
//!
//! Immutable view of the panel: allele matrix, SNP metadata and genetic map,
//! validated to describe the same SNPs in the same order.

use crate::data::genetic_map::GeneticMap;
use crate::data::marker::Snps;
use crate::data::storage::AlleleMatrix;
use crate::error::{AbacusError, Result};

#[derive(Clone, Debug)]
pub struct GeneticData {
    snps: Snps,
    alleles: AlleleMatrix,
    map: GeneticMap,
}

impl GeneticData {
    pub fn new(snps: Snps, alleles: AlleleMatrix, map: GeneticMap) -> Result<Self> {
        if snps.len() != alleles.n_snps() {
            return Err(AbacusError::invalid_data(format!(
                "{} SNP records but {} allele rows",
                snps.len(),
                alleles.n_snps()
            )));
        }
        if map.len() != snps.len() {
            return Err(AbacusError::invalid_data(format!(
                "Mismatch between number of SNPs in haplotype file ({}) and genetic map ({})",
                snps.len(),
                map.len()
            )));
        }
        if snps.is_empty() {
            return Err(AbacusError::invalid_data("Panel contains no SNPs"));
        }
        Ok(Self { snps, alleles, map })
    }

    pub fn n_snps(&self) -> usize {
        self.snps.len()
    }

    pub fn n_haplotypes(&self) -> usize {
        self.alleles.n_haplotypes()
    }

    pub fn snps(&self) -> &Snps {
        &self.snps
    }

    pub fn alleles(&self) -> &AlleleMatrix {
        &self.alleles
    }

    pub fn map(&self) -> &GeneticMap {
        &self.map
    }
}
