//! # SNP Definitions
//!
//! Per-SNP metadata (identifier and physical position) in file order.

use std::sync::Arc;

/// Zero-cost newtype for SNP indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SnpIdx(pub u32);

impl SnpIdx {
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for SnpIdx {
    fn from(idx: usize) -> Self {
        Self(idx as u32)
    }
}

impl From<SnpIdx> for usize {
    fn from(idx: SnpIdx) -> usize {
        idx.0 as usize
    }
}

/// A single SNP: rsid-like identifier and physical position (bp)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snp {
    pub rsid: Arc<str>,
    pub pos: u32,
}

impl Snp {
    pub fn new(rsid: impl Into<Arc<str>>, pos: u32) -> Self {
        Self {
            rsid: rsid.into(),
            pos,
        }
    }
}

/// Ordered SNP metadata
#[derive(Clone, Debug, Default)]
pub struct Snps {
    snps: Vec<Snp>,
}

impl Snps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            snps: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, snp: Snp) {
        self.snps.push(snp);
    }

    pub fn len(&self) -> usize {
        self.snps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snps.is_empty()
    }

    pub fn get(&self, idx: SnpIdx) -> Option<&Snp> {
        self.snps.get(idx.as_usize())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snp> {
        self.snps.iter()
    }

    /// Physical positions in file order
    pub fn positions(&self) -> Vec<u32> {
        self.snps.iter().map(|s| s.pos).collect()
    }
}

impl std::ops::Index<SnpIdx> for Snps {
    type Output = Snp;

    fn index(&self, idx: SnpIdx) -> &Self::Output {
        &self.snps[idx.as_usize()]
    }
}

impl FromIterator<Snp> for Snps {
    fn from_iter<I: IntoIterator<Item = Snp>>(iter: I) -> Self {
        Self {
            snps: iter.into_iter().collect(),
        }
    }
}
