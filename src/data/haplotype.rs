//! # Haplotype Index
//!
//! Haplotypes are the columns of the allele matrix. In diploid panels
//! columns `2k` and `2k + 1` are the two copies carried by individual `k`.

/// Column of the allele matrix
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HapIdx(pub u32);

impl HapIdx {
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Individual carrying this haplotype in a diploid panel
    pub fn individual(self) -> u32 {
        self.0 / 2
    }

    /// The other copy carried by the same individual
    pub fn other(self) -> HapIdx {
        HapIdx(self.0 ^ 1)
    }

    /// 1-based label used in painting files
    pub fn label(self) -> u32 {
        self.0 + 1
    }

    /// Inverse of [`HapIdx::label`]; label 0 names no haplotype
    pub fn from_label(label: u32) -> Option<HapIdx> {
        label.checked_sub(1).map(HapIdx)
    }
}

impl From<u32> for HapIdx {
    fn from(idx: u32) -> Self {
        Self(idx)
    }
}

impl From<usize> for HapIdx {
    fn from(idx: usize) -> Self {
        Self(idx as u32)
    }
}

impl From<HapIdx> for usize {
    fn from(idx: HapIdx) -> usize {
        idx.as_usize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diploid_pairs() {
        assert_eq!(HapIdx::new(11).individual(), 5);
        assert_eq!(HapIdx::new(10).individual(), 5);
        assert_eq!(HapIdx::new(11).other(), HapIdx::new(10));
        assert_eq!(HapIdx::new(10).other(), HapIdx::new(11));
    }

    #[test]
    fn test_labels() {
        assert_eq!(HapIdx::new(0).label(), 1);
        assert_eq!(HapIdx::from_label(4), Some(HapIdx::new(3)));
        assert_eq!(HapIdx::from_label(0), None);
    }
}
