//! # Donor Sets
//!
//! For every target haplotype the panel is partitioned into *recipients*
//! (the candidate copying sources, i.e. the HMM state space) and *excluded*
//! haplotypes. How that partition is built is the only difference between the
//! haploid, diploid and reference-panel painting modes.

use std::sync::Arc;

use crate::data::haplotype::HapIdx;
use crate::error::{AbacusError, Result};

/// Rule for building a target's donor set
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DonorStrategy {
    /// Every haplotype except the target
    AllOthers,
    /// Every haplotype except both haplotypes of the target's individual
    Diploid,
    /// A fixed reference panel (sorted, unique), minus the target if it belongs to the panel
    ReferencePanel(Arc<[HapIdx]>),
}

impl DonorStrategy {
    /// Build a reference-panel strategy, validating indices against the panel size.
    ///
    /// Duplicate indices are collapsed; recipient order follows haplotype order.
    pub fn reference_panel(donors: Vec<HapIdx>, n_haps: usize) -> Result<Self> {
        let mut donors = donors;
        if let Some(bad) = donors.iter().find(|h| h.as_usize() >= n_haps) {
            return Err(AbacusError::invalid_data(format!(
                "Reference donor {} out of range for {} haplotypes",
                bad.0, n_haps
            )));
        }
        donors.sort_unstable();
        donors.dedup();
        if donors.is_empty() {
            return Err(AbacusError::invalid_data("Reference panel contains no donors"));
        }
        Ok(Self::ReferencePanel(donors.into()))
    }

    /// Check the strategy is usable on a panel of `n_haps` haplotypes
    pub fn validate(&self, n_haps: usize) -> Result<()> {
        match self {
            Self::AllOthers => Ok(()),
            Self::Diploid if n_haps % 2 != 0 => Err(AbacusError::invalid_data(format!(
                "Diploid painting requires an even number of haplotypes, got {}",
                n_haps
            ))),
            Self::Diploid => Ok(()),
            Self::ReferencePanel(panel) => {
                if panel.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(AbacusError::invalid_data(
                        "Reference panel must be sorted and free of duplicates",
                    ));
                }
                match panel.iter().find(|h| h.as_usize() >= n_haps) {
                    Some(bad) => Err(AbacusError::invalid_data(format!(
                        "Reference donor {} out of range for {} haplotypes",
                        bad.0, n_haps
                    ))),
                    None => Ok(()),
                }
            }
        }
    }

    /// Partition the panel for one target haplotype
    pub fn donor_set(&self, target: HapIdx, n_haps: usize) -> Result<DonorSet> {
        if target.as_usize() >= n_haps {
            return Err(AbacusError::invalid_data(format!(
                "Target haplotype {} out of range for {} haplotypes",
                target.0, n_haps
            )));
        }
        let (recipients, excluded): (Vec<HapIdx>, Vec<HapIdx>) =
            (0..n_haps as u32).map(HapIdx::new).partition(|&h| match self {
                Self::AllOthers => h != target,
                Self::Diploid => h.individual() != target.individual(),
                Self::ReferencePanel(panel) => h != target && panel.binary_search(&h).is_ok(),
            });

        if recipients.is_empty() {
            return Err(AbacusError::invalid_data(format!(
                "Haplotype {} has no candidate donors",
                target.0
            )));
        }
        Ok(DonorSet {
            target,
            recipients,
            excluded,
        })
    }
}

/// Recipients and excluded haplotypes for one target
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DonorSet {
    target: HapIdx,
    recipients: Vec<HapIdx>,
    excluded: Vec<HapIdx>,
}

impl DonorSet {
    pub fn target(&self) -> HapIdx {
        self.target
    }

    /// Candidate donors, in haplotype order. The HMM state `s` is `recipients()[s]`.
    pub fn recipients(&self) -> &[HapIdx] {
        &self.recipients
    }

    pub fn excluded(&self) -> &[HapIdx] {
        &self.excluded
    }

    /// Size of the HMM state space
    pub fn n_states(&self) -> usize {
        self.recipients.len()
    }

    /// Haplotype copied from in state `state`
    #[inline]
    pub fn donor(&self, state: usize) -> HapIdx {
        self.recipients[state]
    }
}
