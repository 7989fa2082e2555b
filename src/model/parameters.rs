//! # Model Parameters
//!
//! Hyperparameters of the copying model and the derived per-step
//! probabilities.
//!
//! ### Emissions
//! With `n` candidate donors and mutation parameter `theta`:
//!
//! ```text
//! P(match)    = (n + theta/2) / (n + theta)
//! P(mismatch) = (theta/2) / (n - 1 + theta)
//! ```
//!
//! ### Transitions
//! Between SNPs separated by `d` Morgans:
//!
//! ```text
//! p      = exp(-4 * Ne * d / n)
//! switch = (1 - p) / n          (to any one particular donor)
//! stay   = switch + p
//! ```

use crate::error::{AbacusError, Result};

/// Centimorgans per Morgan
const CM_PER_MORGAN: f64 = 100.0;

/// Watterson's estimate of the scaled mutation rate for `n_haps` haplotypes:
/// `1 / sum_{i=1}^{n-1} 1/i`.
pub fn watterson_theta(n_haps: usize) -> f64 {
    let harmonic: f64 = (1..n_haps).map(|i| 1.0 / i as f64).sum();
    if harmonic > 0.0 {
        1.0 / harmonic
    } else {
        // A single haplotype has no segregating sites to calibrate against
        f64::INFINITY
    }
}

/// Log emission probabilities for one decode
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Emissions {
    pub log_match: f64,
    pub log_mismatch: f64,
}

impl Emissions {
    /// Emission probabilities (linear scale) for `n_states` donors
    pub fn probabilities(n_states: usize, theta: f64) -> (f64, f64) {
        let n = n_states as f64;
        let p_match = (n + 0.5 * theta) / (n + theta);
        let p_mismatch = (0.5 * theta) / (n - 1.0 + theta);
        (p_match, p_mismatch)
    }

    pub fn new(n_states: usize, theta: f64) -> Self {
        let (p_match, p_mismatch) = Self::probabilities(n_states, theta);
        Self {
            log_match: p_match.ln(),
            log_mismatch: p_mismatch.ln(),
        }
    }

    #[inline]
    pub fn log_emit(&self, target_allele: bool, donor_allele: bool) -> f64 {
        if target_allele == donor_allele {
            self.log_match
        } else {
            self.log_mismatch
        }
    }
}

/// Log transition probabilities for one inter-SNP interval
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub log_switch: f64,
    pub log_stay: f64,
}

impl Transition {
    /// `(switch, stay)` on the linear scale
    pub fn probabilities(distance_cm: f64, ne: f64, n_states: usize) -> (f64, f64) {
        let n = n_states as f64;
        let morgans = distance_cm.max(0.0) / CM_PER_MORGAN;
        let p = (-4.0 * ne * morgans / n).exp();
        let switch = (1.0 - p) / n;
        (switch, switch + p)
    }

    pub fn new(distance_cm: f64, ne: f64, n_states: usize) -> Self {
        let (switch, stay) = Self::probabilities(distance_cm, ne, n_states);
        Self {
            log_switch: switch.ln(),
            log_stay: stay.ln(),
        }
    }
}

/// Copying-model parameters shared by every painting task
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelParams {
    /// Effective population size (Ne)
    pub ne: f64,
    /// Scaled mutation rate
    pub theta: f64,
}

impl ModelParams {
    /// Parameters with theta from Watterson's estimate over the panel
    pub fn for_panel(ne: f64, n_haps: usize) -> Result<Self> {
        Self::new(ne, watterson_theta(n_haps))
    }

    pub fn new(ne: f64, theta: f64) -> Result<Self> {
        if !(ne.is_finite() && ne > 0.0) {
            return Err(AbacusError::config(format!(
                "Effective population size must be positive, got {}",
                ne
            )));
        }
        if !(theta.is_finite() && theta > 0.0) {
            return Err(AbacusError::config(format!(
                "Mutation parameter must be positive and finite, got {}",
                theta
            )));
        }
        Ok(Self { ne, theta })
    }

    pub fn emissions(&self, n_states: usize) -> Emissions {
        Emissions::new(n_states, self.theta)
    }

    pub fn transition(&self, distance_cm: f64, n_states: usize) -> Transition {
        Transition::new(distance_cm, self.ne, n_states)
    }
}
