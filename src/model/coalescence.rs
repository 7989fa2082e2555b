//! # Coalescence Lengths
//!
//! Genome-wide pairwise average block lengths and the per-haplotype
//! posterior probability that an observed block is "long" (recent shared
//! ancestry) rather than a background-length block.

use statrs::distribution::{ContinuousCDF, Gamma};

use crate::data::haplotype::HapIdx;
use crate::error::{AbacusError, Result};
use crate::model::blocks::SummaryMatrix;

/// Prior weight of the "long" hypothesis
const PRIOR_LONG: f64 = 0.5;

/// Average copied length per (target, donor) pair, NaN where undefined
#[derive(Clone, Debug)]
pub struct PairwiseAverageMatrix {
    n: usize,
    averages: Vec<f64>,
    genome_wide_mean: Option<f64>,
}

impl PairwiseAverageMatrix {
    /// Divide total lengths by block counts.
    ///
    /// A cell is defined when its count is positive and both inputs are
    /// finite. The genome-wide mean is the mean of the defined cells.
    pub fn from_summaries(lengths: &SummaryMatrix, counts: &SummaryMatrix) -> Result<Self> {
        if lengths.n() != counts.n() {
            return Err(AbacusError::invalid_data(format!(
                "Lengths matrix is {}x{} but counts matrix is {}x{}",
                lengths.n(),
                lengths.n(),
                counts.n(),
                counts.n()
            )));
        }
        let n = lengths.n();
        let mut averages = Vec::with_capacity(n * n);
        let mut sum = 0.0;
        let mut n_defined = 0usize;
        for (l_row, c_row) in lengths.rows().zip(counts.rows()) {
            for (&l, &c) in l_row.iter().zip(c_row) {
                if l.is_finite() && c.is_finite() && c > 0.0 {
                    let avg = l / c;
                    averages.push(avg);
                    sum += avg;
                    n_defined += 1;
                } else {
                    averages.push(f64::NAN);
                }
            }
        }
        let genome_wide_mean = (n_defined > 0).then(|| sum / n_defined as f64);
        Ok(Self {
            n,
            averages,
            genome_wide_mean,
        })
    }

    pub fn n_haplotypes(&self) -> usize {
        self.n
    }

    /// Pairwise average, `None` when the pair never formed a block
    pub fn average(&self, target: HapIdx, donor: HapIdx) -> Option<f64> {
        let v = self.averages[target.as_usize() * self.n + donor.as_usize()];
        (!v.is_nan()).then_some(v)
    }

    pub fn genome_wide_mean(&self) -> Option<f64> {
        self.genome_wide_mean
    }

    /// Expected length for a target copying `donor`, falling back to the
    /// genome-wide mean for undefined pairs.
    pub fn mean_for(&self, target: HapIdx, donor: HapIdx) -> Result<f64> {
        if target.as_usize() >= self.n || donor.as_usize() >= self.n {
            return Err(AbacusError::invalid_data(format!(
                "Pair ({}, {}) outside {}x{} average matrix",
                target.0, donor.0, self.n, self.n
            )));
        }
        self.average(target, donor)
            .or(self.genome_wide_mean)
            .ok_or_else(|| {
                AbacusError::numeric(
                    format!("haplotype {}", target.0),
                    format!(
                        "no defined average length for donor {} and no genome-wide mean",
                        donor.0
                    ),
                )
            })
    }
}

/// Posterior probability that a block of `length` is long, given the
/// expected length `mean` for its donor pair.
///
/// The long hypothesis is Gamma(shape 2, rate length/mean) evaluated through
/// its CDF at 1; the short hypothesis is exponential with mean `mean`.
/// Non-positive inputs give 0.
pub fn prob_long(length: f64, mean: f64) -> Result<f64> {
    if !(length > 0.0 && mean > 0.0) {
        return Ok(0.0);
    }
    let rate = length / mean;
    let gamma = Gamma::new(2.0, rate).map_err(|e| {
        AbacusError::numeric("long-block posterior", format!("{} (rate {})", e, rate))
    })?;

    let log_a = mean.ln() - 2.0 * length.ln() + gamma.cdf(1.0).ln() + PRIOR_LONG.ln();
    let log_b = -mean.ln() - rate + (1.0 - PRIOR_LONG).ln();
    let p = 1.0 / (1.0 + (log_b - log_a).exp());
    if p.is_nan() {
        return Err(AbacusError::numeric(
            "long-block posterior",
            format!("undefined for length {} and mean {}", length, mean),
        ));
    }
    Ok(p)
}

/// One haplotype's painting at a site
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HaplotypeObservation {
    pub donor: HapIdx,
    pub block_length: f64,
}

/// Posterior long-block probability for every haplotype at one site
pub fn site_prob_long(
    observations: &[HaplotypeObservation],
    averages: &PairwiseAverageMatrix,
) -> Result<Vec<f64>> {
    observations
        .iter()
        .enumerate()
        .map(|(hap, obs)| {
            let mean = averages.mean_for(HapIdx::from(hap), obs.donor)?;
            prob_long(obs.block_length, mean)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f64]]) -> SummaryMatrix {
        SummaryMatrix::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    #[test]
    fn test_averages_and_mean() {
        let lengths = matrix(&[&[0.0, 2.0, 1.0], &[4.0, 0.0, 0.0], &[f64::NAN, 3.0, 0.0]]);
        let counts = matrix(&[&[0.0, 1.0, 2.0], &[2.0, 0.0, 0.0], &[1.0, 3.0, 0.0]]);
        let avg = PairwiseAverageMatrix::from_summaries(&lengths, &counts).unwrap();

        assert_eq!(avg.average(HapIdx::new(0), HapIdx::new(1)), Some(2.0));
        assert_eq!(avg.average(HapIdx::new(0), HapIdx::new(2)), Some(0.5));
        assert_eq!(avg.average(HapIdx::new(0), HapIdx::new(0)), None);
        assert_eq!(avg.average(HapIdx::new(2), HapIdx::new(0)), None);
        // Defined cells: 2.0, 0.5, 2.0, 1.0
        assert_eq!(avg.genome_wide_mean(), Some(1.375));
        assert_eq!(avg.mean_for(HapIdx::new(1), HapIdx::new(2)).unwrap(), 1.375);
    }

    #[test]
    fn test_undefined_mean_is_error() {
        let zeros = SummaryMatrix::zeros(2);
        let avg = PairwiseAverageMatrix::from_summaries(&zeros, &zeros).unwrap();
        assert_eq!(avg.genome_wide_mean(), None);
        assert!(matches!(
            avg.mean_for(HapIdx::new(0), HapIdx::new(1)),
            Err(AbacusError::Numeric { .. })
        ));
        assert!(avg.mean_for(HapIdx::new(0), HapIdx::new(2)).is_err());
    }

    #[test]
    fn test_shape_mismatch() {
        let result = PairwiseAverageMatrix::from_summaries(
            &SummaryMatrix::zeros(2),
            &SummaryMatrix::zeros(3),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_prob_long_degenerate_inputs() {
        assert_eq!(prob_long(1.0, 0.0).unwrap(), 0.0);
        assert_eq!(prob_long(0.0, 1.0).unwrap(), 0.0);
        assert_eq!(prob_long(-1.0, 1.0).unwrap(), 0.0);
        assert_eq!(prob_long(1.0, f64::NAN).unwrap(), 0.0);
    }

    #[test]
    fn test_prob_long_increases_with_length() {
        let mean = 1.0;
        let short = prob_long(0.1, mean).unwrap();
        let typical = prob_long(1.0, mean).unwrap();
        let long = prob_long(5.0, mean).unwrap();
        assert!(short < typical && typical < long, "{} {} {}", short, typical, long);
        for p in [short, typical, long] {
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_prob_long_closed_form() {
        // Gamma(2, rate r) CDF at 1 is 1 - e^-r (1 + r)
        let (length, mean) = (2.0f64, 1.0f64);
        let r = length / mean;
        let cdf = 1.0 - (-r).exp() * (1.0 + r);
        let a = mean / (length * length) * cdf * 0.5;
        let b = (-r).exp() / mean * 0.5;
        let expected = a / (a + b);
        assert!((prob_long(length, mean).unwrap() - expected).abs() < 1e-10);
    }

    #[test]
    fn test_site_prob_long() {
        let lengths = matrix(&[&[0.0, 1.0], &[1.0, 0.0]]);
        let counts = matrix(&[&[0.0, 1.0], &[1.0, 0.0]]);
        let avg = PairwiseAverageMatrix::from_summaries(&lengths, &counts).unwrap();
        let obs = [
            HaplotypeObservation {
                donor: HapIdx::new(1),
                block_length: 2.0,
            },
            HaplotypeObservation {
                donor: HapIdx::new(0),
                block_length: 0.0,
            },
        ];
        let probs = site_prob_long(&obs, &avg).unwrap();
        assert!(probs[0] > 0.0);
        assert_eq!(probs[1], 0.0);
    }
}
