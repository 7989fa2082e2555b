//! # Model Module
//!
//! Statistical core of the pipeline.
//!
//! ## Painting
//! - `parameters`: copying-model hyperparameters, emissions and transitions
//! - `donors`: which haplotypes a target may copy from
//! - `viterbi`: O(n)-per-SNP Viterbi decode with bounded traceback memory
//! - `blocks`: copying blocks, per-donor statistics and genome-wide summaries
//!
//! ## Association
//! - `coalescence`: pairwise average lengths and long-block posteriors
//! - `laplace`: per-site Bayes factor via Newton-Raphson and Laplace approximation

pub mod blocks;
pub mod coalescence;
pub mod donors;
pub mod laplace;
pub mod parameters;
pub mod viterbi;

pub use blocks::{BlockStats, HaplotypePainting, PaintingSummaries, SummaryMatrix};
pub use coalescence::{HaplotypeObservation, PairwiseAverageMatrix};
pub use donors::{DonorSet, DonorStrategy};
pub use laplace::{LaplaceApproximation, SiteInference};
pub use parameters::ModelParams;
pub use viterbi::{PaintingEngine, ViterbiPath};
