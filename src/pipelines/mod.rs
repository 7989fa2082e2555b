//! # Pipeline Module
//!
//! High-level orchestration of the two analysis stages. Coordinates I/O,
//! thread pools, telemetry and the model layer.
//!
//! - `painting`: decode every haplotype, write `.viterbi` files and summaries
//! - `bayes_factor`: stream the paintings back per SNP and test each site

pub mod bayes_factor;
pub mod painting;

pub use bayes_factor::{BayesFactorParams, BayesFactorPipeline, InMemorySites, SiteSource};
pub use painting::{PaintingParams, PaintingPipeline};
