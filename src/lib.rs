//! # Abacus Library Root
//!
//! Haplotype painting and coalescence-length association testing.
//!
//! Every haplotype of a phased panel is painted as a mosaic of the others by
//! a Li & Stephens copying HMM. The decoded copying blocks are summarised
//! per donor pair, and each SNP is then tested for association between a
//! haplotype's allele and whether it sits in an unusually long block.
//!
//! ## Module Structure
//! ```text
//! abacus
//! ├── data        # SNPs, haplotype alleles, genetic maps
//! │   └── storage # Bit-packed allele columns
//! ├── io          # Haplotype, painting, summary and Bayes-factor files
//! ├── model       # Copying HMM, block extraction, Laplace Bayes factor
//! ├── pipelines   # Painting and Bayes-factor orchestration
//! └── utils       # Thread pools, workspaces, telemetry
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod pipelines;
pub mod utils;

pub use config::Config;
pub use error::{AbacusError, Result};
pub use pipelines::{BayesFactorParams, BayesFactorPipeline, PaintingParams, PaintingPipeline};
