//! # Data Module
//!
//! In-memory representations of the haplotype panel. This is the core "Model" layer.
//!
//! ## Design Philosophy: Data-Oriented Design
//! - **Structure of Arrays (SoA):** SNP metadata, allele columns and the genetic
//!   map are stored separately for cache-friendly iteration.
//! - **Zero-cost newtypes:** `SnpIdx` and `HapIdx` prevent index bugs
//!   at compile time with no runtime overhead.

pub mod genetic_data;
pub mod genetic_map;
pub mod haplotype;
pub mod marker;
pub mod storage;

// Re-export commonly used types
pub use genetic_data::GeneticData;
pub use genetic_map::{GeneticMap, RecombinationMap};
pub use haplotype::HapIdx;
pub use marker::{Snp, SnpIdx, Snps};
pub use storage::{AlleleMatrix, DenseColumn};
