//! # Allele Storage
//!
//! Bit-packed per-SNP columns and the SNP x haplotype matrix built from them.
//! Painting reads one column per HMM step, so column-major storage keeps each
//! step's donor alleles contiguous.

pub mod dense;
pub mod matrix;

pub use dense::DenseColumn;
pub use matrix::AlleleMatrix;
