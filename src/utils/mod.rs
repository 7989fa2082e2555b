//! # Utilities Module
//!
//! Cross-cutting helpers that don't belong in domain-specific modules.
//!
//! - `threading`: rayon pools and the chunked parallel-map driver
//! - `workspace`: reusable per-thread Viterbi buffers
//! - `telemetry`: atomic progress counters and the heartbeat thread

pub mod telemetry;
pub mod threading;
pub mod workspace;
