//! # I/O Module
//!
//! File reading/writing boundaries. All interchange files are plain
//! delimited text, one record per line; inputs may be gzipped.
//!
//! - `haps`: haplotype panel and reference donor list
//! - `viterbi`: per-haplotype painting files (`<prefix>_<hap>.viterbi`)
//! - `summaries`: `.viterbiLengths` / `.viterbiCounts` matrices
//! - `bayes`: per-site Bayes factors (`<prefix>.bayesfactor`)

pub mod bayes;
pub mod haps;
pub mod summaries;
pub mod text;
pub mod viterbi;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Append a suffix to an output prefix (`out/run` + `.bayesfactor`)
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
