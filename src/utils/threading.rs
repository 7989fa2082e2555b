//! # Threading
//!
//! Rayon pool construction and the chunked parallel-map driver used by the
//! Bayes-factor stage.
//!
//! `ChunkedExecutor` processes a long index range in contiguous chunks:
//! load a chunk's inputs, map them in parallel, then hand the results to the
//! caller strictly in index order before the next chunk is loaded. At most one
//! chunk of inputs and results is alive at a time, and the first failure in a
//! chunk aborts the run.

use std::ops::Range;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::info;

use crate::error::{AbacusError, Result};
use crate::utils::telemetry::TelemetryBlackboard;

/// Create a named rayon pool for one pipeline stage
pub fn build_thread_pool(n_threads: usize, stage: &'static str) -> Result<ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads.max(1))
        .thread_name(move |i| format!("abacus-{}-{}", stage, i))
        .build()
        .map_err(|e| AbacusError::config(format!("Failed to create thread pool: {}", e)))
}

/// Split `0..total` into at most `n_chunks` contiguous ranges.
///
/// Every chunk but the last has `total / n` items; the last also takes the
/// remainder. Empty chunks are never produced.
pub fn chunk_ranges(total: usize, n_chunks: usize) -> Vec<Range<usize>> {
    if total == 0 {
        return Vec::new();
    }
    let n = n_chunks.clamp(1, total);
    let size = total / n;
    (0..n)
        .map(|i| {
            let start = i * size;
            let end = if i + 1 == n { total } else { start + size };
            start..end
        })
        .collect()
}

/// Load / parallel map / ordered emit, one chunk at a time
pub struct ChunkedExecutor<'p> {
    pool: &'p ThreadPool,
    n_chunks: usize,
    telemetry: Option<Arc<TelemetryBlackboard>>,
}

impl<'p> ChunkedExecutor<'p> {
    pub fn new(pool: &'p ThreadPool, n_chunks: usize) -> Self {
        Self {
            pool,
            n_chunks,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<TelemetryBlackboard>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Run `work` over every index in `0..total`.
    ///
    /// `load` produces the inputs for a chunk (one per index, in order);
    /// `emit` receives each result in index order. Returns the number of
    /// items emitted.
    pub fn run<T, U, L, W, E>(
        &self,
        total: usize,
        mut load: L,
        work: W,
        mut emit: E,
    ) -> Result<usize>
    where
        T: Send,
        U: Send,
        L: FnMut(Range<usize>) -> Result<Vec<T>>,
        W: Fn(usize, T) -> Result<U> + Sync,
        E: FnMut(usize, U) -> Result<()>,
    {
        let ranges = chunk_ranges(total, self.n_chunks);
        let n_chunks = ranges.len();
        if let Some(bb) = &self.telemetry {
            bb.set_chunks(0, n_chunks as u64);
        }

        let mut n_emitted = 0;
        for (chunk, range) in ranges.into_iter().enumerate() {
            let items = load(range.clone())?;
            if items.len() != range.len() {
                return Err(AbacusError::invalid_data(format!(
                    "Chunk {} loaded {} items for {} indices",
                    chunk,
                    items.len(),
                    range.len()
                )));
            }

            let start = range.start;
            let results: Vec<U> = self.pool.install(|| {
                items
                    .into_par_iter()
                    .enumerate()
                    .map(|(k, item)| work(start + k, item))
                    .collect::<Result<Vec<U>>>()
            })?;

            for (i, result) in range.zip(results) {
                emit(i, result)?;
                n_emitted += 1;
            }

            if let Some(bb) = &self.telemetry {
                bb.set_chunks(chunk as u64 + 1, n_chunks as u64);
                bb.set_sites_processed(n_emitted as u64);
            }
            info!(
                chunk = chunk + 1,
                n_chunks,
                percent = (chunk + 1) * 100 / n_chunks,
                "Chunk complete"
            );
        }
        Ok(n_emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_ranges() {
        assert_eq!(chunk_ranges(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(chunk_ranges(3, 100), vec![0..1, 1..2, 2..3]);
        assert_eq!(chunk_ranges(5, 0), vec![0..5]);
        assert!(chunk_ranges(0, 4).is_empty());
    }

    #[test]
    fn test_results_emitted_in_order() {
        let pool = build_thread_pool(4, "test").unwrap();
        let executor = ChunkedExecutor::new(&pool, 3);
        let mut seen = Vec::new();
        let n = executor
            .run(
                17,
                |range| Ok(range.map(|i| i * 10).collect()),
                |i, x| Ok((i, x + 1)),
                |i, (j, y)| {
                    assert_eq!(i, j);
                    seen.push(y);
                    Ok(())
                },
            )
            .unwrap();
        assert_eq!(n, 17);
        assert_eq!(seen, (0..17).map(|i| i * 10 + 1).collect::<Vec<_>>());
    }

    #[test]
    fn test_failure_aborts_remaining_chunks() {
        let pool = build_thread_pool(2, "test").unwrap();
        let executor = ChunkedExecutor::new(&pool, 4);
        let mut loaded = Vec::new();
        let result = executor.run(
            8,
            |range| {
                loaded.push(range.clone());
                Ok(range.collect::<Vec<_>>())
            },
            |i, _| {
                if i == 3 {
                    Err(AbacusError::numeric("site 3", "singular"))
                } else {
                    Ok(i)
                }
            },
            |_, _| Ok(()),
        );
        assert!(result.is_err());
        assert_eq!(loaded, vec![0..2, 2..4]);
    }
}
