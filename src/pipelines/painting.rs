//! # Painting Pipeline
//!
//! Paints every haplotype of the panel against its donor set, writes one
//! `.viterbi` file per haplotype, and stacks the per-haplotype block
//! statistics into the genome-wide length and count matrices.
//!
//! Haplotypes are independent tasks on a dedicated rayon pool. Each worker
//! thread reuses one `ViterbiWorkspace`, and each task owns an RNG seeded from
//! the run seed and its haplotype index, so results do not depend on
//! scheduling. Failed haplotypes are logged individually and reported
//! together; no summaries are written unless every haplotype succeeded.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::{error, info, info_span};

use crate::data::genetic_data::GeneticData;
use crate::data::haplotype::HapIdx;
use crate::error::{AbacusError, Result};
use crate::io::summaries::write_summaries;
use crate::io::viterbi::write_painting;
use crate::model::blocks::{BlockStats, HaplotypePainting, PaintingSummaries};
use crate::model::donors::DonorStrategy;
use crate::model::parameters::ModelParams;
use crate::model::viterbi::PaintingEngine;
use crate::utils::telemetry::{Stage, TelemetryBlackboard};
use crate::utils::threading::build_thread_pool;
use crate::utils::workspace::ViterbiWorkspace;

thread_local! {
    static THREAD_WORKSPACE: RefCell<ViterbiWorkspace> = RefCell::new(ViterbiWorkspace::new());
}

/// Bytes per megabyte for `max_traceback_mb`
const BYTES_PER_MB: usize = 1024 * 1024;

/// Settings for one painting run
#[derive(Clone, Debug)]
pub struct PaintingParams {
    /// Effective population size
    pub ne: f64,
    /// Mutation parameter; Watterson's estimate over the panel when `None`
    pub theta: Option<f64>,
    pub strategy: DonorStrategy,
    /// Base seed for the tie-break RNGs
    pub seed: u64,
    /// Traceback memory bound per decode
    pub max_traceback_mb: usize,
    pub n_threads: usize,
}

impl Default for PaintingParams {
    fn default() -> Self {
        Self {
            ne: 10_000.0,
            theta: None,
            strategy: DonorStrategy::AllOthers,
            seed: 0,
            max_traceback_mb: 1024,
            n_threads: 1,
        }
    }
}

impl PaintingParams {
    pub fn model_params(&self, n_haps: usize) -> Result<ModelParams> {
        match self.theta {
            Some(theta) => ModelParams::new(self.ne, theta),
            None => ModelParams::for_panel(self.ne, n_haps),
        }
    }

    /// Seed of the RNG that paints `hap`
    pub fn seed_for(&self, hap: HapIdx) -> u64 {
        self.seed.wrapping_add(hap.0 as u64)
    }
}

/// Painting pipeline
pub struct PaintingPipeline {
    params: PaintingParams,
    telemetry: Option<Arc<TelemetryBlackboard>>,
}

impl PaintingPipeline {
    pub fn new(params: PaintingParams, telemetry: Option<Arc<TelemetryBlackboard>>) -> Self {
        Self { params, telemetry }
    }

    /// Paint the panel, writing `.viterbi` files and both summary matrices under `prefix`
    pub fn run(&self, data: &GeneticData, prefix: &Path) -> Result<PaintingSummaries> {
        if let Some(parent) = prefix.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let summaries = self.paint_all(data, |painting| {
            write_painting(prefix, painting, data.snps()).map(|_| ())
        })?;

        if let Some(bb) = &self.telemetry {
            bb.set_stage(Stage::WritingSummaries);
        }
        write_summaries(prefix, &summaries)?;
        info!(prefix = ?prefix, "Wrote painting summaries");
        Ok(summaries)
    }

    /// Paint every haplotype, passing each painting to `sink` from its worker
    pub fn paint_all<F>(&self, data: &GeneticData, sink: F) -> Result<PaintingSummaries>
    where
        F: Fn(&HaplotypePainting) -> Result<()> + Sync,
    {
        let n_haps = data.n_haplotypes();
        let model = self.params.model_params(n_haps)?;
        self.params.strategy.validate(n_haps)?;

        let traceback_bytes = self.params.max_traceback_mb.saturating_mul(BYTES_PER_MB);
        let engine = PaintingEngine::new(data, model).with_traceback_limit(traceback_bytes);
        // Reject an unreachable limit once instead of failing every haplotype
        if n_haps > 0 {
            let donors = self.params.strategy.donor_set(HapIdx::new(0), n_haps)?;
            engine.block_rows(donors.n_states(), std::mem::size_of::<StdRng>())?;
        }

        let _span = info_span!("paint_all", n_haps, n_snps = data.n_snps()).entered();
        info!(
            ne = model.ne,
            theta = model.theta,
            strategy = ?self.params.strategy,
            n_threads = self.params.n_threads,
            "Painting haplotypes"
        );
        if let Some(bb) = &self.telemetry {
            bb.set_stage(Stage::Painting);
            bb.set_total_haplotypes(n_haps as u64);
        }

        let pool = build_thread_pool(self.params.n_threads, "paint")?;
        let results: Vec<Result<BlockStats>> = pool.install(|| {
            (0..n_haps)
                .into_par_iter()
                .map(|h| {
                    let hap = HapIdx::from(h);
                    let result = self.paint_one(&engine, hap, n_haps, &sink);
                    if let Some(bb) = &self.telemetry {
                        bb.haplotype_done();
                    }
                    result
                })
                .collect()
        });

        let total = results.len();
        let mut stats = Vec::with_capacity(total);
        let mut failed = 0;
        for (h, result) in results.into_iter().enumerate() {
            match result {
                Ok(s) => stats.push(s),
                Err(e) => {
                    error!(haplotype = h, error = %e, "Painting failed");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            return Err(AbacusError::TaskFailures {
                stage: "painting",
                failed,
                total,
            });
        }

        info!(n_haps, "Painting complete");
        PaintingSummaries::from_stats(&stats)
    }

    fn paint_one<F>(
        &self,
        engine: &PaintingEngine<'_>,
        hap: HapIdx,
        n_haps: usize,
        sink: &F,
    ) -> Result<BlockStats>
    where
        F: Fn(&HaplotypePainting) -> Result<()> + Sync,
    {
        let donors = self.params.strategy.donor_set(hap, n_haps)?;
        let mut rng = StdRng::seed_from_u64(self.params.seed_for(hap));
        let (painting, stats) = THREAD_WORKSPACE.with(|cell| {
            let mut ws = cell.borrow_mut();
            engine.paint(&donors, &mut rng, &mut ws)
        })?;
        sink(&painting)?;
        Ok(stats)
    }
}

/// Output files written by a painting run with this prefix
pub fn painting_outputs(prefix: &Path, n_haps: usize) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = (0..n_haps)
        .map(|h| crate::io::viterbi::painting_path(prefix, HapIdx::from(h)))
        .collect();
    paths.push(crate::io::summaries::lengths_path(prefix));
    paths.push(crate::io::summaries::counts_path(prefix));
    paths
}
