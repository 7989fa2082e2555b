//! # Bayes Factor Pipeline
//!
//! Tests every SNP for association between allele and long copying blocks.
//!
//! 1. Build the pairwise average matrix from the painting summaries
//! 2. Stream each SNP's painting records for all haplotypes (in chunks)
//! 3. For each SNP in parallel: long-block posteriors, then the Laplace test
//! 4. Write results in SNP order

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, info_span};

use crate::data::genetic_data::GeneticData;
use crate::data::marker::{Snp, SnpIdx};
use crate::error::{AbacusError, Result};
use crate::io::bayes::{bayes_factor_path, BayesFactorWriter};
use crate::io::summaries::read_summaries;
use crate::io::viterbi::PaintingReaders;
use crate::model::blocks::HaplotypePainting;
use crate::model::coalescence::{site_prob_long, HaplotypeObservation, PairwiseAverageMatrix};
use crate::model::laplace::{LaplaceApproximation, SiteInference};
use crate::utils::telemetry::{Stage, TelemetryBlackboard};
use crate::utils::threading::{build_thread_pool, ChunkedExecutor};

/// Settings for one Bayes-factor run
#[derive(Clone, Debug, PartialEq)]
pub struct BayesFactorParams {
    /// Prior standard deviation of the effect size
    pub sigma_beta: f64,
    /// Newton-Raphson iteration count K
    pub iterations: usize,
    /// Number of contiguous SNP chunks
    pub n_chunks: usize,
    pub n_threads: usize,
}

impl Default for BayesFactorParams {
    fn default() -> Self {
        Self {
            sigma_beta: 1.0,
            iterations: 10,
            n_chunks: 100,
            n_threads: 1,
        }
    }
}

/// Source of per-SNP painting records, consumed in SNP order
pub trait SiteSource {
    fn n_haplotypes(&self) -> usize;

    /// Records of every haplotype at the next SNP, which must be `snp`
    fn next_site(&mut self, snp: &Snp) -> Result<Vec<HaplotypeObservation>>;
}

impl SiteSource for PaintingReaders {
    fn n_haplotypes(&self) -> usize {
        PaintingReaders::n_haplotypes(self)
    }

    fn next_site(&mut self, snp: &Snp) -> Result<Vec<HaplotypeObservation>> {
        PaintingReaders::next_site(self, snp)
    }
}

/// Paintings held in memory, for library callers that skip the files
pub struct InMemorySites<'a> {
    paintings: &'a [HaplotypePainting],
    next: usize,
}

impl<'a> InMemorySites<'a> {
    /// `paintings[i]` must be the painting of haplotype `i`
    pub fn new(paintings: &'a [HaplotypePainting]) -> Result<Self> {
        let misplaced = paintings
            .iter()
            .enumerate()
            .find(|(i, p)| p.target.as_usize() != *i);
        if let Some((i, p)) = misplaced {
            return Err(AbacusError::invalid_data(format!(
                "Painting at position {} belongs to haplotype {}",
                i, p.target.0
            )));
        }
        Ok(Self { paintings, next: 0 })
    }
}

impl SiteSource for InMemorySites<'_> {
    fn n_haplotypes(&self) -> usize {
        self.paintings.len()
    }

    fn next_site(&mut self, _snp: &Snp) -> Result<Vec<HaplotypeObservation>> {
        let t = self.next;
        let site = self
            .paintings
            .iter()
            .map(|p| match (p.donors.get(t), p.block_lengths.get(t)) {
                (Some(&donor), Some(&block_length)) => Ok(HaplotypeObservation {
                    donor,
                    block_length,
                }),
                _ => Err(AbacusError::invalid_data(format!(
                    "Painting of haplotype {} ends before SNP {}",
                    p.target.0, t
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        self.next += 1;
        Ok(site)
    }
}

/// Bayes-factor pipeline
pub struct BayesFactorPipeline {
    params: BayesFactorParams,
    telemetry: Option<Arc<TelemetryBlackboard>>,
}

impl BayesFactorPipeline {
    pub fn new(params: BayesFactorParams, telemetry: Option<Arc<TelemetryBlackboard>>) -> Self {
        Self { params, telemetry }
    }

    /// Read the painting outputs and write `<out>.bayesfactor`
    pub fn run(
        &self,
        data: &GeneticData,
        viterbi_prefix: &Path,
        lengths: &Path,
        counts: &Path,
        out_prefix: &Path,
    ) -> Result<PathBuf> {
        let n_haps = data.n_haplotypes();
        let summaries = read_summaries(lengths, counts, n_haps)?;
        let averages =
            PairwiseAverageMatrix::from_summaries(&summaries.lengths, &summaries.counts)?;
        info!(
            genome_wide_mean = ?averages.genome_wide_mean(),
            "Built pairwise average matrix"
        );

        let mut readers = PaintingReaders::open(viterbi_prefix, n_haps)?;
        let path = bayes_factor_path(out_prefix);
        let mut writer = BayesFactorWriter::create(&path)?;

        self.run_with(data, &averages, &mut readers, |_, snp, inference| {
            writer.write_site(snp, &inference)
        })?;

        if let Some(bb) = &self.telemetry {
            bb.set_stage(Stage::WritingOutput);
        }
        readers.finish()?;
        let n = writer.finish()?;
        info!(n_sites = n, path = ?path, "Wrote Bayes factors");
        Ok(path)
    }

    /// Test every SNP, handing results to `emit` in SNP order
    pub fn run_with<S, E>(
        &self,
        data: &GeneticData,
        averages: &PairwiseAverageMatrix,
        source: &mut S,
        mut emit: E,
    ) -> Result<usize>
    where
        S: SiteSource,
        E: FnMut(SnpIdx, &Snp, SiteInference) -> Result<()>,
    {
        let n_haps = data.n_haplotypes();
        if source.n_haplotypes() != n_haps || averages.n_haplotypes() != n_haps {
            return Err(AbacusError::invalid_data(format!(
                "Panel has {} haplotypes, paintings cover {}, average matrix covers {}",
                n_haps,
                source.n_haplotypes(),
                averages.n_haplotypes()
            )));
        }
        let laplace = LaplaceApproximation::new(self.params.sigma_beta, self.params.iterations)?;
        let n_snps = data.n_snps();

        let _span = info_span!("bayes_factors", n_snps, n_haps).entered();
        info!(
            sigma_beta = laplace.sigma_beta(),
            iterations = laplace.iterations(),
            n_chunks = self.params.n_chunks,
            "Computing Bayes factors"
        );

        let pool = build_thread_pool(self.params.n_threads, "bayes")?;
        let mut executor = ChunkedExecutor::new(&pool, self.params.n_chunks);
        if let Some(bb) = &self.telemetry {
            bb.set_stage(Stage::BayesFactor);
            bb.set_total_sites(n_snps as u64);
            executor = executor.with_telemetry(bb.clone());
        }

        let snps = data.snps();
        executor.run(
            n_snps,
            |range| {
                range
                    .map(|i| source.next_site(&snps[SnpIdx::from(i)]))
                    .collect()
            },
            |i, observations| {
                let snp = SnpIdx::from(i);
                test_site(data, averages, &laplace, snp, &observations)
                    .map_err(|e| at_site(e, i, &snps[snp]))
            },
            |i, inference| {
                let snp = SnpIdx::from(i);
                emit(snp, &snps[snp], inference)
            },
        )
    }
}

/// Long-block posteriors and the Laplace test at one SNP
fn test_site(
    data: &GeneticData,
    averages: &PairwiseAverageMatrix,
    laplace: &LaplaceApproximation,
    snp: SnpIdx,
    observations: &[HaplotypeObservation],
) -> Result<SiteInference> {
    let prob_long = site_prob_long(observations, averages)?;
    let alleles = data.alleles().site_alleles(snp);
    laplace.infer(&prob_long, &alleles)
}

/// Attach the SNP to a numeric failure
fn at_site(err: AbacusError, idx: usize, snp: &Snp) -> AbacusError {
    match err {
        AbacusError::Numeric { context, message } => {
            AbacusError::numeric(format!("SNP {} ({}), {}", idx, snp.rsid, context), message)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::genetic_map::GeneticMap;
    use crate::data::haplotype::HapIdx;
    use crate::data::marker::Snps;
    use crate::data::storage::{AlleleMatrix, DenseColumn};
    use crate::model::blocks::SummaryMatrix;

    fn panel(haps: &[&str]) -> GeneticData {
        let n_snps = haps[0].len();
        let columns = (0..n_snps)
            .map(|s| DenseColumn::from_alleles(haps.iter().map(|h| h.as_bytes()[s] == b'1')))
            .collect();
        let snps: Snps = (0..n_snps).map(|s| Snp::new(format!("rs{}", s), s as u32 + 1)).collect();
        GeneticData::new(
            snps,
            AlleleMatrix::from_columns(columns).unwrap(),
            GeneticMap::new((0..n_snps).map(|s| s as f64 * 0.1).collect()).unwrap(),
        )
        .unwrap()
    }

    fn paintings(n_haps: usize, n_snps: usize, length: f64) -> Vec<HaplotypePainting> {
        (0..n_haps)
            .map(|h| HaplotypePainting {
                target: HapIdx::from(h),
                donors: vec![HapIdx::from((h + 1) % n_haps); n_snps],
                block_lengths: vec![length; n_snps],
            })
            .collect()
    }

    fn averages(n: usize, value: f64) -> PairwiseAverageMatrix {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 0.0 } else { value }).collect())
            .collect();
        let lengths = SummaryMatrix::from_rows(rows).unwrap();
        let mut counts = SummaryMatrix::zeros(n);
        for i in 0..n {
            let row: Vec<f64> = (0..n).map(|j| if i == j { 0.0 } else { 1.0 }).collect();
            counts.set_row(HapIdx::from(i), &row);
        }
        PairwiseAverageMatrix::from_summaries(&lengths, &counts).unwrap()
    }

    #[test]
    fn test_results_in_snp_order() {
        let data = panel(&["0101010", "0110011", "1010101", "1100110"]);
        let paintings = paintings(4, 7, 0.5);
        let mut source = InMemorySites::new(&paintings).unwrap();
        let pipeline = BayesFactorPipeline::new(
            BayesFactorParams {
                n_chunks: 3,
                n_threads: 2,
                ..Default::default()
            },
            None,
        );
        let mut seen = Vec::new();
        let n = pipeline
            .run_with(&data, &averages(4, 0.5), &mut source, |idx, snp, inference| {
                assert!(inference.log10_bf.is_finite());
                seen.push((idx.as_usize(), snp.pos));
                Ok(())
            })
            .unwrap();
        assert_eq!(n, 7);
        assert_eq!(seen, (0..7).map(|i| (i, i as u32 + 1)).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_lengths_give_baseline() {
        let data = panel(&["01", "10", "11"]);
        let paintings = paintings(3, 2, 0.0);
        let mut source = InMemorySites::new(&paintings).unwrap();
        let pipeline = BayesFactorPipeline::new(BayesFactorParams::default(), None);
        let baseline = -0.5 * (2.0 * std::f64::consts::PI).log10();
        pipeline
            .run_with(&data, &averages(3, 1.0), &mut source, |_, _, inference| {
                assert!(inference.beta.abs() < 1e-12);
                assert!((inference.log10_bf - baseline).abs() < 1e-9);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_haplotype_count_mismatch() {
        let data = panel(&["01", "10", "11"]);
        let paintings = paintings(2, 2, 0.1);
        let mut source = InMemorySites::new(&paintings).unwrap();
        let pipeline = BayesFactorPipeline::new(BayesFactorParams::default(), None);
        let result = pipeline.run_with(&data, &averages(3, 1.0), &mut source, |_, _, _| Ok(()));
        assert!(matches!(result, Err(AbacusError::InvalidData { .. })));
    }

    #[test]
    fn test_undefined_mean_reports_site() {
        let data = panel(&["01", "10", "11"]);
        let paintings = paintings(3, 2, 0.1);
        let mut source = InMemorySites::new(&paintings).unwrap();
        let zeros = SummaryMatrix::zeros(3);
        let undefined = PairwiseAverageMatrix::from_summaries(&zeros, &zeros).unwrap();
        let pipeline = BayesFactorPipeline::new(BayesFactorParams::default(), None);
        match pipeline.run_with(&data, &undefined, &mut source, |_, _, _| Ok(())) {
            Err(AbacusError::Numeric { context, .. }) => {
                assert!(context.starts_with("SNP 0 (rs0)"))
            }
            other => panic!("expected numeric error, got {:?}", other),
        }
    }

    #[test]
    fn test_singular_fit_reports_site() {
        let data = panel(&["01", "10", "11"]);
        let paintings = paintings(3, 2, 0.0);
        let mut source = InMemorySites::new(&paintings).unwrap();
        let pipeline = BayesFactorPipeline::new(
            BayesFactorParams {
                sigma_beta: 1e200,
                ..Default::default()
            },
            None,
        );
        let mut emitted = 0;
        let result = pipeline.run_with(&data, &averages(3, 1.0), &mut source, |_, _, _| {
            emitted += 1;
            Ok(())
        });
        match result {
            Err(AbacusError::Numeric { context, message }) => {
                assert!(context.starts_with("SNP 0 (rs0), "), "{}", context);
                assert!(context.contains("Newton-Raphson"), "{}", context);
                assert!(message.contains("singular Hessian"), "{}", message);
            }
            other => panic!("expected numeric error, got {:?}", other),
        }
        assert_eq!(emitted, 0);
    }
}
