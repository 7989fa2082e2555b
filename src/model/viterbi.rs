//! # Painting Engine
//!
//! Viterbi decoding of one target haplotype under the Li-Stephens copying
//! model.
//!
//! Every "switch" transition has the same probability, so the best
//! predecessor of any state is either the state itself (stay) or the single
//! best state of the previous SNP (switch from the champion). One arg-max per
//! SNP replaces the inner loop of the textbook O(n^2) recursion:
//!
//! ```text
//! champ      = argmax_k logp[k]                      (ties: uniform random)
//! logp'[j]   = emit(j) + max(logp[j] + ln stay, logp[champ] + ln switch)
//! back[t][j] = j or champ
//! ```
//!
//! ## Bounded traceback
//! The backpointer table (SNPs x states) is the dominant memory cost. It is
//! stored in a flat arena covering one block of SNP steps. The forward pass
//! records the log-probability vector and the RNG state at the start of every
//! block; traceback recomputes each earlier block from its checkpoint. The
//! replay draws the same tie-breaks, so the decoded path matches the
//! unbounded decode exactly.
//!
//! The memory limit covers the arena and both kinds of checkpoint. More
//! blocks shrink the arena but add checkpoints, so the total is smallest near
//! `sqrt(steps * checkpoint / row)` rows per block.

use rand::Rng;
use tracing::trace;

use crate::data::genetic_data::GeneticData;
use crate::data::haplotype::HapIdx;
use crate::data::marker::SnpIdx;
use crate::error::{AbacusError, Result};
use crate::model::blocks::{extract_blocks, BlockStats, HaplotypePainting};
use crate::model::donors::DonorSet;
use crate::model::parameters::{Emissions, ModelParams};
use crate::utils::workspace::ViterbiWorkspace;

/// Decoded donor state per SNP.
///
/// States are stored 1-based as positions in the target's recipient list;
/// 0 is reserved for "undefined".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViterbiPath {
    states: Vec<u32>,
}

impl ViterbiPath {
    /// Build from 0-based states
    pub fn from_states(states: impl IntoIterator<Item = usize>) -> Self {
        Self {
            states: states.into_iter().map(|s| s as u32 + 1).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// 1-based encoded state at a SNP
    pub fn encoded(&self, snp: SnpIdx) -> u32 {
        self.states[snp.as_usize()]
    }

    /// 0-based recipient position at a SNP, `None` if undefined
    pub fn state(&self, snp: SnpIdx) -> Option<usize> {
        self.encoded(snp).checked_sub(1).map(|s| s as usize)
    }

    /// Translate states into donor haplotypes
    pub fn donors(&self, donors: &DonorSet) -> Result<Vec<HapIdx>> {
        self.states
            .iter()
            .enumerate()
            .map(|(snp, &s)| match s.checked_sub(1) {
                Some(state) if (state as usize) < donors.n_states() => {
                    Ok(donors.donor(state as usize))
                }
                _ => Err(AbacusError::invalid_data(format!(
                    "Undefined donor state {} at SNP {} for haplotype {}",
                    s,
                    snp,
                    donors.target().0
                ))),
            })
            .collect()
    }
}

/// Arg-max over `values`, breaking ties uniformly at random.
///
/// The RNG is only consulted when more than one state attains the maximum.
pub fn argmax_with_ties<R: Rng + ?Sized>(
    values: &[f64],
    ties: &mut Vec<u32>,
    rng: &mut R,
) -> (usize, f64) {
    ties.clear();
    let mut best = f64::NEG_INFINITY;
    for (k, &v) in values.iter().enumerate() {
        if v > best {
            best = v;
            ties.clear();
            ties.push(k as u32);
        } else if v == best {
            ties.push(k as u32);
        }
    }
    match ties.len() {
        0 => (0, best),
        1 => (ties[0] as usize, best),
        n => (ties[rng.gen_range(0..n)] as usize, best),
    }
}

/// Per-haplotype Viterbi decoder over a shared panel
#[derive(Clone, Copy, Debug)]
pub struct PaintingEngine<'a> {
    data: &'a GeneticData,
    params: ModelParams,
    max_traceback_bytes: usize,
}

impl<'a> PaintingEngine<'a> {
    pub fn new(data: &'a GeneticData, params: ModelParams) -> Self {
        Self {
            data,
            params,
            max_traceback_bytes: usize::MAX,
        }
    }

    /// Bound the traceback memory of each decode (backpointers plus checkpoints)
    pub fn with_traceback_limit(mut self, max_bytes: usize) -> Self {
        self.max_traceback_bytes = max_bytes;
        self
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Traceback bytes held by a decode using `rows` SNP steps per block
    pub fn traceback_bytes(&self, rows: usize, n_states: usize, rng_bytes: usize) -> usize {
        let steps = self.n_steps();
        let rows = rows.clamp(1, steps);
        let arena = rows.saturating_mul(n_states).saturating_mul(std::mem::size_of::<u32>());
        let per_block = n_states
            .saturating_mul(std::mem::size_of::<f64>())
            .saturating_add(rng_bytes);
        arena.saturating_add(steps.div_ceil(rows).saturating_mul(per_block))
    }

    /// SNP steps per traceback block for `n_states` states and an RNG of `rng_bytes`.
    ///
    /// Picks the fewest blocks whose total traceback memory fits the limit,
    /// each block as short as that block count allows. Fails when even the
    /// best split exceeds the limit.
    pub fn block_rows(&self, n_states: usize, rng_bytes: usize) -> Result<usize> {
        let steps = self.n_steps();
        let n_states = n_states.max(1);
        let per_block = n_states
            .saturating_mul(std::mem::size_of::<f64>())
            .saturating_add(rng_bytes);

        for n_blocks in 1..=steps {
            let rows = steps.div_ceil(n_blocks);
            if self.traceback_bytes(rows, n_states, rng_bytes) <= self.max_traceback_bytes {
                return Ok(rows);
            }
            // Checkpoints alone only grow from here
            if steps.div_ceil(rows).saturating_mul(per_block) > self.max_traceback_bytes {
                break;
            }
        }
        Err(AbacusError::config(format!(
            "traceback limit of {} bytes cannot hold {} states over {} SNPs",
            self.max_traceback_bytes,
            n_states,
            steps + 1
        )))
    }

    fn n_steps(&self) -> usize {
        self.data.n_snps().saturating_sub(1).max(1)
    }

    /// Decode and summarise one target: path, per-SNP block lengths, donor stats
    pub fn paint<R: Rng + Clone>(
        &self,
        donors: &DonorSet,
        rng: &mut R,
        ws: &mut ViterbiWorkspace,
    ) -> Result<(HaplotypePainting, BlockStats)> {
        let path = self.decode(donors, rng, ws)?;
        let donor_haps = path.donors(donors)?;
        extract_blocks(
            donors.target(),
            donor_haps,
            self.data.map(),
            self.data.n_haplotypes(),
        )
    }

    /// Most likely donor state sequence for the target of `donors`
    pub fn decode<R: Rng + Clone>(
        &self,
        donors: &DonorSet,
        rng: &mut R,
        ws: &mut ViterbiWorkspace,
    ) -> Result<ViterbiPath> {
        let n_snps = self.data.n_snps();
        let n_states = donors.n_states();
        if n_snps == 0 || n_states == 0 {
            return Err(AbacusError::invalid_data(format!(
                "Cannot paint haplotype {} with {} SNPs and {} donors",
                donors.target().0,
                n_snps,
                n_states
            )));
        }

        let block_rows = self.block_rows(n_states, std::mem::size_of::<R>())?;
        let n_steps = n_snps - 1;
        let n_blocks = n_steps.div_ceil(block_rows);
        ws.resize(n_states, block_rows, n_blocks);

        let emissions = self.params.emissions(n_states);
        let target = donors.target();

        // Initialise at the first SNP
        self.emit_into(SnpIdx::new(0), target, donors, &emissions, &mut ws.logp);
        let log_n = (n_states as f64).ln();
        for v in ws.logp.iter_mut() {
            *v -= log_n;
        }

        // Forward pass, one traceback block at a time
        let mut rng_checkpoints: Vec<R> = Vec::with_capacity(n_blocks);
        for block in 0..n_blocks {
            ws.checkpoints[block * n_states..(block + 1) * n_states].copy_from_slice(&ws.logp);
            rng_checkpoints.push(rng.clone());
            self.forward_block(block, block_rows, donors, &emissions, rng, ws)?;
        }

        let (last, best) = argmax_with_ties(&ws.logp, &mut ws.ties, rng);
        if !best.is_finite() {
            return Err(AbacusError::numeric(
                format!("haplotype {}", target.0),
                format!("final log-probability is {}", best),
            ));
        }

        // Traceback. The arena still holds the last block.
        let mut states = vec![0usize; n_snps];
        states[n_snps - 1] = last;
        for block in (0..n_blocks).rev() {
            if block + 1 < n_blocks {
                let mut replay_rng = rng_checkpoints[block].clone();
                ws.logp
                    .copy_from_slice(&ws.checkpoints[block * n_states..(block + 1) * n_states]);
                self.forward_block(block, block_rows, donors, &emissions, &mut replay_rng, ws)?;
            }
            let first_step = 1 + block * block_rows;
            let end_step = (first_step + block_rows).min(n_snps);
            for t in (first_step..end_step).rev() {
                let row = (t - first_step) * n_states;
                states[t - 1] = ws.backpointers[row + states[t]] as usize;
            }
        }

        trace!(
            haplotype = target.0,
            n_blocks,
            block_rows,
            workspace_bytes = ws.size_bytes(),
            "Decoded Viterbi path"
        );
        Ok(ViterbiPath::from_states(states))
    }

    /// Emission log-probabilities of every state at one SNP
    fn emit_into(
        &self,
        snp: SnpIdx,
        target: HapIdx,
        donors: &DonorSet,
        emissions: &Emissions,
        out: &mut [f64],
    ) {
        let column = self.data.alleles().column(snp);
        let target_allele = column.get(target);
        for (v, &donor) in out.iter_mut().zip(donors.recipients()) {
            *v = emissions.log_emit(target_allele, column.get(donor));
        }
    }

    /// Run the forward steps of one traceback block, filling the arena
    fn forward_block<R: Rng>(
        &self,
        block: usize,
        block_rows: usize,
        donors: &DonorSet,
        emissions: &Emissions,
        rng: &mut R,
        ws: &mut ViterbiWorkspace,
    ) -> Result<()> {
        let n_snps = self.data.n_snps();
        let n_states = donors.n_states();
        let map = self.data.map();
        let first_step = 1 + block * block_rows;
        let end_step = (first_step + block_rows).min(n_snps);

        for t in first_step..end_step {
            let snp = SnpIdx::from(t);
            let transition = self
                .params
                .transition(map.distance_cm(SnpIdx::from(t - 1), snp), n_states);

            let (champ, best) = argmax_with_ties(&ws.logp, &mut ws.ties, rng);
            if !best.is_finite() {
                return Err(AbacusError::numeric(
                    format!("haplotype {} at SNP {}", donors.target().0, t - 1),
                    format!("log-probability is {}", best),
                ));
            }
            let from_champ = best + transition.log_switch;

            self.emit_into(snp, donors.target(), donors, emissions, &mut ws.next);
            let offset = (t - first_step) * n_states;
            let row = &mut ws.backpointers[offset..offset + n_states];
            for j in 0..n_states {
                let stay = ws.logp[j] + transition.log_stay;
                if stay > from_champ {
                    ws.next[j] += stay;
                    row[j] = j as u32;
                } else {
                    ws.next[j] += from_champ;
                    row[j] = champ as u32;
                }
            }
            std::mem::swap(&mut ws.logp, &mut ws.next);
        }
        Ok(())
    }
}
