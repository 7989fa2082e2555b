//! # Configuration
//!
//! Command-line parsing and validation. Each subcommand carries its own
//! arguments; `parse_and_validate` rejects bad values before any data is read.
//!
//! ```bash
//! abacus genetic-map --haps chr1.haps.gz --recombination chr1.hapmap --out chr1.map
//! abacus paint --haps chr1.haps.gz --map chr1.map --out paint/chr1 --nthreads 8
//! abacus bayes-factor --haps chr1.haps.gz --map chr1.map --viterbi paint/chr1 --out chr1
//! ```

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::{AbacusError, Result};
use crate::io::haps::read_donor_list;
use crate::io::summaries::{counts_path, lengths_path};
use crate::model::donors::DonorStrategy;
use crate::pipelines::{BayesFactorParams, PaintingParams};

/// Haplotype painting and coalescence-length association testing
#[derive(Parser, Debug, Clone)]
#[command(name = "abacus", version, about)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Print span timings
    #[arg(long, global = true)]
    pub profile: bool,

    /// Only log warnings and errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Paint every haplotype and write the copying summaries
    Paint(PaintArgs),
    /// Per-SNP Bayes factors from a finished painting
    BayesFactor(BayesFactorArgs),
    /// Elementwise sum of two summary matrices
    Combine(CombineArgs),
    /// Interpolate a recombination map at the SNP positions of a haplotype file
    GeneticMap(GeneticMapArgs),
}

/// Donor set used for each target haplotype
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every other haplotype
    Haploid,
    /// Every haplotype except both copies of the target's sample
    Diploid,
    /// A fixed reference panel, minus the target
    Reference,
}

#[derive(Args, Debug, Clone)]
pub struct PaintArgs {
    /// Haplotype file (optionally gzipped)
    #[arg(long)]
    pub haps: PathBuf,

    /// Per-SNP cumulative genetic map (cM)
    #[arg(long)]
    pub map: PathBuf,

    /// Output prefix
    #[arg(long)]
    pub out: PathBuf,

    /// Effective population size
    #[arg(long, default_value_t = 10_000.0)]
    pub ne: f64,

    #[arg(long, value_enum, default_value_t = Mode::Haploid)]
    pub mode: Mode,

    /// Reference panel haplotype indices, one per line (reference mode)
    #[arg(long)]
    pub donors: Option<PathBuf>,

    /// Mutation parameter [default: Watterson's estimate]
    #[arg(long)]
    pub theta: Option<f64>,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Number of threads [default: all cores]
    #[arg(long)]
    pub nthreads: Option<usize>,

    /// Traceback memory bound per decode, in MB
    #[arg(long, default_value_t = 1024)]
    pub max_traceback_mb: usize,
}

#[derive(Args, Debug, Clone)]
pub struct BayesFactorArgs {
    #[arg(long)]
    pub haps: PathBuf,

    #[arg(long)]
    pub map: PathBuf,

    /// Output prefix of the painting run
    #[arg(long)]
    pub viterbi: PathBuf,

    /// Length summary [default: <viterbi>.viterbiLengths]
    #[arg(long)]
    pub lengths: Option<PathBuf>,

    /// Count summary [default: <viterbi>.viterbiCounts]
    #[arg(long)]
    pub counts: Option<PathBuf>,

    /// Output prefix
    #[arg(long)]
    pub out: PathBuf,

    /// Prior standard deviation of the effect size
    #[arg(long, default_value_t = 1.0)]
    pub sigma_beta: f64,

    /// Newton-Raphson iterations
    #[arg(long, default_value_t = 10)]
    pub iterations: usize,

    /// Number of SNP chunks held in memory one at a time
    #[arg(long, default_value_t = 100)]
    pub chunks: usize,

    #[arg(long)]
    pub nthreads: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct CombineArgs {
    #[arg(long)]
    pub first: PathBuf,

    #[arg(long)]
    pub second: PathBuf,

    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct GeneticMapArgs {
    #[arg(long)]
    pub haps: PathBuf,

    /// HapMap-format recombination map
    #[arg(long)]
    pub recombination: PathBuf,

    #[arg(long)]
    pub out: PathBuf,
}

impl Config {
    /// Parse the process arguments and validate them
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match &self.command {
            Command::Paint(args) => args.validate(),
            Command::BayesFactor(args) => args.validate(),
            Command::Combine(args) => {
                require_file(&args.first)?;
                require_file(&args.second)
            }
            Command::GeneticMap(args) => {
                require_file(&args.haps)?;
                require_file(&args.recombination)
            }
        }
    }
}

impl PaintArgs {
    fn validate(&self) -> Result<()> {
        require_file(&self.haps)?;
        require_file(&self.map)?;
        require_positive("ne", self.ne)?;
        if let Some(theta) = self.theta {
            require_positive("theta", theta)?;
        }
        match (self.mode, &self.donors) {
            (Mode::Reference, None) => {
                return Err(AbacusError::config("--mode reference requires --donors"));
            }
            (Mode::Reference, Some(path)) => require_file(path)?,
            (_, Some(_)) => {
                return Err(AbacusError::config("--donors is only used with --mode reference"));
            }
            (_, None) => {}
        }
        require_nonzero("max-traceback-mb", self.max_traceback_mb)
    }

    pub fn nthreads(&self) -> usize {
        self.nthreads.unwrap_or_else(default_threads)
    }

    /// Painting settings for a panel of `n_haps` haplotypes
    pub fn painting_params(&self, n_haps: usize) -> Result<PaintingParams> {
        let strategy = match self.mode {
            Mode::Haploid => DonorStrategy::AllOthers,
            Mode::Diploid => DonorStrategy::Diploid,
            Mode::Reference => {
                let path = self
                    .donors
                    .as_deref()
                    .ok_or_else(|| AbacusError::config("--mode reference requires --donors"))?;
                DonorStrategy::reference_panel(read_donor_list(path)?, n_haps)?
            }
        };
        Ok(PaintingParams {
            ne: self.ne,
            theta: self.theta,
            strategy,
            seed: self.seed,
            max_traceback_mb: self.max_traceback_mb,
            n_threads: self.nthreads(),
        })
    }
}

impl BayesFactorArgs {
    fn validate(&self) -> Result<()> {
        require_file(&self.haps)?;
        require_file(&self.map)?;
        require_file(&self.lengths_path())?;
        require_file(&self.counts_path())?;
        require_positive("sigma-beta", self.sigma_beta)?;
        require_nonzero("iterations", self.iterations)?;
        require_nonzero("chunks", self.chunks)
    }

    pub fn nthreads(&self) -> usize {
        self.nthreads.unwrap_or_else(default_threads)
    }

    pub fn lengths_path(&self) -> PathBuf {
        self.lengths.clone().unwrap_or_else(|| lengths_path(&self.viterbi))
    }

    pub fn counts_path(&self) -> PathBuf {
        self.counts.clone().unwrap_or_else(|| counts_path(&self.viterbi))
    }

    pub fn bayes_factor_params(&self) -> BayesFactorParams {
        BayesFactorParams {
            sigma_beta: self.sigma_beta,
            iterations: self.iterations,
            n_chunks: self.chunks,
            n_threads: self.nthreads(),
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AbacusError::file_not_found(path))
    }
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(AbacusError::config(format!("--{} must be positive, got {}", name, value)))
    }
}

fn require_nonzero(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        Err(AbacusError::config(format!("--{} must be at least 1", name)))
    } else {
        Ok(())
    }
}
