//! # Abacus: Haplotype Painting and Coalescence-Length Association
//!
//! ## Usage
//! ```bash
//! # Per-SNP genetic map from a HapMap recombination map
//! abacus genetic-map --haps chr1.haps.gz --recombination chr1.hapmap --out chr1.map
//!
//! # Paint every haplotype against all others
//! abacus paint --haps chr1.haps.gz --map chr1.map --out paint/chr1
//!
//! # Bayes factors from the painting
//! abacus bayes-factor --haps chr1.haps.gz --map chr1.map --viterbi paint/chr1 --out chr1
//!
//! # With span timings
//! abacus --profile paint --haps chr1.haps.gz --map chr1.map --out paint/chr1
//! ```

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use abacus::config::{BayesFactorArgs, Command, Config, GeneticMapArgs, PaintArgs};
use abacus::data::genetic_map::RecombinationMap;
use abacus::io::haps::{load_genetic_data, HaplotypePanel};
use abacus::io::summaries::combine;
use abacus::pipelines::{BayesFactorPipeline, PaintingPipeline};
use abacus::utils::telemetry::{HeartbeatConfig, HeartbeatHandle, Stage, TelemetryBlackboard};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber; `--profile` adds span-close timings
fn init_tracing(profile: bool, quiet: bool) {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let span_events = if profile { FmtSpan::CLOSE } else { FmtSpan::NONE };
    let level = if quiet { LevelFilter::WARN } else { LevelFilter::INFO };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(span_events)
                .with_target(false)
                .with_timer(fmt::time::uptime()),
        )
        .with(level)
        .init();
}

fn run() -> Result<()> {
    let start = Instant::now();
    let config = Config::parse_and_validate()?;
    init_tracing(config.profile, config.quiet);
    info!(version = env!("CARGO_PKG_VERSION"), "Abacus");

    let telemetry = TelemetryBlackboard::new();
    let heartbeat = if config.quiet {
        None
    } else {
        Some(HeartbeatHandle::spawn(telemetry.clone(), HeartbeatConfig::default())?)
    };

    let result = match &config.command {
        Command::Paint(args) => paint(args, &telemetry),
        Command::BayesFactor(args) => bayes_factor(args, &telemetry),
        Command::Combine(args) => combine(&args.first, &args.second, &args.output)
            .with_context(|| format!("Combining {:?} and {:?}", args.first, args.second)),
        Command::GeneticMap(args) => genetic_map(args),
    };

    telemetry.set_stage(Stage::Complete);
    if let Some(heartbeat) = heartbeat {
        heartbeat.shutdown();
    }
    result?;

    info!(elapsed_secs = start.elapsed().as_secs_f64(), "Completed");
    Ok(())
}

fn paint(args: &PaintArgs, telemetry: &std::sync::Arc<TelemetryBlackboard>) -> Result<()> {
    telemetry.set_stage(Stage::LoadingData);
    let data = load_genetic_data(&args.haps, &args.map).context("Loading haplotype panel")?;
    let params = args.painting_params(data.n_haplotypes())?;
    info!(threads = params.n_threads, mode = ?args.mode, "Painting");

    PaintingPipeline::new(params, Some(telemetry.clone()))
        .run(&data, &args.out)
        .with_context(|| format!("Painting into {:?}", args.out))?;
    Ok(())
}

fn bayes_factor(
    args: &BayesFactorArgs,
    telemetry: &std::sync::Arc<TelemetryBlackboard>,
) -> Result<()> {
    telemetry.set_stage(Stage::LoadingData);
    let data = load_genetic_data(&args.haps, &args.map).context("Loading haplotype panel")?;

    let path = BayesFactorPipeline::new(args.bayes_factor_params(), Some(telemetry.clone()))
        .run(
            &data,
            &args.viterbi,
            &args.lengths_path(),
            &args.counts_path(),
            &args.out,
        )
        .with_context(|| format!("Testing sites from painting {:?}", args.viterbi))?;
    info!(path = ?path, "Bayes factors written");
    Ok(())
}

fn genetic_map(args: &GeneticMapArgs) -> Result<()> {
    let panel = HaplotypePanel::from_file(&args.haps)?;
    let recombination = RecombinationMap::from_hapmap_file(&args.recombination)?;
    let map = recombination.genetic_map_for(&panel.snps.positions())?;
    map.write_file(&args.out)
        .with_context(|| format!("Writing genetic map {:?}", args.out))?;
    info!(n_snps = map.len(), path = ?args.out, "Wrote genetic map");
    Ok(())
}
