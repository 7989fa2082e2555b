//! Painting behaviour on small hand-built panels.
//!
//! Panels are written to disk and loaded through the public readers, then
//! decoded with the painting engine directly so individual paths can be
//! inspected.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;

use abacus::data::{GeneticData, HapIdx};
use abacus::io::haps::load_genetic_data;
use abacus::model::{BlockStats, DonorStrategy, HaplotypePainting, ModelParams, PaintingEngine};
use abacus::pipelines::{PaintingParams, PaintingPipeline};
use abacus::utils::workspace::ViterbiWorkspace;

/// Write `<dir>/panel.haps` and `<dir>/panel.map`; `haps[h]` is haplotype h's allele string
fn write_panel(dir: &Path, haps: &[&str], cm: &[f64]) -> (PathBuf, PathBuf) {
    let n_snps = haps[0].len();
    assert_eq!(n_snps, cm.len());
    let mut rows = String::new();
    for s in 0..n_snps {
        rows.push_str(&format!("rs{} snp{} {} A G", s + 1, s + 1, 1000 * (s + 1)));
        for h in haps {
            rows.push(' ');
            rows.push(h.as_bytes()[s] as char);
        }
        rows.push('\n');
    }
    let haps_path = dir.join("panel.haps");
    let map_path = dir.join("panel.map");
    fs::write(&haps_path, rows).unwrap();
    fs::write(
        &map_path,
        cm.iter().map(|v| format!("{}\n", v)).collect::<String>(),
    )
    .unwrap();
    (haps_path, map_path)
}

fn load(dir: &Path, haps: &[&str], cm: &[f64]) -> GeneticData {
    let (haps_path, map_path) = write_panel(dir, haps, cm);
    load_genetic_data(&haps_path, &map_path).unwrap()
}

fn paint(
    data: &GeneticData,
    ne: f64,
    target: usize,
    seed: u64,
    limit: usize,
) -> (HaplotypePainting, BlockStats) {
    let n_haps = data.n_haplotypes();
    let params = ModelParams::for_panel(ne, n_haps).unwrap();
    let engine = PaintingEngine::new(data, params).with_traceback_limit(limit);
    let donors = DonorStrategy::AllOthers
        .donor_set(HapIdx::from(target), n_haps)
        .unwrap();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ws = ViterbiWorkspace::new();
    engine.paint(&donors, &mut rng, &mut ws).unwrap()
}

#[test]
fn two_identical_haplotypes_form_one_block() {
    let dir = tempfile::tempdir().unwrap();
    let data = load(dir.path(), &["010", "010"], &[0.0, 0.1, 0.3]);

    let (painting, stats) = paint(&data, 10_000.0, 0, 0, usize::MAX);
    assert_eq!(painting.donors, vec![HapIdx::new(1); 3]);
    for length in &painting.block_lengths {
        assert!((length - 0.3).abs() < 1e-12);
    }
    assert!((stats.totals[1] - 0.3).abs() < 1e-12);
    assert_eq!(stats.counts, vec![0.0, 1.0]);
}

#[test]
fn sharp_transition_switches_donor_once() {
    let dir = tempfile::tempdir().unwrap();
    let cm: Vec<f64> = (0..10).map(|i| i as f64 * 0.1).collect();
    let data = load(
        dir.path(),
        &[
            "0101010101",
            "0101001010", // matches haplotype 0 on SNPs 0..5
            "1010110101", // matches haplotype 0 on SNPs 5..10
            "1010101010",
        ],
        &cm,
    );

    let (painting, stats) = paint(&data, 100.0, 0, 0, usize::MAX);
    let expected: Vec<HapIdx> = (0..10)
        .map(|s| HapIdx::new(if s < 5 { 1 } else { 2 }))
        .collect();
    assert_eq!(painting.donors, expected);

    // The boundary sits halfway between SNPs 4 and 5
    let boundary = (cm[4] + cm[5]) / 2.0;
    for s in 0..5 {
        assert!((painting.block_lengths[s] - boundary).abs() < 1e-12);
    }
    for s in 5..10 {
        assert!((painting.block_lengths[s] - (cm[9] - boundary)).abs() < 1e-12);
    }
    assert_eq!(stats.counts, vec![0.0, 1.0, 1.0, 0.0]);
    assert!((stats.total_length() - data.map().span()).abs() < 1e-12);
}

#[test]
fn bounded_traceback_reproduces_unbounded_path() {
    let dir = tempfile::tempdir().unwrap();
    // 48 haplotypes over 300 SNPs: enough states that replaying blocks saves memory
    let n_snps = 300;
    let haps: Vec<String> = (0..48)
        .map(|h| {
            (0..n_snps)
                .map(|s| if (h * 31 + s * 17 + h * s) % 7 < 3 { '1' } else { '0' })
                .collect()
        })
        .collect();
    let haps: Vec<&str> = haps.iter().map(String::as_str).collect();
    let cm: Vec<f64> = (0..n_snps).map(|i| i as f64 * 0.004).collect();
    let data = load(dir.path(), &haps, &cm);

    let n_states = haps.len() - 1;
    let rng_bytes = std::mem::size_of::<StdRng>();
    let params = ModelParams::for_panel(500.0, haps.len()).unwrap();
    let unbounded_engine = PaintingEngine::new(&data, params);
    let limit = unbounded_engine.traceback_bytes(30, n_states, rng_bytes);
    let block_rows = unbounded_engine
        .with_traceback_limit(limit)
        .block_rows(n_states, rng_bytes)
        .unwrap();
    assert!(block_rows < n_snps - 1);
    assert!(limit < unbounded_engine.traceback_bytes(n_snps - 1, n_states, rng_bytes));

    for target in [0, 1, 23, 47] {
        let unbounded = paint(&data, 500.0, target, 11, usize::MAX);
        let bounded = paint(&data, 500.0, target, 11, limit);
        assert_eq!(unbounded, bounded, "haplotype {}", target);
    }
}

#[test]
fn same_seed_gives_same_painting() {
    let dir = tempfile::tempdir().unwrap();
    // Haplotypes 1, 2 and 3 are identical, so every step is a three-way tie
    let data = load(dir.path(), &["0110", "0110", "0110", "0110"], &[0.0, 0.1, 0.2, 0.3]);

    let first = paint(&data, 10_000.0, 0, 42, usize::MAX);
    let second = paint(&data, 10_000.0, 0, 42, usize::MAX);
    assert_eq!(first, second);
    assert!(first.0.donors.iter().all(|d| (1..4).contains(&d.0)));
}

#[test]
fn pipeline_rows_conserve_span_in_every_mode() {
    let dir = tempfile::tempdir().unwrap();
    let data = load(
        dir.path(),
        &["0110", "0111", "1001", "0001", "1110", "0100"],
        &[0.0, 0.2, 0.5, 0.9],
    );

    let strategies = [
        DonorStrategy::AllOthers,
        DonorStrategy::Diploid,
        DonorStrategy::reference_panel(vec![HapIdx::new(0), HapIdx::new(3), HapIdx::new(5)], 6)
            .unwrap(),
    ];
    for strategy in strategies {
        let params = PaintingParams {
            strategy: strategy.clone(),
            n_threads: 2,
            ..Default::default()
        };
        let summaries = PaintingPipeline::new(params, None)
            .paint_all(&data, |_| Ok(()))
            .unwrap();
        for h in 0..6usize {
            let hap = HapIdx::from(h);
            let row: f64 = summaries.lengths.row(hap).iter().sum();
            assert!((row - 0.9).abs() < 1e-12, "{:?} haplotype {}", strategy, h);
            assert_eq!(summaries.counts.get(hap, hap), 0.0);
            if matches!(strategy, DonorStrategy::Diploid) {
                assert_eq!(summaries.counts.get(hap, hap.other()), 0.0);
            }
        }
    }
}
