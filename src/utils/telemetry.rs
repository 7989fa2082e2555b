//! # Progress Telemetry
//!
//! Painting workers and the Bayes-factor driver bump relaxed atomic counters;
//! a heartbeat thread samples them on a fixed interval and prints one
//! progress line to stderr (a rewritten status line on a terminal).

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::Result;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    Initializing,
    LoadingData,
    Painting,
    WritingSummaries,
    BayesFactor,
    WritingOutput,
    Complete,
}

const STAGES: [Stage; 7] = [
    Stage::Initializing,
    Stage::LoadingData,
    Stage::Painting,
    Stage::WritingSummaries,
    Stage::BayesFactor,
    Stage::WritingOutput,
    Stage::Complete,
];

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initializing => "initializing",
            Stage::LoadingData => "loading",
            Stage::Painting => "painting",
            Stage::WritingSummaries => "summaries",
            Stage::BayesFactor => "bayes-factor",
            Stage::WritingOutput => "writing",
            Stage::Complete => "complete",
        }
    }

    /// Unit counted while in this stage
    fn unit(self) -> &'static str {
        match self {
            Stage::Painting | Stage::WritingSummaries => "haplotypes",
            _ => "sites",
        }
    }

    fn from_code(code: u8) -> Self {
        STAGES.get(code as usize).copied().unwrap_or(Stage::Complete)
    }
}

/// Shared progress counters
pub struct TelemetryBlackboard {
    stage: AtomicU8,
    chunk: AtomicU64,
    n_chunks: AtomicU64,
    haplotypes_done: AtomicU64,
    haplotypes_total: AtomicU64,
    sites_done: AtomicU64,
    sites_total: AtomicU64,
    started: Instant,
    /// Nanoseconds since `started` at the last counter update
    last_update: AtomicU64,
    shutdown: AtomicBool,
}

impl TelemetryBlackboard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_stage(&self, stage: Stage) {
        self.stage.store(stage as u8, Ordering::Relaxed);
        self.touch();
    }

    pub fn stage(&self) -> Stage {
        Stage::from_code(self.stage.load(Ordering::Relaxed))
    }

    pub fn set_total_haplotypes(&self, n: u64) {
        self.haplotypes_total.store(n, Ordering::Relaxed);
        self.haplotypes_done.store(0, Ordering::Relaxed);
    }

    /// Record one painted haplotype
    #[inline]
    pub fn haplotype_done(&self) {
        self.haplotypes_done.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    pub fn haplotypes_processed(&self) -> u64 {
        self.haplotypes_done.load(Ordering::Relaxed)
    }

    pub fn set_total_sites(&self, n: u64) {
        self.sites_total.store(n, Ordering::Relaxed);
        self.sites_done.store(0, Ordering::Relaxed);
    }

    pub fn set_sites_processed(&self, n: u64) {
        self.sites_done.store(n, Ordering::Relaxed);
        self.touch();
    }

    pub fn sites_processed(&self) -> u64 {
        self.sites_done.load(Ordering::Relaxed)
    }

    pub fn set_chunks(&self, current: u64, total: u64) {
        self.chunk.store(current, Ordering::Relaxed);
        self.n_chunks.store(total, Ordering::Relaxed);
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    fn touch(&self) {
        let now = self.started.elapsed().as_nanos() as u64;
        self.last_update.store(now, Ordering::Relaxed);
    }

    /// (done, total) for the current stage's unit
    fn progress(&self) -> (u64, u64) {
        match self.stage() {
            Stage::Painting | Stage::WritingSummaries => (
                self.haplotypes_processed(),
                self.haplotypes_total.load(Ordering::Relaxed),
            ),
            _ => (self.sites_processed(), self.sites_total.load(Ordering::Relaxed)),
        }
    }

    fn idle_secs(&self) -> u64 {
        let now = self.started.elapsed().as_nanos() as u64;
        now.saturating_sub(self.last_update.load(Ordering::Relaxed)) / 1_000_000_000
    }
}

impl Default for TelemetryBlackboard {
    fn default() -> Self {
        Self {
            stage: AtomicU8::new(Stage::Initializing as u8),
            chunk: AtomicU64::new(0),
            n_chunks: AtomicU64::new(0),
            haplotypes_done: AtomicU64::new(0),
            haplotypes_total: AtomicU64::new(0),
            sites_done: AtomicU64::new(0),
            sites_total: AtomicU64::new(0),
            started: Instant::now(),
            last_update: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        }
    }
}

fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (100.0 * done as f64 / total as f64).min(100.0)
    }
}

/// Heartbeat output configuration
pub struct HeartbeatConfig {
    pub interval: Duration,
    /// Idle time after which the line is flagged as stalled
    pub stall_after: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            stall_after: Duration::from_secs(300),
        }
    }
}

/// Handle to the heartbeat thread
pub struct HeartbeatHandle {
    handle: Option<JoinHandle<()>>,
    blackboard: Arc<TelemetryBlackboard>,
}

impl HeartbeatHandle {
    pub fn spawn(blackboard: Arc<TelemetryBlackboard>, config: HeartbeatConfig) -> Result<Self> {
        let bb = blackboard.clone();
        let handle = thread::Builder::new()
            .name("abacus-heartbeat".to_string())
            .spawn(move || heartbeat(&bb, &config, io::stderr().is_terminal()))?;
        Ok(Self {
            handle: Some(handle),
            blackboard,
        })
    }

    /// Stop the thread and wait for it
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.blackboard.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn format_duration(secs: f64) -> String {
    match secs {
        s if s < 60.0 => format!("{:.0}s", s),
        s if s < 3600.0 => format!("{:.0}m{:.0}s", (s / 60.0).floor(), s % 60.0),
        s => format!("{:.1}h", s / 3600.0),
    }
}

/// One progress line
fn status_line(bb: &TelemetryBlackboard, rate: f64, stalled: bool) -> String {
    let stage = bb.stage();
    let (done, total) = bb.progress();
    let eta = if rate > 0.0 && total > done {
        format_duration((total - done) as f64 / rate)
    } else {
        "-".to_string()
    };
    format!(
        "[{}] {}/{} {} ({:.1}%) chunk {}/{} | {:.1}/s | elapsed {} | eta {}{}",
        stage.as_str(),
        done,
        total,
        stage.unit(),
        percent(done, total),
        bb.chunk.load(Ordering::Relaxed),
        bb.n_chunks.load(Ordering::Relaxed),
        rate,
        format_duration(bb.elapsed_secs()),
        eta,
        if stalled { " STALLED" } else { "" }
    )
}

fn heartbeat(bb: &TelemetryBlackboard, config: &HeartbeatConfig, is_tty: bool) {
    let mut last = (0u64, Instant::now());

    while !bb.shutdown.load(Ordering::SeqCst) {
        thread::park_timeout(config.interval);
        if bb.shutdown.load(Ordering::SeqCst) {
            break;
        }

        let (done, _) = bb.progress();
        let now = Instant::now();
        let dt = now.duration_since(last.1).as_secs_f64();
        let rate = if dt > 0.0 {
            done.saturating_sub(last.0) as f64 / dt
        } else {
            0.0
        };
        last = (done, now);

        let line = status_line(bb, rate, bb.idle_secs() > config.stall_after.as_secs());
        if is_tty {
            eprint!("\r{}\x1b[K", line);
            let _ = io::stderr().flush();
        } else {
            eprintln!("{}", line);
        }
    }

    if is_tty {
        eprint!("\r\x1b[K");
        let _ = io::stderr().flush();
    }
}
