//! # Workspace Pattern for Viterbi Buffers
//!
//! Pre-allocated buffers for the painting decode, reused across every
//! haplotype a worker thread paints. The decode takes `&mut ViterbiWorkspace`
//! instead of owning its scratch space, so a thread allocates once and the
//! buffers only grow.

/// Scratch space for one Viterbi decode
#[derive(Debug, Default)]
pub struct ViterbiWorkspace {
    /// Log-probabilities at the current SNP (n_states)
    pub logp: Vec<f64>,

    /// Log-probabilities being built for the next SNP (n_states)
    pub next: Vec<f64>,

    /// Backpointer arena for one traceback block (block_rows x n_states)
    pub backpointers: Vec<u32>,

    /// Log-probabilities at the start of every traceback block (n_blocks x n_states)
    pub checkpoints: Vec<f64>,

    /// States tied for the maximum during an arg-max
    pub ties: Vec<u32>,
}

impl ViterbiWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size buffers for a decode with the given dimensions
    pub fn resize(&mut self, n_states: usize, block_rows: usize, n_blocks: usize) {
        self.logp.clear();
        self.logp.resize(n_states, 0.0);
        self.next.clear();
        self.next.resize(n_states, 0.0);
        self.backpointers.clear();
        self.backpointers.resize(block_rows * n_states, 0);
        self.checkpoints.clear();
        self.checkpoints.resize(n_blocks * n_states, 0.0);
        self.ties.clear();
    }

    /// Heap bytes currently held
    pub fn size_bytes(&self) -> usize {
        (self.logp.capacity() + self.next.capacity() + self.checkpoints.capacity())
            * std::mem::size_of::<f64>()
            + (self.backpointers.capacity() + self.ties.capacity()) * std::mem::size_of::<u32>()
    }
}
