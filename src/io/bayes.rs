//! # Bayes Factor Output
//!
//! `<prefix>.bayesfactor`, one line per SNP in panel order:
//!
//! ```text
//! rsid position log10_bf beta
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::data::marker::Snp;
use crate::error::Result;
use crate::io::text::create_writer;
use crate::io::with_suffix;
use crate::model::laplace::SiteInference;

pub fn bayes_factor_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, ".bayesfactor")
}

/// Sequential writer; callers must emit sites in order
pub struct BayesFactorWriter {
    writer: Box<dyn Write + Send>,
    path: PathBuf,
    n_written: usize,
}

impl BayesFactorWriter {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: create_writer(path)?,
            path: path.to_path_buf(),
            n_written: 0,
        })
    }

    pub fn write_site(&mut self, snp: &Snp, inference: &SiteInference) -> Result<()> {
        writeln!(
            self.writer,
            "{} {} {} {}",
            snp.rsid, snp.pos, inference.log10_bf, inference.beta
        )?;
        self.n_written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        debug!(path = ?self.path, n_sites = self.n_written, "Closed Bayes factor file");
        Ok(self.n_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_sites() {
        let dir = tempfile::tempdir().unwrap();
        let path = bayes_factor_path(&dir.path().join("run"));
        let mut writer = BayesFactorWriter::create(&path).unwrap();
        writer
            .write_site(
                &Snp::new("rs1", 10),
                &SiteInference {
                    log10_bf: 1.5,
                    beta: -0.25,
                },
            )
            .unwrap();
        assert_eq!(writer.finish().unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "rs1 10 1.5 -0.25\n");
    }
}
