//! # Painting Files
//!
//! One file per target haplotype, `<prefix>_<hap>.viterbi`, one line per SNP:
//!
//! ```text
//! position rsid donor block_length
//! ```
//!
//! `donor` is the 1-based haplotype index of the copied donor. The
//! Bayes-factor stage streams all files in lockstep, one SNP at a time.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use crate::data::haplotype::HapIdx;
use crate::data::marker::{Snp, Snps};
use crate::error::{AbacusError, Result};
use crate::io::text::{create_writer, open_reader};
use crate::io::with_suffix;
use crate::model::blocks::HaplotypePainting;
use crate::model::coalescence::HaplotypeObservation;

/// Path of the painting file for `hap`
pub fn painting_path(prefix: &Path, hap: HapIdx) -> PathBuf {
    with_suffix(prefix, &format!("_{}.viterbi", hap.0))
}

/// Write one haplotype's painting
pub fn write_painting(prefix: &Path, painting: &HaplotypePainting, snps: &Snps) -> Result<PathBuf> {
    if painting.n_snps() != snps.len() {
        return Err(AbacusError::invalid_data(format!(
            "Painting of haplotype {} covers {} SNPs, panel has {}",
            painting.target.0,
            painting.n_snps(),
            snps.len()
        )));
    }
    let path = painting_path(prefix, painting.target);
    let mut writer = create_writer(&path)?;
    for ((snp, donor), length) in snps
        .iter()
        .zip(&painting.donors)
        .zip(&painting.block_lengths)
    {
        writeln!(writer, "{} {} {} {}", snp.pos, snp.rsid, donor.label(), length)?;
    }
    writer.flush()?;
    Ok(path)
}

/// Line-by-line reader over one painting file
struct PaintingReader {
    path: PathBuf,
    lines: std::io::Lines<Box<dyn BufRead + Send>>,
    line_num: usize,
}

impl PaintingReader {
    fn next_record(&mut self, snp: &Snp, n_haps: usize) -> Result<HaplotypeObservation> {
        self.line_num += 1;
        let line = match self.lines.next() {
            Some(line) => line?,
            None => {
                return Err(AbacusError::parse(
                    &self.path,
                    self.line_num,
                    format!("File ends before SNP {}", snp.rsid),
                ))
            }
        };
        let err = |msg: String| AbacusError::parse(&self.path, self.line_num, msg);

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(err(format!("Expected 4 fields, got {}", fields.len())));
        }
        let pos: u32 = fields[0]
            .parse()
            .map_err(|_| err(format!("Invalid position '{}'", fields[0])))?;
        if pos != snp.pos || fields[1] != &*snp.rsid {
            return Err(err(format!(
                "Record {} {} does not match SNP {} {}",
                pos, fields[1], snp.pos, snp.rsid
            )));
        }
        let label: u32 = fields[2]
            .parse()
            .map_err(|_| err(format!("Invalid donor '{}'", fields[2])))?;
        let donor = HapIdx::from_label(label)
            .filter(|d| d.as_usize() < n_haps)
            .ok_or_else(|| err(format!("Donor {} outside 1..={}", label, n_haps)))?;
        let block_length: f64 = fields[3]
            .parse()
            .map_err(|_| err(format!("Invalid block length '{}'", fields[3])))?;
        if !block_length.is_finite() || block_length < 0.0 {
            return Err(err(format!(
                "Block length {} is not a finite non-negative value",
                block_length
            )));
        }
        Ok(HaplotypeObservation {
            donor,
            block_length,
        })
    }
}

/// Lockstep readers over every haplotype's painting file
pub struct PaintingReaders {
    readers: Vec<PaintingReader>,
}

impl PaintingReaders {
    /// Open `<prefix>_<hap>.viterbi` for every haplotype. Any missing file is fatal.
    pub fn open(prefix: &Path, n_haps: usize) -> Result<Self> {
        let readers = (0..n_haps)
            .map(|h| {
                let path = painting_path(prefix, HapIdx::from(h));
                Ok(PaintingReader {
                    lines: open_reader(&path)?.lines(),
                    path,
                    line_num: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { readers })
    }

    pub fn n_haplotypes(&self) -> usize {
        self.readers.len()
    }

    /// Read the next SNP's record from every file, checking it is `snp`
    pub fn next_site(&mut self, snp: &Snp) -> Result<Vec<HaplotypeObservation>> {
        let n_haps = self.readers.len();
        self.readers
            .iter_mut()
            .map(|r| r.next_record(snp, n_haps))
            .collect()
    }

    /// Confirm every file has been consumed
    pub fn finish(mut self) -> Result<()> {
        for reader in &mut self.readers {
            if let Some(line) = reader.lines.next() {
                line?;
                return Err(AbacusError::parse(
                    &reader.path,
                    reader.line_num + 1,
                    "Unexpected records after the last SNP",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snps() -> Snps {
        vec![Snp::new("rs1", 100), Snp::new("rs2", 200)].into_iter().collect()
    }

    #[test]
    fn test_write_then_stream() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("run");
        let snps = snps();
        for (target, donor) in [(0u32, 1u32), (1, 0)] {
            let painting = HaplotypePainting {
                target: HapIdx::new(target),
                donors: vec![HapIdx::new(donor); 2],
                block_lengths: vec![0.25, 0.25],
            };
            write_painting(&prefix, &painting, &snps).unwrap();
        }

        let text = std::fs::read_to_string(painting_path(&prefix, HapIdx::new(0))).unwrap();
        assert_eq!(text, "100 rs1 2 0.25\n200 rs2 2 0.25\n");

        let mut readers = PaintingReaders::open(&prefix, 2).unwrap();
        for snp in snps.iter() {
            let obs = readers.next_site(snp).unwrap();
            assert_eq!(obs[0].donor, HapIdx::new(1));
            assert_eq!(obs[1].donor, HapIdx::new(0));
            assert_eq!(obs[1].block_length, 0.25);
        }
        readers.finish().unwrap();
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = PaintingReaders::open(&dir.path().join("none"), 2);
        assert!(matches!(result, Err(AbacusError::FileNotFound { .. })));
    }

    #[test]
    fn test_mismatched_snp_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("run");
        std::fs::write(painting_path(&prefix, HapIdx::new(0)), "100 rs9 1 0.5\n").unwrap();
        let mut readers = PaintingReaders::open(&prefix, 1).unwrap();
        assert!(matches!(
            readers.next_site(&Snp::new("rs1", 100)),
            Err(AbacusError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_donor_zero_and_truncation_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("run");
        std::fs::write(painting_path(&prefix, HapIdx::new(0)), "100 rs1 0 0.5\n").unwrap();
        let mut readers = PaintingReaders::open(&prefix, 1).unwrap();
        assert!(readers.next_site(&Snp::new("rs1", 100)).is_err());

        std::fs::write(painting_path(&prefix, HapIdx::new(0)), "100 rs1 1 0.5\n").unwrap();
        let mut readers = PaintingReaders::open(&prefix, 1).unwrap();
        readers.next_site(&Snp::new("rs1", 100)).unwrap();
        assert!(readers.next_site(&Snp::new("rs2", 200)).is_err());
    }
}
