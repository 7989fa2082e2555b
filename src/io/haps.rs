//! # Haplotype Panel Reader
//!
//! Reads the phased haplotype file: one whitespace-delimited row per SNP,
//!
//! ```text
//! rsid  <id2>  position  <allele0>  <allele1>  h_0 h_1 ... h_{N-1}
//! ```
//!
//! where every `h_i` is `0` (ancestral) or `1` (derived). Also reads the
//! reference-panel donor list (one 0-based haplotype index per line).

use std::io::BufRead;
use std::path::Path;

use tracing::{info, info_span};

use crate::data::genetic_map::GeneticMap;
use crate::data::haplotype::HapIdx;
use crate::data::marker::{Snp, SnpIdx, Snps};
use crate::data::storage::{AlleleMatrix, DenseColumn};
use crate::data::GeneticData;
use crate::error::{AbacusError, Result};
use crate::io::text::open_reader;

/// Number of metadata columns preceding the haplotype columns
const N_LEADING_FIELDS: usize = 5;

/// SNP metadata and alleles read from a haplotype file
#[derive(Clone, Debug)]
pub struct HaplotypePanel {
    pub snps: Snps,
    pub alleles: AlleleMatrix,
}

/// Parse one haplotype row
fn parse_row(
    path: &Path,
    line_num: usize,
    line: &str,
    n_haps: Option<usize>,
) -> Result<(Snp, DenseColumn)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() <= N_LEADING_FIELDS {
        return Err(AbacusError::parse(
            path,
            line_num,
            format!(
                "Expected at least {} fields, got {}",
                N_LEADING_FIELDS + 1,
                fields.len()
            ),
        ));
    }

    let width = fields.len() - N_LEADING_FIELDS;
    if let Some(expected) = n_haps {
        if width != expected {
            return Err(AbacusError::parse(
                path,
                line_num,
                format!("Expected {} haplotypes, got {}", expected, width),
            ));
        }
    }

    let pos: u32 = fields[2].parse().map_err(|_| {
        AbacusError::parse(path, line_num, format!("Invalid position '{}'", fields[2]))
    })?;

    let mut column = DenseColumn::new(width);
    for (hap, token) in fields[N_LEADING_FIELDS..].iter().enumerate() {
        match *token {
            "0" => {}
            "1" => column.set(HapIdx::from(hap), true),
            other => {
                return Err(AbacusError::parse(
                    path,
                    line_num,
                    format!("Haplotype {} has allele '{}', expected 0 or 1", hap, other),
                ))
            }
        }
    }

    Ok((Snp::new(fields[0], pos), column))
}

impl HaplotypePanel {
    /// Read a haplotype file (optionally gzipped)
    pub fn from_file(path: &Path) -> Result<Self> {
        info_span!("haplotype_panel_from_file", path = ?path).in_scope(|| {
            let reader = open_reader(path)?;
            let mut snps = Snps::new();
            let mut columns = Vec::new();
            let mut n_haps = None;

            for (line_num, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let (snp, column) = parse_row(path, line_num + 1, &line, n_haps)?;
                n_haps = Some(column.n_haplotypes());
                snps.push(snp);
                columns.push(column);
            }

            if snps.is_empty() {
                return Err(AbacusError::invalid_data(format!(
                    "Haplotype file {} contains no SNPs",
                    path.display()
                )));
            }

            let alleles = AlleleMatrix::from_columns(columns)?;
            let n_haps = alleles.n_haplotypes();
            let monomorphic = (0..alleles.n_snps())
                .map(|s| alleles.column(SnpIdx::from(s)).derived_count())
                .filter(|&c| c == 0 || c == n_haps)
                .count();
            info!(
                n_snps = alleles.n_snps(),
                n_haplotypes = n_haps,
                monomorphic,
                bytes = alleles.size_bytes(),
                "Loaded haplotype panel"
            );
            Ok(Self { snps, alleles })
        })
    }

    /// Pair the panel with its genetic map
    pub fn with_map(self, map: GeneticMap) -> Result<GeneticData> {
        GeneticData::new(self.snps, self.alleles, map)
    }
}

/// Load the haplotype file and genetic map as one validated panel
pub fn load_genetic_data(haps: &Path, map: &Path) -> Result<GeneticData> {
    let panel = HaplotypePanel::from_file(haps)?;
    let map = GeneticMap::from_file(map)?;
    panel.with_map(map)
}

/// Read a reference-panel donor list (one 0-based haplotype index per line)
pub fn read_donor_list(path: &Path) -> Result<Vec<HapIdx>> {
    let reader = open_reader(path)?;
    let mut donors = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let idx: u32 = line.parse().map_err(|_| {
            AbacusError::parse(path, line_num + 1, format!("Invalid haplotype index '{}'", line))
        })?;
        donors.push(HapIdx::new(idx));
    }
    Ok(donors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::marker::SnpIdx;
    use std::io::Write;

    fn write_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("Create temp file");
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_read_panel() {
        let file = write_file("rs1 rs1 100 A G 0 1 1\nrs2 rs2 250 C T 1 0 0\n");
        let panel = HaplotypePanel::from_file(file.path()).unwrap();

        assert_eq!(panel.snps.len(), 2);
        assert_eq!(panel.alleles.n_haplotypes(), 3);
        assert_eq!(panel.snps[SnpIdx::new(1)].pos, 250);
        assert_eq!(&*panel.snps[SnpIdx::new(0)].rsid, "rs1");
        assert!(panel.alleles.allele(SnpIdx::new(0), HapIdx::new(1)));
        assert!(!panel.alleles.allele(SnpIdx::new(1), HapIdx::new(2)));
    }

    #[test]
    fn test_ragged_row_rejected() {
        let file = write_file("rs1 rs1 100 A G 0 1 1\nrs2 rs2 250 C T 1 0\n");
        match HaplotypePanel::from_file(file.path()) {
            Err(AbacusError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_allele_rejected() {
        let file = write_file("rs1 rs1 100 A G 0 2 1\n");
        assert!(matches!(
            HaplotypePanel::from_file(file.path()),
            Err(AbacusError::Parse { .. })
        ));
    }

    #[test]
    fn test_bad_position_rejected() {
        let file = write_file("rs1 rs1 pos A G 0 1 1\n");
        assert!(matches!(
            HaplotypePanel::from_file(file.path()),
            Err(AbacusError::Parse { .. })
        ));
    }

    #[test]
    fn test_map_mismatch_rejected() {
        let haps = write_file("rs1 rs1 100 A G 0 1\nrs2 rs2 200 A G 1 1\n");
        let map = write_file("0.0\n");
        assert!(matches!(
            load_genetic_data(haps.path(), map.path()),
            Err(AbacusError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_read_donor_list() {
        let file = write_file("3\n0\n\n5\n");
        let donors = read_donor_list(file.path()).unwrap();
        assert_eq!(donors, vec![HapIdx::new(3), HapIdx::new(0), HapIdx::new(5)]);
    }
}
