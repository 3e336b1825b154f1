//! # Genotype Encoding
//!
//! ## Role
//! Turn raw sample columns into allele indices plus a phase flag, and cut each
//! sample's usable genotypes into `GenotypeBlock`s.
//!
//! ## Usable genotypes
//! A genotype can extend a haplotype path when it is called, phased (or
//! homozygous), uses only sequence alleles, keeps the ploidy of the current run
//! and the sample's `FT` is `PASS` or missing.
//!
//! ## Phase sets
//! A phased heterozygous call whose `PS` differs from the previous
//! heterozygous call closes the block. The next block begins right after the
//! previous heterozygous offset, so homozygous calls in between belong to both.

use bitvec::prelude::*;

use crate::data::position::{is_sequence_allele, NumericField, SimplePosition, FILTER_PASS, MISSING};
use crate::error::{RecomposeError, Result};

pub const GT_KEY: &str = "GT";
pub const GQ_KEY: &str = "GQ";
pub const PS_KEY: &str = "PS";
pub const FT_KEY: &str = "FT";

/// Called genotype: allele indices and phase flag
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Genotype {
    alleles: Vec<u16>,
    phased: bool,
}

impl Genotype {
    pub fn new(alleles: Vec<u16>, phased: bool) -> Self {
        Self { alleles, phased }
    }

    pub fn alleles(&self) -> &[u16] {
        &self.alleles
    }

    pub fn allele(&self, hap: usize) -> Option<u16> {
        self.alleles.get(hap).copied()
    }

    pub fn ploidy(&self) -> usize {
        self.alleles.len()
    }

    pub fn is_phased(&self) -> bool {
        self.phased
    }

    pub fn is_homozygous(&self) -> bool {
        self.alleles.windows(2).all(|w| w[0] == w[1])
    }
}

/// Parse a genotype field (e.g., "0|1", "1/2", "./.", "1")
///
/// - Any `.` allele makes the whole call a no-call (`None`)
/// - Haploid calls count as phased
/// - Mixed separators or non-numeric alleles are malformed
pub fn parse_genotype(gt: &str) -> Result<Option<Genotype>> {
    let gt = gt.trim();
    if gt.is_empty() {
        return Err(RecomposeError::malformed_genotype(gt));
    }

    let has_pipe = gt.contains('|');
    let has_slash = gt.contains('/');
    if has_pipe && has_slash {
        return Err(RecomposeError::malformed_genotype(gt));
    }
    let sep = if has_pipe { '|' } else { '/' };

    let mut alleles = Vec::with_capacity(2);
    let mut missing = false;
    for part in gt.split(sep) {
        if part == MISSING {
            missing = true;
            continue;
        }
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RecomposeError::malformed_genotype(gt));
        }
        let allele: u16 = part
            .parse()
            .map_err(|_| RecomposeError::malformed_genotype(gt))?;
        alleles.push(allele);
    }

    if missing {
        return Ok(None);
    }
    Ok(Some(Genotype::new(alleles, has_pipe || !has_slash)))
}

/// One position's sample column, encoded
#[derive(Clone, Debug, PartialEq)]
pub struct GenotypeColumn {
    genotypes: Vec<Option<Genotype>>,
    genotype_quality: Vec<Option<NumericField>>,
    phase_set: Vec<Option<NumericField>>,
    /// Sample FT is PASS or missing
    ft_pass: BitVec,
    /// Indexed by VCF allele index
    supported: BitVec,
}

impl GenotypeColumn {
    /// Encode every sample of `position`.
    ///
    /// Fails on the first malformed genotype or an allele index beyond ALT;
    /// the caller skips the whole position.
    pub fn encode(position: &SimplePosition) -> Result<Self> {
        if !is_sequence_allele(&position.ref_allele) {
            return Err(RecomposeError::invalid_input(format!(
                "unsupported REF '{}' at {}:{}",
                position.ref_allele, position.chrom, position.start
            )));
        }

        let n_samples = position.n_samples();
        let n_alleles = position.n_alleles();
        let gt_idx = match position.format_index(GT_KEY) {
            Some(idx) => idx,
            None if n_samples == 0 => 0,
            None => return Err(RecomposeError::malformed_genotype(position.format.join(":"))),
        };
        let gq_idx = position.format_index(GQ_KEY);
        let ps_idx = position.format_index(PS_KEY);
        let ft_idx = position.format_index(FT_KEY);

        let mut genotypes = Vec::with_capacity(n_samples);
        let mut genotype_quality = Vec::with_capacity(n_samples);
        let mut phase_set = Vec::with_capacity(n_samples);
        let mut ft_pass = bitvec![1; n_samples];

        for (s, column) in position.samples.iter().enumerate() {
            let fields: Vec<&str> = column.split(':').collect();
            let field = |idx: Option<usize>| idx.and_then(|i| fields.get(i).copied());

            let genotype = parse_genotype(fields.get(gt_idx).copied().unwrap_or(MISSING))?;
            if let Some(g) = &genotype {
                if g.alleles().iter().any(|&a| a as usize >= n_alleles) {
                    return Err(RecomposeError::malformed_genotype(fields[gt_idx]));
                }
            }
            genotypes.push(genotype);
            genotype_quality.push(field(gq_idx).and_then(NumericField::parse));
            phase_set.push(field(ps_idx).and_then(NumericField::parse));
            if let Some(ft) = field(ft_idx) {
                ft_pass.set(s, ft == FILTER_PASS || ft == MISSING || ft.is_empty());
            }
        }

        let mut supported = bitvec![1; n_alleles];
        for (a, alt) in position.alt_alleles.iter().enumerate() {
            supported.set(a + 1, is_sequence_allele(alt));
        }

        Ok(Self {
            genotypes,
            genotype_quality,
            phase_set,
            ft_pass,
            supported,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.genotypes.len()
    }

    /// Parsed call; None for no-call or an unknown sample
    pub fn genotype(&self, sample: usize) -> Option<&Genotype> {
        self.genotypes.get(sample).and_then(|g| g.as_ref())
    }

    pub fn genotype_quality(&self, sample: usize) -> Option<&NumericField> {
        self.genotype_quality.get(sample).and_then(|v| v.as_ref())
    }

    pub fn phase_set(&self, sample: usize) -> Option<&NumericField> {
        self.phase_set.get(sample).and_then(|v| v.as_ref())
    }

    pub fn is_supported(&self, allele: u16) -> bool {
        self.supported
            .get(allele as usize)
            .map(|b| *b)
            .unwrap_or(false)
    }

    /// Call that may extend a haplotype path (ploidy is checked by the caller)
    pub fn usable(&self, sample: usize) -> Option<&Genotype> {
        let genotype = self.genotype(sample)?;
        if !self.ft_pass.get(sample).map(|b| *b).unwrap_or(false) {
            return None;
        }
        if !genotype.is_phased() && !genotype.is_homozygous() {
            return None;
        }
        if genotype.alleles().iter().any(|&a| !self.is_supported(a)) {
            return None;
        }
        Some(genotype)
    }
}

/// Consecutive usable genotypes of one sample, starting at a group offset.
///
/// Value equality lets samples with identical calls share one block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenotypeBlock {
    start: usize,
    genotypes: Vec<Genotype>,
}

impl GenotypeBlock {
    pub fn new(start: usize, genotypes: Vec<Genotype>) -> Self {
        Self { start, genotypes }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Last covered offset (inclusive)
    pub fn end(&self) -> usize {
        self.start + self.genotypes.len().saturating_sub(1)
    }

    pub fn genotypes(&self) -> &[Genotype] {
        &self.genotypes
    }

    pub fn ploidy(&self) -> usize {
        self.genotypes.first().map(|g| g.ploidy()).unwrap_or(0)
    }

    pub fn covers(&self, lo: usize, hi: usize) -> bool {
        !self.genotypes.is_empty() && self.start <= lo && hi <= self.end()
    }

    /// Alleles of one haplotype over the whole block
    pub fn haplotype(&self, hap: usize) -> Vec<u16> {
        self.genotypes
            .iter()
            .map(|g| g.allele(hap).unwrap_or(0))
            .collect()
    }

    /// Alleles of one haplotype over `lo..=hi`, if the block covers it
    pub fn path(&self, hap: usize, lo: usize, hi: usize) -> Option<Vec<u16>> {
        if !self.covers(lo, hi) || hap >= self.ploidy() {
            return None;
        }
        Some(
            self.genotypes[lo - self.start..=hi - self.start]
                .iter()
                .map(|g| g.allele(hap).unwrap_or(0))
                .collect(),
        )
    }
}

/// Cut one sample's calls into genotype blocks
pub fn genotype_blocks(columns: &[GenotypeColumn], sample: usize) -> Vec<GenotypeBlock> {
    let mut blocks = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut ploidy = 0;
    // Offset and phase set of the last heterozygous call in the run
    let mut last_het: Option<(usize, Option<f64>)> = None;

    for (i, column) in columns.iter().enumerate() {
        let Some(genotype) = column.usable(sample) else {
            if let Some(start) = run_start.take() {
                push_block(&mut blocks, columns, sample, start, i - 1);
            }
            last_het = None;
            continue;
        };

        if let Some(start) = run_start {
            if genotype.ploidy() != ploidy {
                push_block(&mut blocks, columns, sample, start, i - 1);
                run_start = None;
                last_het = None;
            }
        }
        if run_start.is_none() {
            run_start = Some(i);
            ploidy = genotype.ploidy();
        }

        if !genotype.is_homozygous() {
            let ps = column.phase_set(sample).map(|f| f.value());
            if let (Some((het_idx, Some(prev))), Some(current)) = (last_het, ps) {
                if prev != current {
                    if let Some(start) = run_start {
                        push_block(&mut blocks, columns, sample, start, i - 1);
                    }
                    run_start = Some(het_idx + 1);
                }
            }
            last_het = Some((i, ps));
        }
    }

    if let Some(start) = run_start {
        push_block(&mut blocks, columns, sample, start, columns.len() - 1);
    }
    blocks
}

fn push_block(
    blocks: &mut Vec<GenotypeBlock>,
    columns: &[GenotypeColumn],
    sample: usize,
    start: usize,
    end: usize,
) {
    let genotypes: Option<Vec<Genotype>> = (start..=end)
        .map(|k| columns[k].usable(sample).cloned())
        .collect();
    if let Some(genotypes) = genotypes {
        blocks.push(GenotypeBlock::new(start, genotypes));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::position::SimplePosition;

    fn position(start: u32, ref_allele: &str, alts: &[&str], format: &str, samples: &[&str]) -> SimplePosition {
        SimplePosition::new("chr1", start, ref_allele, alts.iter().map(|a| a.to_string()).collect())
            .with_samples(format, samples)
    }

    fn gt(alleles: &[u16], phased: bool) -> Genotype {
        Genotype::new(alleles.to_vec(), phased)
    }

    #[test]
    fn test_parse_genotype() {
        assert_eq!(parse_genotype("0|1").unwrap(), Some(gt(&[0, 1], true)));
        assert_eq!(parse_genotype("1/2").unwrap(), Some(gt(&[1, 2], false)));
        assert_eq!(parse_genotype("./.").unwrap(), None);
        assert_eq!(parse_genotype(".|1").unwrap(), None);
        assert_eq!(parse_genotype(".").unwrap(), None);
    }

    #[test]
    fn test_parse_genotype_haploid() {
        assert_eq!(parse_genotype("1").unwrap(), Some(gt(&[1], true)));
    }

    #[test]
    fn test_parse_genotype_malformed() {
        assert!(matches!(
            parse_genotype("0|x"),
            Err(RecomposeError::MalformedGenotype { .. })
        ));
        assert!(parse_genotype("0|1/1").is_err());
        assert!(parse_genotype("").is_err());
        assert!(parse_genotype("0||1").is_err());
    }

    #[test]
    fn test_encode_rejects_allele_beyond_alt() {
        let pos = position(2, "A", &["T"], "GT", &["0|2"]);
        assert!(matches!(
            GenotypeColumn::encode(&pos),
            Err(RecomposeError::MalformedGenotype { .. })
        ));
    }

    #[test]
    fn test_encode_format_fields() {
        let pos = position(2, "A", &["T", "G"], "GT:PS:GQ:FT", &["0|1:123:.:PASS", "2/2:.:14.2", "1|1:5:7:LowGQ"]);
        let col = GenotypeColumn::encode(&pos).unwrap();
        assert_eq!(col.n_samples(), 3);
        assert_eq!(col.phase_set(0).unwrap().as_str(), "123");
        assert!(col.genotype_quality(0).is_none());
        assert_eq!(col.genotype_quality(1).unwrap().as_str(), "14.2");
        assert!(col.usable(0).is_some());
        assert!(col.usable(1).is_some(), "unphased homozygous calls are usable");
        assert!(col.usable(2).is_none(), "failing sample FT");
    }

    #[test]
    fn test_symbolic_alt_not_usable() {
        let pos = position(2, "A", &["<DEL>", "T"], "GT", &["0|1", "0|2"]);
        let col = GenotypeColumn::encode(&pos).unwrap();
        assert!(col.usable(0).is_none());
        assert!(col.usable(1).is_some());
    }

    #[test]
    fn test_genotype_blocks_break_on_unusable() {
        let columns: Vec<GenotypeColumn> = [
            position(2, "A", &["T"], "GT", &["0|1"]),
            position(4, "C", &["A"], "GT", &["0/1"]),
            position(6, "G", &["C"], "GT", &["1|1"]),
            position(8, "A", &["G"], "GT", &["1|0"]),
        ]
        .iter()
        .map(|p| GenotypeColumn::encode(p).unwrap())
        .collect();

        let blocks = genotype_blocks(&columns, 0);
        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].start(), blocks[0].end()), (0, 0));
        assert_eq!((blocks[1].start(), blocks[1].end()), (2, 3));
        assert_eq!(blocks[1].haplotype(0), vec![1, 1]);
        assert_eq!(blocks[1].haplotype(1), vec![1, 0]);
    }

    #[test]
    fn test_genotype_blocks_split_on_phase_set() {
        let columns: Vec<GenotypeColumn> = [
            position(2, "A", &["T"], "GT", &["1/1"]),
            position(3, "G", &["A", "G"], "GT:PS", &["1|2:2"]),
            position(4, "C", &["A"], "GT", &["1/1"]),
            position(5, "T", &["A", "G"], "GT:PS", &["1|2:4"]),
            position(6, "G", &["C"], "GT", &["1/1"]),
        ]
        .iter()
        .map(|p| GenotypeColumn::encode(p).unwrap())
        .collect();

        let blocks = genotype_blocks(&columns, 0);
        assert_eq!(blocks.len(), 2);
        assert_eq!((blocks[0].start(), blocks[0].end()), (0, 2));
        assert_eq!((blocks[1].start(), blocks[1].end()), (2, 4));
        assert_eq!(blocks[1].path(1, 2, 4), Some(vec![1, 2, 1]));
        assert_eq!(blocks[1].path(1, 1, 4), None);
    }

    #[test]
    fn test_genotype_blocks_same_phase_set_stays_together() {
        let columns: Vec<GenotypeColumn> = [
            position(2, "A", &["T"], "GT:PS", &["0|1:7"]),
            position(4, "C", &["A"], "GT:PS", &["1|0:7"]),
            position(6, "G", &["C"], "GT:PS", &["0|1:."]),
        ]
        .iter()
        .map(|p| GenotypeColumn::encode(p).unwrap())
        .collect();

        let blocks = genotype_blocks(&columns, 0);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].end(), 2);
    }
}
