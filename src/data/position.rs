//! # Positions and Variant Identifiers
//!
//! `SimplePosition` is one input VCF-like record. The engine reads positions and
//! never mutates them; link-backs are returned separately.

use std::fmt;

use serde::{Deserialize, Serialize};

/// FILTER value of a passing record
pub const FILTER_PASS: &str = "PASS";

/// FILTER tag of a recomposed record built from at least one failing position
pub const FILTER_RECOMPOSED_FAILURE: &str = "FilteredVariantsRecomposed";

/// Missing value marker for every VCF column
pub const MISSING: &str = ".";

/// FILTER column state
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Filter {
    Pass,
    /// `.`; treated as passing
    Missing,
    Failed(String),
}

impl Filter {
    pub fn parse(text: &str) -> Self {
        match text {
            FILTER_PASS => Filter::Pass,
            MISSING | "" => Filter::Missing,
            other => Filter::Failed(other.to_string()),
        }
    }

    /// PASS or missing
    pub fn is_pass(&self) -> bool {
        !matches!(self, Filter::Failed(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Filter::Pass => FILTER_PASS,
            Filter::Missing => MISSING,
            Filter::Failed(name) => name,
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::Missing
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric VCF value that keeps its original text (`30.1`, `13`)
#[derive(Clone, Debug, PartialEq)]
pub struct NumericField {
    value: f64,
    text: String,
}

impl NumericField {
    /// Returns None for missing or non-numeric text
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() || text == MISSING {
            return None;
        }
        let value: f64 = text.parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        Some(Self {
            value,
            text: text.to_string(),
        })
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Smallest value; the first one wins ties
    pub fn min_of<'a, I>(values: I) -> Option<&'a NumericField>
    where
        I: IntoIterator<Item = &'a NumericField>,
    {
        values.into_iter().fold(None, |best: Option<&NumericField>, v| match best {
            Some(b) if b.value <= v.value => Some(b),
            _ => Some(v),
        })
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Canonical `chrom-pos-ref-alt` key
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantId(String);

impl VariantId {
    pub fn new(chrom: &str, pos: u32, ref_allele: &str, alt_allele: &str) -> Self {
        Self(format!(
            "{}-{}-{}-{}",
            canonical_chrom(chrom),
            pos,
            ref_allele,
            alt_allele
        ))
    }

    /// Id of the minimal (trimmed) representation of one ref/alt pair
    pub fn minimal(chrom: &str, pos: u32, ref_allele: &str, alt_allele: &str) -> Self {
        let mut alleles = [ref_allele.to_string(), alt_allele.to_string()];
        let pos = trim_alleles(pos, &mut alleles);
        Self::new(chrom, pos, &alleles[0], &alleles[1])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<&str> for VariantId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

fn canonical_chrom(chrom: &str) -> &str {
    chrom.strip_prefix("chr").unwrap_or(chrom)
}

/// Drop bases shared by every allele: suffix first, then prefix.
///
/// At least one base is kept in every allele. `alleles[0]` is the reference.
/// Returns the adjusted start.
pub fn trim_alleles(start: u32, alleles: &mut [String]) -> u32 {
    let mut start = start;
    loop {
        let shared = alleles.iter().all(|a| a.len() > 1)
            && alleles
                .windows(2)
                .all(|w| w[0].as_bytes().last() == w[1].as_bytes().last());
        if !shared {
            break;
        }
        for allele in alleles.iter_mut() {
            allele.pop();
        }
    }
    loop {
        let shared = alleles.iter().all(|a| a.len() > 1)
            && alleles
                .windows(2)
                .all(|w| w[0].as_bytes().first() == w[1].as_bytes().first());
        if !shared {
            break;
        }
        for allele in alleles.iter_mut() {
            allele.remove(0);
        }
        start += 1;
    }
    start
}

/// Plain nucleotide allele (no symbolic, breakend or spanning-deletion forms)
pub fn is_sequence_allele(allele: &str) -> bool {
    !allele.is_empty()
        && allele
            .bytes()
            .all(|b| matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N'))
}

/// One input record
#[derive(Clone, Debug, PartialEq)]
pub struct SimplePosition {
    pub chrom: String,
    /// 1-based
    pub start: u32,
    pub id: Option<String>,
    pub ref_allele: String,
    pub alt_alleles: Vec<String>,
    pub quality: Option<NumericField>,
    pub filter: Filter,
    pub info: String,
    /// FORMAT keys, `GT` first when present
    pub format: Vec<String>,
    /// Raw per-sample columns
    pub samples: Vec<String>,
}

impl SimplePosition {
    pub fn new(
        chrom: impl Into<String>,
        start: u32,
        ref_allele: impl Into<String>,
        alt_alleles: Vec<String>,
    ) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            id: None,
            ref_allele: ref_allele.into(),
            alt_alleles,
            quality: None,
            filter: Filter::Missing,
            info: MISSING.to_string(),
            format: Vec::new(),
            samples: Vec::new(),
        }
    }

    pub fn with_quality(mut self, quality: Option<NumericField>) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_samples(mut self, format: &str, samples: &[&str]) -> Self {
        self.format = format.split(':').map(|k| k.to_string()).collect();
        self.samples = samples.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Last reference base covered (inclusive)
    pub fn end(&self) -> u32 {
        self.start + self.ref_allele.len().max(1) as u32 - 1
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn n_alleles(&self) -> usize {
        1 + self.alt_alleles.len()
    }

    /// Allele text by VCF allele index (0 = REF)
    pub fn allele(&self, allele: usize) -> Option<&str> {
        if allele == 0 {
            Some(&self.ref_allele)
        } else {
            self.alt_alleles.get(allele - 1).map(|a| a.as_str())
        }
    }

    /// Original id of the alternate allele at `alt_index` (0-based into ALT)
    pub fn vid(&self, alt_index: usize) -> Option<VariantId> {
        self.alt_alleles
            .get(alt_index)
            .map(|alt| VariantId::new(&self.chrom, self.start, &self.ref_allele, alt))
    }

    pub fn format_index(&self, key: &str) -> Option<usize> {
        self.format.iter().position(|k| k == key)
    }

    /// One sub-field of one sample column; absent trailing fields are None
    pub fn sample_field(&self, sample: usize, key: &str) -> Option<&str> {
        let idx = self.format_index(key)?;
        self.samples.get(sample)?.split(':').nth(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parse() {
        assert_eq!(Filter::parse("PASS"), Filter::Pass);
        assert_eq!(Filter::parse("."), Filter::Missing);
        assert!(Filter::parse(".").is_pass());
        let failed = Filter::parse("LowQual");
        assert!(!failed.is_pass());
        assert_eq!(failed.to_string(), "LowQual");
    }

    #[test]
    fn test_numeric_field_min_keeps_text() {
        let values: Vec<NumericField> = ["45", "30.1", "."]
            .iter()
            .filter_map(|t| NumericField::parse(t))
            .collect();
        assert_eq!(values.len(), 2);
        let min = NumericField::min_of(&values).unwrap();
        assert_eq!(min.as_str(), "30.1");
        assert!(NumericField::min_of(std::iter::empty()).is_none());
        assert!(NumericField::parse("abc").is_none());
    }

    #[test]
    fn test_variant_id_strips_chr() {
        assert_eq!(VariantId::new("chr1", 2, "A", "T").as_str(), "1-2-A-T");
        assert_eq!(VariantId::new("X", 9, "C", "G").as_str(), "X-9-C-G");
    }

    #[test]
    fn test_minimal_variant_id() {
        assert_eq!(VariantId::minimal("chr1", 2, "AGC", "AGA"), "1-4-C-A");
        assert_eq!(VariantId::minimal("chr1", 2, "AGCTG", "GGGTG"), "1-2-AGC-GGG");
        assert_eq!(VariantId::minimal("chr1", 2, "AGCTG", "GGATC"), "1-2-AGCTG-GGATC");
    }

    #[test]
    fn test_trim_alleles_keeps_anchor_base() {
        let mut alleles = vec!["AGC".to_string(), "AG".to_string()];
        let start = trim_alleles(10, &mut alleles);
        assert_eq!(start, 11);
        assert_eq!(alleles, vec!["GC".to_string(), "G".to_string()]);
    }

    #[test]
    fn test_sequence_allele() {
        assert!(is_sequence_allele("ACGTN"));
        assert!(is_sequence_allele("acgt"));
        assert!(!is_sequence_allele("<DEL>"));
        assert!(!is_sequence_allele("*"));
        assert!(!is_sequence_allele(""));
    }

    #[test]
    fn test_sample_field() {
        let pos = SimplePosition::new("chr1", 4, "C", vec!["A".into()])
            .with_samples("GT:PS:GQ", &["1|1:301", "1|2:.:18"]);
        assert_eq!(pos.sample_field(0, "PS"), Some("301"));
        assert_eq!(pos.sample_field(0, "GQ"), None);
        assert_eq!(pos.sample_field(1, "GQ"), Some("18"));
        assert_eq!(pos.vid(0).unwrap(), "1-4-C-A");
        assert_eq!(pos.end(), 4);
    }
}
