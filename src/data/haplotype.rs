//! # Sample and Haplotype Definitions
//!
//! Sample indices and the (sample, haplotype) pairs that allele blocks collect.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Zero-cost newtype for sample indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SampleIdx(pub u32);

impl SampleIdx {
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Haplotype `hap` of this sample
    pub fn haplotype(self, hap: u8) -> SampleHaplotype {
        SampleHaplotype::new(self, hap)
    }
}

impl From<u32> for SampleIdx {
    fn from(idx: u32) -> Self {
        Self(idx)
    }
}

impl From<usize> for SampleIdx {
    fn from(idx: usize) -> Self {
        Self(idx as u32)
    }
}

impl From<SampleIdx> for usize {
    fn from(idx: SampleIdx) -> usize {
        idx.0 as usize
    }
}

/// One haplotype of one sample.
///
/// Ordering is sample-major, which is also the order alleles are first seen in
/// when a site renumbers its alleles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleHaplotype {
    pub sample: SampleIdx,
    /// Haplotype slot within the genotype (0 for the first allele)
    pub hap: u8,
}

impl SampleHaplotype {
    pub fn new(sample: SampleIdx, hap: u8) -> Self {
        Self { sample, hap }
    }

    pub fn hap_index(self) -> usize {
        self.hap as usize
    }
}

impl fmt::Display for SampleHaplotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sample {} hap {}", self.sample.0, self.hap)
    }
}

/// A collection of samples
#[derive(Clone, Debug, Default)]
pub struct Samples {
    /// Sample IDs
    ids: Vec<Arc<str>>,
    /// Map from sample ID to index for fast lookup
    id_to_idx: HashMap<Arc<str>, SampleIdx>,
}

impl Samples {
    /// Create from a vector of sample IDs
    pub fn from_ids(ids: Vec<String>) -> Self {
        let ids: Vec<Arc<str>> = ids.into_iter().map(|s| s.into()).collect();
        let id_to_idx = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), SampleIdx::new(i as u32)))
            .collect();

        Self { ids, id_to_idx }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Get sample index by ID
    pub fn index_of(&self, id: &str) -> Option<SampleIdx> {
        self.id_to_idx.get(id).copied()
    }

    /// Get all sample IDs
    pub fn ids(&self) -> &[Arc<str>] {
        &self.ids
    }
}

impl std::ops::Index<SampleIdx> for Samples {
    type Output = str;

    fn index(&self, idx: SampleIdx) -> &Self::Output {
        &self.ids[idx.as_usize()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_haplotype_order() {
        let a = SampleIdx::new(0).haplotype(1);
        let b = SampleIdx::new(1).haplotype(0);
        assert!(a < b);
        assert_eq!(a.hap_index(), 1);
        assert_eq!(b.to_string(), "sample 1 hap 0");
    }

    #[test]
    fn test_samples_lookup() {
        let samples = Samples::from_ids(vec!["A".to_string(), "B".to_string()]);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples.index_of("A"), Some(SampleIdx::new(0)));
        assert_eq!(samples.index_of("B"), Some(SampleIdx::new(1)));
        assert_eq!(samples.index_of("C"), None);
        assert_eq!(&samples[SampleIdx::new(1)], "B");
    }
}
