//! # Haplotype Partitioning and the Allele Block Graph
//!
//! ## Role
//! Split every sample haplotype of a window group into windows that start at an
//! alternate allele, and intern identical windows as shared `AlleleBlock`s.
//!
//! ## Windows
//! A window opens at an alt and extends while the next position starts at or
//! before the furthest function-block end reached so far. Only alts raise that
//! reach; reference calls caught inside it are trailing padding. Leading padding
//! takes the reference calls just before the first alt whose function block
//! still reaches it.
//!
//! ## Graph
//! Consecutive windows of one haplotype, cut from the same genotype block, are
//! joined by an edge when their offset ranges overlap.

use std::collections::HashMap;

use crate::data::genotype::{genotype_blocks, GenotypeBlock, GenotypeColumn};
use crate::data::haplotype::{SampleHaplotype, SampleIdx};
use crate::data::position::SimplePosition;

/// Read-only view of one window group's positions.
///
/// Offsets are 0-based indices into the group.
#[derive(Clone, Debug)]
pub struct AlleleSet<'a> {
    positions: Vec<&'a SimplePosition>,
    /// Index of each offset in the caller's position slice
    indices: Vec<usize>,
    block_ends: Vec<u32>,
}

impl<'a> AlleleSet<'a> {
    pub fn new(positions: Vec<&'a SimplePosition>, indices: Vec<usize>, block_ends: Vec<u32>) -> Self {
        debug_assert_eq!(positions.len(), indices.len());
        debug_assert_eq!(positions.len(), block_ends.len());
        Self {
            positions,
            indices,
            block_ends,
        }
    }

    /// Group over a whole slice, offsets equal to slice indices
    pub fn from_slice(positions: &'a [SimplePosition], block_ends: &[u32]) -> Self {
        Self::new(
            positions.iter().collect(),
            (0..positions.len()).collect(),
            block_ends.to_vec(),
        )
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn chrom(&self) -> &str {
        self.positions.first().map(|p| p.chrom.as_str()).unwrap_or("")
    }

    pub fn position(&self, offset: usize) -> &'a SimplePosition {
        self.positions[offset]
    }

    pub fn original_index(&self, offset: usize) -> usize {
        self.indices[offset]
    }

    pub fn start(&self, offset: usize) -> u32 {
        self.positions[offset].start
    }

    /// Last reference base of the REF allele
    pub fn end(&self, offset: usize) -> u32 {
        self.positions[offset].end()
    }

    pub fn block_end(&self, offset: usize) -> u32 {
        self.block_ends[offset]
    }

    pub fn allele(&self, offset: usize, allele: u16) -> Option<&'a str> {
        self.positions[offset].allele(allele as usize)
    }

    /// Allele differs from the reference (index 0 or an ALT equal to REF do not)
    pub fn is_alt(&self, offset: usize, allele: u16) -> bool {
        allele != 0
            && self
                .allele(offset, allele)
                .is_some_and(|alt| alt != self.positions[offset].ref_allele)
    }

    /// Reference spans of two offsets share a base
    pub fn overlaps(&self, a: usize, b: usize) -> bool {
        self.start(a) <= self.end(b) && self.start(b) <= self.end(a)
    }

    pub fn passes_filter(&self, offset: usize) -> bool {
        self.positions[offset].filter.is_pass()
    }
}

/// Zero-cost newtype for allele block arena indices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlleleBlockId(pub u32);

impl AlleleBlockId {
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for AlleleBlockId {
    fn from(idx: usize) -> Self {
        Self(idx as u32)
    }
}

/// Distinct haplotype path over one window
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlleleBlock {
    start: usize,
    alleles: Vec<u16>,
    members: Vec<SampleHaplotype>,
}

impl AlleleBlock {
    fn new(start: usize, alleles: Vec<u16>) -> Self {
        Self {
            start,
            alleles,
            members: Vec::new(),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Last offset (inclusive)
    pub fn end(&self) -> usize {
        self.start + self.alleles.len() - 1
    }

    pub fn alleles(&self) -> &[u16] {
        &self.alleles
    }

    /// Sorted, deduplicated
    pub fn members(&self) -> &[SampleHaplotype] {
        &self.members
    }

    pub fn contains(&self, member: SampleHaplotype) -> bool {
        self.members.binary_search(&member).is_ok()
    }
}

/// Adjacency lists over allele block ids
#[derive(Clone, Debug, Default)]
pub struct AlleleBlockGraph {
    successors: Vec<Vec<AlleleBlockId>>,
    predecessors: Vec<Vec<AlleleBlockId>>,
}

impl AlleleBlockGraph {
    fn add_node(&mut self) {
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
    }

    /// Repeated edges are stored once
    pub fn add_edge(&mut self, from: AlleleBlockId, to: AlleleBlockId) {
        let succ = &mut self.successors[from.as_usize()];
        if succ.contains(&to) {
            return;
        }
        succ.push(to);
        self.predecessors[to.as_usize()].push(from);
    }

    pub fn successors(&self, id: AlleleBlockId) -> &[AlleleBlockId] {
        &self.successors[id.as_usize()]
    }

    pub fn predecessors(&self, id: AlleleBlockId) -> &[AlleleBlockId] {
        &self.predecessors[id.as_usize()]
    }

    pub fn out_degree(&self, id: AlleleBlockId) -> usize {
        self.successors[id.as_usize()].len()
    }

    pub fn in_degree(&self, id: AlleleBlockId) -> usize {
        self.predecessors[id.as_usize()].len()
    }

    pub fn n_edges(&self) -> usize {
        self.successors.iter().map(|s| s.len()).sum()
    }
}

/// Allele block arena, graph, and the genotype blocks they were cut from
#[derive(Clone, Debug, Default)]
pub struct HaplotypePartition {
    /// Distinct genotype blocks in first-seen order
    genotype_blocks: Vec<GenotypeBlock>,
    /// Per sample: indices into `genotype_blocks`, by start
    sample_blocks: Vec<Vec<usize>>,
    blocks: Vec<AlleleBlock>,
    index: HashMap<(usize, Vec<u16>), AlleleBlockId>,
    graph: AlleleBlockGraph,
}

impl HaplotypePartition {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, id: AlleleBlockId) -> &AlleleBlock {
        &self.blocks[id.as_usize()]
    }

    pub fn blocks(&self) -> &[AlleleBlock] {
        &self.blocks
    }

    pub fn ids(&self) -> impl Iterator<Item = AlleleBlockId> {
        (0..self.blocks.len()).map(AlleleBlockId::from)
    }

    /// Look up an interned block by value
    pub fn find(&self, start: usize, alleles: &[u16]) -> Option<AlleleBlockId> {
        self.index.get(&(start, alleles.to_vec())).copied()
    }

    pub fn graph(&self) -> &AlleleBlockGraph {
        &self.graph
    }

    pub fn genotype_blocks(&self) -> &[GenotypeBlock] {
        &self.genotype_blocks
    }

    pub fn n_samples(&self) -> usize {
        self.sample_blocks.len()
    }

    /// First genotype block of `sample` covering `lo..=hi`
    pub fn covering_block(&self, sample: SampleIdx, lo: usize, hi: usize) -> Option<&GenotypeBlock> {
        self.sample_blocks
            .get(sample.as_usize())?
            .iter()
            .map(|&g| &self.genotype_blocks[g])
            .find(|block| block.covers(lo, hi))
    }

    fn intern(&mut self, start: usize, alleles: Vec<u16>) -> AlleleBlockId {
        if let Some(&id) = self.index.get(&(start, alleles.clone())) {
            return id;
        }
        let id = AlleleBlockId::from(self.blocks.len());
        self.blocks.push(AlleleBlock::new(start, alleles.clone()));
        self.graph.add_node();
        self.index.insert((start, alleles), id);
        id
    }
}

/// Partition every sample haplotype of a group into allele blocks
pub fn partition(allele_set: &AlleleSet<'_>, columns: &[GenotypeColumn]) -> HaplotypePartition {
    let n_samples = columns.first().map(|c| c.n_samples()).unwrap_or(0);
    let mut result = HaplotypePartition {
        sample_blocks: vec![Vec::new(); n_samples],
        ..Default::default()
    };

    // Samples with identical calls share one genotype block
    let mut seen: HashMap<GenotypeBlock, usize> = HashMap::new();
    let mut block_samples: Vec<Vec<SampleIdx>> = Vec::new();
    for sample in 0..n_samples {
        for block in genotype_blocks(columns, sample) {
            let g = *seen.entry(block.clone()).or_insert_with(|| {
                result.genotype_blocks.push(block);
                block_samples.push(Vec::new());
                result.genotype_blocks.len() - 1
            });
            result.sample_blocks[sample].push(g);
            block_samples[g].push(SampleIdx::from(sample));
        }
    }

    for g in 0..result.genotype_blocks.len() {
        let block = &result.genotype_blocks[g];
        let block_start = block.start();
        let paths: Vec<Vec<u16>> = (0..block.ploidy()).map(|hap| block.haplotype(hap)).collect();

        for (hap, path) in paths.iter().enumerate() {
            let mut previous: Option<(AlleleBlockId, usize)> = None;
            for (lo, hi) in haplotype_windows(allele_set, block_start, path) {
                let alleles = path[lo - block_start..=hi - block_start].to_vec();
                let id = result.intern(lo, alleles);
                let members = &mut result.blocks[id.as_usize()].members;
                members.extend(block_samples[g].iter().map(|s| s.haplotype(hap as u8)));

                if let Some((prev_id, prev_end)) = previous {
                    if lo <= prev_end {
                        result.graph.add_edge(prev_id, id);
                    }
                }
                previous = Some((id, hi));
            }
        }
    }

    for block in &mut result.blocks {
        block.members.sort_unstable();
        block.members.dedup();
    }
    result
}

/// Padded windows `(lo, hi)` of one haplotype path starting at `block_start`
fn haplotype_windows(allele_set: &AlleleSet<'_>, block_start: usize, path: &[u16]) -> Vec<(usize, usize)> {
    let is_alt = |k: usize| allele_set.is_alt(k, path[k - block_start]);
    let block_end = block_start + path.len();
    let mut windows = Vec::new();

    let mut k = block_start;
    while k < block_end {
        if !is_alt(k) {
            k += 1;
            continue;
        }

        let first_alt = k;
        let first_start = allele_set.start(first_alt);
        let mut lo = first_alt;
        while lo > block_start && !is_alt(lo - 1) && allele_set.block_end(lo - 1) >= first_start {
            lo -= 1;
        }

        let mut reach = allele_set.block_end(first_alt);
        let mut hi = first_alt;
        while hi + 1 < block_end && allele_set.start(hi + 1) <= reach {
            hi += 1;
            if is_alt(hi) {
                reach = reach.max(allele_set.block_end(hi));
            }
        }

        windows.push((lo, hi));
        k = hi + 1;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snv(start: u32, ref_allele: &str, alts: &[&str], samples: &[&str]) -> SimplePosition {
        SimplePosition::new("chr1", start, ref_allele, alts.iter().map(|a| a.to_string()).collect())
            .with_samples("GT", samples)
    }

    fn encode(positions: &[SimplePosition]) -> Vec<GenotypeColumn> {
        positions
            .iter()
            .map(|p| GenotypeColumn::encode(p).unwrap())
            .collect()
    }

    #[test]
    fn test_partition_windows_with_padding() {
        let positions = vec![
            snv(356, "A", &["T", "G"], &["1|2"]),
            snv(358, "C", &["A"], &["1/1"]),
            snv(360, "G", &["C"], &["0|1"]),
            snv(361, "T", &["A"], &["0/1"]),
        ];
        let set = AlleleSet::from_slice(&positions, &[358, 360, 362, 364]);
        let partition = partition(&set, &encode(&positions));

        assert_eq!(partition.len(), 2);
        let first = partition.find(0, &[1, 1, 0]).unwrap();
        let second = partition.find(0, &[2, 1, 1]).unwrap();
        assert_eq!(partition.block(first).members(), &[SampleIdx::new(0).haplotype(0)]);
        assert_eq!(partition.block(second).end(), 2);
        assert_eq!(partition.graph().n_edges(), 0);
    }

    #[test]
    fn test_reference_haplotype_has_no_block() {
        let positions = vec![
            snv(2, "A", &["T"], &["0|1", "0|0"]),
            snv(4, "C", &["A"], &["0|1", "0|0"]),
        ];
        let set = AlleleSet::from_slice(&positions, &[4, 6]);
        let partition = partition(&set, &encode(&positions));

        assert_eq!(partition.len(), 1);
        let id = partition.find(0, &[1, 1]).unwrap();
        assert_eq!(partition.block(id).members(), &[SampleIdx::new(0).haplotype(1)]);
    }

    #[test]
    fn test_identical_samples_share_blocks() {
        let positions = vec![
            snv(2, "A", &["T"], &["1|0", "1|0"]),
            snv(4, "C", &["A"], &["1|0", "1|0"]),
        ];
        let set = AlleleSet::from_slice(&positions, &[4, 6]);
        let partition = partition(&set, &encode(&positions));

        assert_eq!(partition.genotype_blocks().len(), 1);
        let id = partition.find(0, &[1, 1]).unwrap();
        assert_eq!(
            partition.block(id).members(),
            &[SampleIdx::new(0).haplotype(0), SampleIdx::new(1).haplotype(0)]
        );
        assert!(partition.covering_block(SampleIdx::new(1), 0, 1).is_some());
        assert!(partition.covering_block(SampleIdx::new(2), 0, 1).is_none());
    }

    #[test]
    fn test_overlapping_windows_are_linked() {
        // Reach after offset 0 ends at 5; offset 2 starts past it, but offset 1
        // (a padding ref) still reaches offset 2 and leads the second window.
        let positions = vec![
            snv(2, "A", &["T"], &["1|0"]),
            snv(5, "C", &["A"], &["0|0"]),
            snv(6, "G", &["C"], &["1|0"]),
            snv(7, "T", &["A"], &["1|0"]),
        ];
        let set = AlleleSet::from_slice(&positions, &[5, 7, 8, 9]);
        let partition = partition(&set, &encode(&positions));

        let first = partition.find(0, &[1, 0]).unwrap();
        let second = partition.find(1, &[0, 1, 1]).unwrap();
        assert_eq!(partition.graph().successors(first), &[second]);
        assert_eq!(partition.graph().predecessors(second), &[first]);
        assert_eq!(partition.graph().in_degree(first), 0);
    }

    #[test]
    fn test_alt_equal_to_ref_is_not_alt() {
        let positions = vec![snv(2, "A", &["A", "T"], &["1|2"])];
        let set = AlleleSet::from_slice(&positions, &[4]);
        assert!(!set.is_alt(0, 1));
        assert!(set.is_alt(0, 2));
        assert!(!set.is_alt(0, 0));
    }
}
