//! # Allele Block Merging
//!
//! Collapse unambiguous chains of the allele block graph. A chain moves from
//! `a` to `b` only when `a` has a single successor and `b` a single
//! predecessor; any branching ends it.

use crate::data::haplotype::SampleHaplotype;
use crate::model::allele_block::{AlleleBlockId, HaplotypePartition};

/// Maximal chain of allele blocks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergedAlleleBlock {
    start: usize,
    end: usize,
    blocks: Vec<AlleleBlockId>,
    members: Vec<SampleHaplotype>,
}

impl MergedAlleleBlock {
    /// First offset of the chain
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last offset of the chain (inclusive)
    pub fn end(&self) -> usize {
        self.end
    }

    /// Chain order
    pub fn blocks(&self) -> &[AlleleBlockId] {
        &self.blocks
    }

    /// Union of chain members, sorted
    pub fn members(&self) -> &[SampleHaplotype] {
        &self.members
    }

    pub fn span(&self) -> (usize, usize) {
        (self.start, self.end)
    }
}

/// Every allele block lands in exactly one merged block
pub fn merge(partition: &HaplotypePartition) -> Vec<MergedAlleleBlock> {
    let graph = partition.graph();
    let continues = |from: AlleleBlockId| -> Option<AlleleBlockId> {
        match graph.successors(from) {
            [next] if graph.in_degree(*next) == 1 => Some(*next),
            _ => None,
        }
    };
    let is_chain_head = |id: AlleleBlockId| match graph.predecessors(id) {
        [prev] => continues(*prev).is_none(),
        _ => true,
    };

    let mut visited = vec![false; partition.len()];
    let mut merged = Vec::new();
    for id in partition.ids().filter(|&id| is_chain_head(id)) {
        let mut chain = vec![id];
        visited[id.as_usize()] = true;
        let mut current = id;
        while let Some(next) = continues(current) {
            if visited[next.as_usize()] {
                break;
            }
            visited[next.as_usize()] = true;
            chain.push(next);
            current = next;
        }
        merged.push(build(partition, chain));
    }

    // Chains are acyclic, so this only guards against malformed graphs
    for id in partition.ids() {
        if !visited[id.as_usize()] {
            merged.push(build(partition, vec![id]));
        }
    }

    merged.sort_by(|a, b| {
        (a.start, a.end, a.members.first()).cmp(&(b.start, b.end, b.members.first()))
    });
    merged
}

fn build(partition: &HaplotypePartition, blocks: Vec<AlleleBlockId>) -> MergedAlleleBlock {
    let start = blocks
        .iter()
        .map(|&id| partition.block(id).start())
        .min()
        .unwrap_or(0);
    let end = blocks
        .iter()
        .map(|&id| partition.block(id).end())
        .max()
        .unwrap_or(0);
    let mut members: Vec<SampleHaplotype> = blocks
        .iter()
        .flat_map(|&id| partition.block(id).members().iter().copied())
        .collect();
    members.sort_unstable();
    members.dedup();

    MergedAlleleBlock {
        start,
        end,
        blocks,
        members,
    }
}
