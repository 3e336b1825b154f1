//! # Recomposition Orchestrator
//!
//! ## Role
//! Validate one chromosome's positions, encode their genotypes, cut them into
//! independent window groups and drive partitioning, merging and generation for
//! each group in parallel.
//!
//! ## Failure policy
//! - A malformed position is skipped and reported.
//! - A reference span outside the sequence abandons its group only.
//! - Every other error fails the whole call.

use std::collections::BTreeMap;
use std::ops::Range;

use rayon::prelude::*;
use tracing::info_span;

use crate::data::genotype::GenotypeColumn;
use crate::data::position::{SimplePosition, VariantId};
use crate::data::reference::ReferenceSequence;
use crate::error::{RecomposeError, Result};
use crate::model::allele_block::{partition, AlleleSet};
use crate::model::generator::{group_sites, GeneratedSite, RecomposedVariant, VariantGenerator};
use crate::model::merger::merge;

/// Original allele -> recomposed allele ids.
///
/// Keyed by index into the caller's position slice; one list per ALT, in
/// output order without duplicates.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinkedVids {
    links: BTreeMap<usize, Vec<Vec<VariantId>>>,
}

impl LinkedVids {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, position: usize, n_alts: usize, alt_index: usize, vid: VariantId) {
        let alleles = self
            .links
            .entry(position)
            .or_insert_with(|| vec![Vec::new(); n_alts]);
        if alleles.len() <= alt_index {
            alleles.resize(alt_index + 1, Vec::new());
        }
        let vids = &mut alleles[alt_index];
        if !vids.contains(&vid) {
            vids.push(vid);
        }
    }

    /// Per-ALT lists of one position, if any allele was recomposed
    pub fn for_position(&self, position: usize) -> Option<&[Vec<VariantId>]> {
        self.links.get(&position).map(|v| v.as_slice())
    }

    pub fn for_allele(&self, position: usize, alt_index: usize) -> &[VariantId] {
        self.links
            .get(&position)
            .and_then(|alleles| alleles.get(alt_index))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_linked(&self, position: usize) -> bool {
        self.links.contains_key(&position)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[Vec<VariantId>])> {
        self.links.iter().map(|(&p, v)| (p, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Non-fatal events of one call
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// Position excluded before grouping
    SkippedPosition {
        index: usize,
        start: u32,
        reason: String,
    },
    /// Window group that produced no output because of a reference error
    AbandonedGroup {
        first: usize,
        last: usize,
        reason: String,
    },
}

/// Result of recomposing one chromosome
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Recomposition {
    /// Sorted by (start, end, ref, alts)
    pub variants: Vec<RecomposedVariant>,
    pub links: LinkedVids,
    pub diagnostics: Vec<Diagnostic>,
}

/// Positions and function-block ends of one chromosome
#[derive(Clone, Debug, Default)]
pub struct ChromosomeBatch {
    pub positions: Vec<SimplePosition>,
    pub block_ends: Vec<u32>,
}

impl ChromosomeBatch {
    pub fn new(positions: Vec<SimplePosition>, block_ends: Vec<u32>) -> Self {
        Self {
            positions,
            block_ends,
        }
    }

    pub fn chrom(&self) -> Option<&str> {
        self.positions.first().map(|p| p.chrom.as_str())
    }
}

/// Maximal runs where each start is within the furthest block end so far
pub fn window_groups(starts: &[u32], block_ends: &[u32]) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let Some(&first_end) = block_ends.first() else {
        return groups;
    };

    let mut group_start = 0;
    let mut reach = first_end;
    for i in 1..starts.len() {
        if starts[i] > reach {
            groups.push(group_start..i);
            group_start = i;
            reach = block_ends[i];
        } else {
            reach = reach.max(block_ends[i]);
        }
    }
    groups.push(group_start..starts.len());
    groups
}

/// Encoded positions that survived validation
struct EncodedPositions {
    /// Indices into the caller's slice
    indices: Vec<usize>,
    columns: Vec<GenotypeColumn>,
}

/// Recomposition engine over a shared reference
pub struct Recomposer<'r, R: ReferenceSequence + ?Sized> {
    reference: &'r R,
}

impl<'r, R: ReferenceSequence + ?Sized> Recomposer<'r, R> {
    pub fn new(reference: &'r R) -> Self {
        Self { reference }
    }

    /// Recompose one chromosome. `block_ends[i]` is the last base position `i`
    /// can merge with.
    pub fn recompose(&self, positions: &[SimplePosition], block_ends: &[u32]) -> Result<Recomposition> {
        info_span!("recompose", n_positions = positions.len()).in_scope(|| {
            validate(positions, block_ends)?;

            let mut diagnostics = Vec::new();
            let encoded = self.encode_positions(positions, &mut diagnostics);

            let starts: Vec<u32> = encoded.indices.iter().map(|&i| positions[i].start).collect();
            let ends: Vec<u32> = encoded.indices.iter().map(|&i| block_ends[i]).collect();
            let groups: Vec<Range<usize>> = window_groups(&starts, &ends)
                .into_iter()
                .filter(|g| g.len() >= 2)
                .collect();

            let results: Vec<(Range<usize>, Result<Vec<GeneratedSite>>)> = groups
                .into_par_iter()
                .map(|group| {
                    let sites = self.recompose_group(positions, &encoded, &ends, group.clone());
                    (group, sites)
                })
                .collect();

            let mut sites = Vec::new();
            for (group, result) in results {
                match result {
                    Ok(generated) => sites.extend(generated),
                    Err(e) if e.is_group_local() => {
                        let first = encoded.indices[group.start];
                        let last = encoded.indices[group.end - 1];
                        log::warn!("Abandoning window group {}..={}: {}", first, last, e);
                        diagnostics.push(Diagnostic::AbandonedGroup {
                            first,
                            last,
                            reason: e.to_string(),
                        });
                    }
                    Err(e) => return Err(e),
                }
            }

            sites.sort_by(|a, b| {
                let (a, b) = (&a.variant, &b.variant);
                (a.start, a.end, &a.ref_allele, &a.alt_alleles)
                    .cmp(&(b.start, b.end, &b.ref_allele, &b.alt_alleles))
            });

            let mut links = LinkedVids::new();
            let mut variants = Vec::with_capacity(sites.len());
            for site in sites {
                for (index, alt_index, vid) in site.position_links {
                    links.insert(index, positions[index].alt_alleles.len(), alt_index, vid);
                }
                variants.push(site.variant);
            }

            Ok(Recomposition {
                variants,
                links,
                diagnostics,
            })
        })
    }

    /// Recompose independent chromosomes across the rayon pool
    pub fn recompose_chromosomes(&self, batches: &[ChromosomeBatch]) -> Vec<Result<Recomposition>> {
        batches
            .par_iter()
            .map(|batch| self.recompose(&batch.positions, &batch.block_ends))
            .collect()
    }

    fn encode_positions(
        &self,
        positions: &[SimplePosition],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> EncodedPositions {
        info_span!("encode_positions").in_scope(|| {
            let mut indices = Vec::with_capacity(positions.len());
            let mut columns = Vec::with_capacity(positions.len());
            for (index, position) in positions.iter().enumerate() {
                match GenotypeColumn::encode(position) {
                    Ok(column) => {
                        indices.push(index);
                        columns.push(column);
                    }
                    Err(e) => {
                        log::warn!(
                            "Skipping {}:{} from recomposition: {}",
                            position.chrom,
                            position.start,
                            e
                        );
                        diagnostics.push(Diagnostic::SkippedPosition {
                            index,
                            start: position.start,
                            reason: e.to_string(),
                        });
                    }
                }
            }
            EncodedPositions { indices, columns }
        })
    }

    fn recompose_group(
        &self,
        positions: &[SimplePosition],
        encoded: &EncodedPositions,
        ends: &[u32],
        group: Range<usize>,
    ) -> Result<Vec<GeneratedSite>> {
        info_span!("recompose_group", start = group.start, len = group.len()).in_scope(|| {
            let indices = encoded.indices[group.clone()].to_vec();
            let allele_set = AlleleSet::new(
                indices.iter().map(|&i| &positions[i]).collect(),
                indices,
                ends[group.clone()].to_vec(),
            );
            let columns = &encoded.columns[group];

            let partition = partition(&allele_set, columns);
            let merged = merge(&partition);
            let generator = VariantGenerator::new(self.reference, &allele_set, columns, &partition);

            let mut sites = Vec::new();
            for site in group_sites(&merged) {
                if let Some(generated) = generator.generate(&site)? {
                    sites.push(generated);
                }
            }
            Ok(sites)
        })
    }
}

/// Reject inconsistent positions or boundaries
fn validate(positions: &[SimplePosition], block_ends: &[u32]) -> Result<()> {
    if positions.len() != block_ends.len() {
        return Err(RecomposeError::invalid_input(format!(
            "{} positions but {} function-block ends",
            positions.len(),
            block_ends.len()
        )));
    }
    let Some(first) = positions.first() else {
        return Ok(());
    };

    for (i, position) in positions.iter().enumerate() {
        if position.chrom != first.chrom {
            return Err(RecomposeError::invalid_input(format!(
                "position {} is on {} but the batch is on {}",
                i, position.chrom, first.chrom
            )));
        }
        if position.n_samples() != first.n_samples() {
            return Err(RecomposeError::invalid_input(format!(
                "position {} has {} samples, expected {}",
                i,
                position.n_samples(),
                first.n_samples()
            )));
        }
        if i > 0 {
            if position.start < positions[i - 1].start {
                return Err(RecomposeError::invalid_input(format!(
                    "positions are not sorted at {}:{}",
                    position.chrom, position.start
                )));
            }
            if block_ends[i] < block_ends[i - 1] {
                return Err(RecomposeError::invalid_input(format!(
                    "function-block ends decrease at position {}",
                    i
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_groups() {
        let groups = window_groups(&[2, 4, 6, 20, 22, 40], &[4, 6, 8, 22, 24, 42]);
        assert_eq!(groups, vec![0..3, 3..5, 5..6]);
        assert!(window_groups(&[], &[]).is_empty());
    }

    #[test]
    fn test_window_groups_use_max_reach() {
        // A long block at offset 0 keeps later positions in the group
        let groups = window_groups(&[1, 3, 9], &[10, 10, 12]);
        assert_eq!(groups, vec![0..3]);
    }

    #[test]
    fn test_validate_lengths() {
        let positions = vec![SimplePosition::new("chr1", 2, "A", vec!["T".into()])];
        assert!(matches!(
            validate(&positions, &[]),
            Err(RecomposeError::InvalidInput { .. })
        ));
        assert!(validate(&positions, &[4]).is_ok());
    }

    #[test]
    fn test_validate_order_and_chrom() {
        let a = SimplePosition::new("chr1", 4, "A", vec!["T".into()]);
        let b = SimplePosition::new("chr1", 2, "C", vec!["G".into()]);
        assert!(validate(&[a.clone(), b], &[6, 6]).is_err());

        let c = SimplePosition::new("chr2", 6, "C", vec!["G".into()]);
        assert!(validate(&[a.clone(), c], &[6, 8]).is_err());

        let d = SimplePosition::new("chr1", 6, "C", vec!["G".into()]);
        assert!(validate(&[a, d], &[8, 6]).is_err());
    }

    #[test]
    fn test_linked_vids_dedup() {
        let mut links = LinkedVids::new();
        let vid = VariantId::new("chr1", 2, "AGC", "TGA");
        links.insert(0, 2, 1, vid.clone());
        links.insert(0, 2, 1, vid.clone());
        assert_eq!(links.for_allele(0, 1), &[vid]);
        assert!(links.for_allele(0, 0).is_empty());
        assert_eq!(links.for_position(0).map(|v| v.len()), Some(2));
        assert!(!links.is_linked(1));
        assert!(links.for_allele(5, 0).is_empty());
    }
}
