//! # Variant Generation
//!
//! ## Role
//! Turn one site (merged allele blocks sharing an offset span) into a single
//! recomposed VCF record, or nothing.
//!
//! ## Steps
//! 1. Read each member haplotype's path from its genotype block and check it
//!    against the chain blocks it belongs to.
//! 2. Keep samples with a haplotype carrying alts at two or more genomic starts.
//! 3. Find alts whose reference spans overlap and that one sample carries,
//!    except single-base duplicates of one alt at the same start. The site is
//!    cut before the first excluded offset, so every rendered haplotype stays
//!    true to its calls.
//! 4. Rebuild REF from the reference and splice each haplotype's alts into it.
//! 5. Render genotypes, renumber alleles first-seen, trim shared flanks.
//! 6. Derive QUAL, FILTER and FORMAT minimums plus link-backs.
//!
//! ## Allele order
//! ALT alleles are numbered in the order samples first carry them, scanning
//! samples then haplotype slots. They are not sorted: a site seen as `TGA` on
//! the first sample and `AGA` on the next renders `TGA,AGA` with genotype
//! `1|2`, where a lexicographic writer would give `AGA,TGA` and `2|1`.
//!
//! ## Quality
//! QUAL is the minimum over every contributing position, including positions
//! whose FILTER fails. Failing positions only narrow the per-sample FORMAT
//! values (GQ, PS), which take their minimums over passing positions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::data::genotype::{GenotypeColumn, GQ_KEY, GT_KEY, PS_KEY};
use crate::data::haplotype::{SampleHaplotype, SampleIdx};
use crate::data::position::{
    trim_alleles, Filter, NumericField, SimplePosition, VariantId, FILTER_RECOMPOSED_FAILURE,
    MISSING,
};
use crate::data::reference::ReferenceSequence;
use crate::error::{RecomposeError, Result};
use crate::model::allele_block::{AlleleSet, HaplotypePartition};
use crate::model::merger::MergedAlleleBlock;

/// INFO flag carried by every recomposed record
pub const RECOMPOSED_INFO: &str = "RECOMPOSED";

/// One output record
#[derive(Clone, Debug, PartialEq)]
pub struct RecomposedVariant {
    pub chrom: String,
    /// 1-based, after trimming
    pub start: u32,
    /// Last reference base (inclusive)
    pub end: u32,
    pub ref_allele: String,
    /// First-seen order
    pub alt_alleles: Vec<String>,
    pub quality: Option<NumericField>,
    pub filter: Filter,
    pub format: Vec<String>,
    pub samples: Vec<String>,
    /// Per ALT: original variant ids that produced it
    pub linked_vids: Vec<Vec<VariantId>>,
}

impl RecomposedVariant {
    /// Minimal id of the recomposed allele at `alt_index` (0-based into ALT)
    pub fn vid(&self, alt_index: usize) -> Option<VariantId> {
        self.alt_alleles
            .get(alt_index)
            .map(|alt| VariantId::minimal(&self.chrom, self.start, &self.ref_allele, alt))
    }

    /// Tab-separated VCF columns
    pub fn vcf_fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.chrom.clone(),
            self.start.to_string(),
            MISSING.to_string(),
            self.ref_allele.clone(),
            self.alt_alleles.join(","),
            self.quality
                .as_ref()
                .map(|q| q.to_string())
                .unwrap_or_else(|| MISSING.to_string()),
            self.filter.to_string(),
            RECOMPOSED_INFO.to_string(),
        ];
        if !self.format.is_empty() {
            fields.push(self.format.join(":"));
            fields.extend(self.samples.iter().cloned());
        }
        fields
    }

    /// Same record as an input-shaped position
    pub fn to_position(&self) -> SimplePosition {
        SimplePosition {
            chrom: self.chrom.clone(),
            start: self.start,
            id: None,
            ref_allele: self.ref_allele.clone(),
            alt_alleles: self.alt_alleles.clone(),
            quality: self.quality.clone(),
            filter: self.filter.clone(),
            info: RECOMPOSED_INFO.to_string(),
            format: self.format.clone(),
            samples: self.samples.clone(),
        }
    }
}

impl fmt::Display for RecomposedVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.vcf_fields().join("\t"))
    }
}

/// Generated record plus links from original alleles to recomposed ones
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedSite {
    pub variant: RecomposedVariant,
    /// (original position index, ALT index, recomposed allele id)
    pub position_links: Vec<(usize, usize, VariantId)>,
}

/// Per-haplotype working state within one site
#[derive(Clone, Debug)]
struct SiteHaplotype {
    member: SampleHaplotype,
    /// None when no genotype block covers the whole span
    path: Option<Vec<u16>>,
    /// Offsets carrying an alt on this haplotype
    used: Vec<usize>,
}

/// Alt strings used at one offset and the samples carrying them
#[derive(Debug, Default)]
struct AltClaim<'a> {
    alts: BTreeSet<&'a str>,
    samples: BTreeSet<SampleIdx>,
}

/// Generates records for the sites of one window group
pub struct VariantGenerator<'a, R: ReferenceSequence + ?Sized> {
    reference: &'a R,
    allele_set: &'a AlleleSet<'a>,
    columns: &'a [GenotypeColumn],
    partition: &'a HaplotypePartition,
}

impl<'a, R: ReferenceSequence + ?Sized> VariantGenerator<'a, R> {
    pub fn new(
        reference: &'a R,
        allele_set: &'a AlleleSet<'a>,
        columns: &'a [GenotypeColumn],
        partition: &'a HaplotypePartition,
    ) -> Self {
        Self {
            reference,
            allele_set,
            columns,
            partition,
        }
    }

    /// Recompose one site. `Ok(None)` means the site yields no record.
    pub fn generate(&self, site: &[&MergedAlleleBlock]) -> Result<Option<GeneratedSite>> {
        let Some(first) = site.first() else {
            return Ok(None);
        };
        let (lo, hi) = first.span();
        let set = self.allele_set;

        let mut members: Vec<SampleHaplotype> = site
            .iter()
            .flat_map(|m| m.members().iter().copied())
            .collect();
        members.sort_unstable();
        members.dedup();

        let mut haplotypes = Vec::with_capacity(members.len());
        for member in members {
            let path = self.member_path(site, member, lo, hi)?;
            let used: Vec<usize> = path
                .as_ref()
                .map(|path| {
                    (lo..=hi)
                        .filter(|&k| set.is_alt(k, path[k - lo]))
                        .collect()
                })
                .unwrap_or_default();
            haplotypes.push(SiteHaplotype { member, path, used });
        }

        let mut qualifying = self.qualifying_samples(&haplotypes);
        if qualifying.is_empty() {
            log::debug!("Site {}..={} dropped: no multi-position haplotype", lo, hi);
            return Ok(None);
        }

        if let Some(cut) = self.conflict_cut(&haplotypes, &qualifying, lo) {
            // Every haplotype stops before the cut, so none is rendered as
            // reference where it carries an excluded alt
            for hap in &mut haplotypes {
                hap.used.retain(|&k| k < cut);
            }
            qualifying = self.qualifying_samples(&haplotypes);
            if qualifying.is_empty() {
                log::debug!("Site {}..={} dropped: conflict at offset {}", lo, hi, cut);
                return Ok(None);
            }
        }

        let kept: Vec<&SiteHaplotype> = haplotypes
            .iter()
            .filter(|h| qualifying.contains(&h.member.sample))
            .collect();
        let contributing: Vec<usize> = kept
            .iter()
            .flat_map(|h| h.used.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let (Some(&clo), Some(&chi)) = (contributing.first(), contributing.last()) else {
            return Ok(None);
        };

        let chrom = set.chrom();
        let start = set.start(clo);
        let end = contributing
            .iter()
            .map(|&k| set.end(k))
            .max()
            .unwrap_or(start);
        let reference = self
            .reference
            .substring(chrom, start, (end - start + 1) as usize)?;

        // Sequence of each kept haplotype; None is a no-call
        let mut sequences: BTreeMap<SampleHaplotype, Option<String>> = BTreeMap::new();
        for hap in &kept {
            let sequence = match &hap.path {
                None => None,
                Some(_) if self.fails_only(&hap.used) => None,
                Some(path) => Some(self.splice(&reference, start, lo, path, &hap.used)),
            };
            sequences.insert(hap.member, sequence);
        }

        // Genotypes as sequences, then renumbered
        let n_samples = self.columns.first().map(|c| c.n_samples()).unwrap_or(0);
        let mut alts: Vec<String> = Vec::new();
        let mut calls: Vec<Option<Vec<u16>>> = Vec::with_capacity(n_samples);
        let mut phased: Vec<bool> = Vec::with_capacity(n_samples);
        for s in 0..n_samples {
            let sample = SampleIdx::from(s);
            let alleles = if qualifying.contains(&sample) {
                self.qualifying_call(sample, clo, chi, &sequences, &reference)
            } else {
                self.reference_call(s, clo, chi)
                    .map(|ploidy| vec![reference.clone(); ploidy])
            };
            phased.push(self.is_phased_over(s, clo, chi));
            calls.push(alleles.map(|alleles| {
                alleles
                    .into_iter()
                    .map(|seq| register_allele(&mut alts, &reference, seq))
                    .collect()
            }));
        }
        if alts.is_empty() {
            log::debug!("Site {}..={} dropped: no called alternate allele", lo, hi);
            return Ok(None);
        }

        let mut alleles = Vec::with_capacity(1 + alts.len());
        alleles.push(reference.clone());
        alleles.extend(alts.iter().cloned());
        let trimmed_start = trim_alleles(start, &mut alleles);
        let ref_allele = alleles[0].clone();
        let alt_alleles = alleles[1..].to_vec();
        let trimmed_end = trimmed_start + ref_allele.len() as u32 - 1;

        // All contributing positions, failing ones included
        let quality = NumericField::min_of(
            contributing
                .iter()
                .filter_map(|&k| set.position(k).quality.as_ref()),
        )
        .cloned();
        let filter = if contributing.iter().all(|&k| set.passes_filter(k)) {
            Filter::Pass
        } else {
            Filter::Failed(FILTER_RECOMPOSED_FAILURE.to_string())
        };
        let (format, samples) = self.render_samples(&calls, &phased, &contributing);

        // Link-backs per ALT, carriers taken from rendered genotypes
        let mut linked_vids = Vec::with_capacity(alt_alleles.len());
        let mut position_links = Vec::new();
        for (alt_index, alt) in alt_alleles.iter().enumerate() {
            let allele = (alt_index + 1) as u16;
            let mut originals: BTreeSet<(usize, u16)> = BTreeSet::new();
            for hap in &kept {
                let carries = calls[hap.member.sample.as_usize()]
                    .as_ref()
                    .and_then(|c| c.get(hap.member.hap_index()))
                    .is_some_and(|&a| a == allele);
                let Some(path) = hap.path.as_ref().filter(|_| carries) else {
                    continue;
                };
                originals.extend(hap.used.iter().map(|&k| (k, path[k - lo])));
            }

            let recomposed = VariantId::minimal(chrom, trimmed_start, &ref_allele, alt);
            let mut vids: Vec<VariantId> = Vec::with_capacity(originals.len());
            for &(k, a) in &originals {
                let alt_idx = a as usize - 1;
                if let Some(vid) = set.position(k).vid(alt_idx) {
                    if !vids.contains(&vid) {
                        vids.push(vid);
                    }
                }
                position_links.push((set.original_index(k), alt_idx, recomposed.clone()));
            }
            linked_vids.push(vids);
        }

        Ok(Some(GeneratedSite {
            variant: RecomposedVariant {
                chrom: chrom.to_string(),
                start: trimmed_start,
                end: trimmed_end,
                ref_allele,
                alt_alleles,
                quality,
                filter,
                format,
                samples,
                linked_vids,
            },
            position_links,
        }))
    }

    /// Member alleles over `lo..=hi`, checked against its chain blocks
    fn member_path(
        &self,
        site: &[&MergedAlleleBlock],
        member: SampleHaplotype,
        lo: usize,
        hi: usize,
    ) -> Result<Option<Vec<u16>>> {
        let Some(path) = self
            .partition
            .covering_block(member.sample, lo, hi)
            .and_then(|block| block.path(member.hap_index(), lo, hi))
        else {
            return Ok(None);
        };

        for merged in site {
            for &id in merged.blocks() {
                let block = self.partition.block(id);
                if !block.contains(member) {
                    continue;
                }
                if path[block.start() - lo..=block.end() - lo] != *block.alleles() {
                    return Err(RecomposeError::internal(format!(
                        "{} disagrees with allele block at offset {}",
                        member,
                        block.start()
                    )));
                }
            }
        }
        Ok(Some(path))
    }

    /// Samples with a haplotype using alts at two or more genomic starts
    fn qualifying_samples(&self, haplotypes: &[SiteHaplotype]) -> BTreeSet<SampleIdx> {
        haplotypes
            .iter()
            .filter(|h| {
                let mut starts: Vec<u32> = h.used.iter().map(|&k| self.allele_set.start(k)).collect();
                starts.dedup();
                starts.len() >= 2
            })
            .map(|h| h.member.sample)
            .collect()
    }

    /// First offset the site must stop before, if two used alts collide.
    ///
    /// Alts collide when their reference spans overlap and one sample carries
    /// both. When a single haplotype carries both, neither is kept; otherwise
    /// the earlier offset wins and the later one is excluded.
    fn conflict_cut(
        &self,
        haplotypes: &[SiteHaplotype],
        qualifying: &BTreeSet<SampleIdx>,
        lo: usize,
    ) -> Option<usize> {
        let set = self.allele_set;
        let kept: Vec<&SiteHaplotype> = haplotypes
            .iter()
            .filter(|h| qualifying.contains(&h.member.sample))
            .collect();

        let mut claims: BTreeMap<usize, AltClaim<'a>> = BTreeMap::new();
        for hap in &kept {
            let Some(path) = &hap.path else { continue };
            for &k in &hap.used {
                if let Some(alt) = set.allele(k, path[k - lo]) {
                    let claim = claims.entry(k).or_default();
                    claim.alts.insert(alt);
                    claim.samples.insert(hap.member.sample);
                }
            }
        }

        let offsets: Vec<usize> = claims.keys().copied().collect();
        let mut cut: Option<usize> = None;
        for (i, &a) in offsets.iter().enumerate() {
            for &b in &offsets[i + 1..] {
                if !set.overlaps(a, b) || claims[&a].samples.is_disjoint(&claims[&b].samples) {
                    continue;
                }
                let forced_duplicate = set.start(a) == set.start(b)
                    && set.position(a).ref_allele.len() == 1
                    && set.position(b).ref_allele.len() == 1
                    && claims[&a].alts.len() == 1
                    && claims[&a].alts == claims[&b].alts;
                if forced_duplicate {
                    continue;
                }
                let same_haplotype = kept
                    .iter()
                    .any(|h| h.used.contains(&a) && h.used.contains(&b));
                let excluded = if same_haplotype { a } else { b };
                cut = Some(cut.map_or(excluded, |c| c.min(excluded)));
            }
        }
        cut
    }

    /// Every used alt sits at a failing position
    fn fails_only(&self, used: &[usize]) -> bool {
        !used.is_empty() && used.iter().all(|&k| !self.allele_set.passes_filter(k))
    }

    /// Splice used alts into the reference; a start already passed is skipped
    fn splice(&self, reference: &str, start: u32, lo: usize, path: &[u16], used: &[usize]) -> String {
        let set = self.allele_set;
        let mut sequence = String::with_capacity(reference.len());
        let mut cursor = start;
        for &k in used {
            let k_start = set.start(k);
            if k_start < cursor {
                continue;
            }
            let Some(alt) = set.allele(k, path[k - lo]) else {
                continue;
            };
            sequence.push_str(&reference[(cursor - start) as usize..(k_start - start) as usize]);
            sequence.push_str(alt);
            cursor = set.end(k) + 1;
        }
        let tail = ((cursor - start) as usize).min(reference.len());
        sequence.push_str(&reference[tail..]);
        sequence
    }

    /// Haplotype sequences of a qualifying sample; None if any is a no-call
    fn qualifying_call(
        &self,
        sample: SampleIdx,
        clo: usize,
        chi: usize,
        sequences: &BTreeMap<SampleHaplotype, Option<String>>,
        reference: &str,
    ) -> Option<Vec<String>> {
        let s = sample.as_usize();
        let ploidy = self
            .called_ploidy(s, clo, chi)
            .or_else(|| {
                sequences
                    .keys()
                    .filter(|m| m.sample == sample)
                    .map(|m| m.hap_index() + 1)
                    .max()
            })
            .unwrap_or(2);

        (0..ploidy)
            .map(|hap| match sequences.get(&sample.haplotype(hap as u8)) {
                Some(sequence) => sequence.clone(),
                None if self.reference_over(s, hap, clo, chi) => Some(reference.to_string()),
                None => None,
            })
            .collect()
    }

    /// Ploidy of a sample called reference over `clo..=chi`
    fn reference_call(&self, s: usize, clo: usize, chi: usize) -> Option<usize> {
        let ploidy = self.called_ploidy(s, clo, chi)?;
        (0..ploidy)
            .all(|hap| self.reference_over(s, hap, clo, chi))
            .then_some(ploidy)
    }

    /// Haplotype is called and non-alt at every offset in range
    fn reference_over(&self, s: usize, hap: usize, clo: usize, chi: usize) -> bool {
        (clo..=chi).all(|k| {
            self.columns[k]
                .genotype(s)
                .and_then(|g| g.allele(hap))
                .is_some_and(|a| !self.allele_set.is_alt(k, a))
        })
    }

    fn called_ploidy(&self, s: usize, clo: usize, chi: usize) -> Option<usize> {
        (clo..=chi).find_map(|k| self.columns[k].genotype(s).map(|g| g.ploidy()))
    }

    /// Every called genotype in range is phased or homozygous
    fn is_phased_over(&self, s: usize, clo: usize, chi: usize) -> bool {
        (clo..=chi)
            .filter_map(|k| self.columns[k].genotype(s))
            .all(|g| g.is_phased() || g.is_homozygous())
    }

    /// FORMAT keys and per-sample columns
    fn render_samples(
        &self,
        calls: &[Option<Vec<u16>>],
        phased: &[bool],
        contributing: &[usize],
    ) -> (Vec<String>, Vec<String>) {
        let passing: Vec<usize> = contributing
            .iter()
            .copied()
            .filter(|&k| self.allele_set.passes_filter(k))
            .collect();

        let mut values = Vec::with_capacity(calls.len());
        for (s, call) in calls.iter().enumerate() {
            let Some(alleles) = call else {
                values.push(None);
                continue;
            };
            let gq = NumericField::min_of(
                passing
                    .iter()
                    .filter_map(|&k| self.columns[k].genotype_quality(s)),
            )
            .cloned();
            let homozygous = alleles.windows(2).all(|w| w[0] == w[1]);
            let ps = if homozygous {
                None
            } else {
                NumericField::min_of(passing.iter().filter_map(|&k| self.columns[k].phase_set(s)))
                    .cloned()
            };
            let sep = if phased[s] { "|" } else { "/" };
            let gt = alleles
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(sep);
            values.push(Some((gt, gq, ps)));
        }

        let has_gq = values.iter().flatten().any(|(_, gq, _)| gq.is_some());
        let has_ps = values.iter().flatten().any(|(_, _, ps)| ps.is_some());
        let mut format = vec![GT_KEY.to_string()];
        if has_gq {
            format.push(GQ_KEY.to_string());
        }
        if has_ps {
            format.push(PS_KEY.to_string());
        }

        let samples = values
            .into_iter()
            .map(|value| {
                let Some((gt, gq, ps)) = value else {
                    return MISSING.to_string();
                };
                let mut fields = vec![gt];
                if has_gq {
                    fields.push(gq.map(|v| v.to_string()).unwrap_or_else(|| MISSING.to_string()));
                }
                if has_ps {
                    fields.push(ps.map(|v| v.to_string()).unwrap_or_else(|| MISSING.to_string()));
                }
                while fields.len() > 1 && fields.last().is_some_and(|f| f == MISSING) {
                    fields.pop();
                }
                fields.join(":")
            })
            .collect();
        (format, samples)
    }
}

/// Group merged blocks into sites by identical span, in span order
pub fn group_sites(merged: &[MergedAlleleBlock]) -> Vec<Vec<&MergedAlleleBlock>> {
    let mut sites: BTreeMap<(usize, usize), Vec<&MergedAlleleBlock>> = BTreeMap::new();
    for block in merged {
        sites.entry(block.span()).or_default().push(block);
    }
    sites.into_values().collect()
}

/// Index of `sequence` in the site's allele list, registering it if new
fn register_allele(alts: &mut Vec<String>, reference: &str, sequence: String) -> u16 {
    if sequence == reference {
        return 0;
    }
    match alts.iter().position(|a| *a == sequence) {
        Some(idx) => (idx + 1) as u16,
        None => {
            alts.push(sequence);
            alts.len() as u16
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::reference::InMemoryReference;
    use crate::model::allele_block::partition;
    use crate::model::merger::merge;

    fn snv(start: u32, ref_allele: &str, alt: &str, samples: &[&str]) -> SimplePosition {
        SimplePosition::new("chr1", start, ref_allele, vec![alt.to_string()]).with_samples("GT", samples)
    }

    #[test]
    fn test_register_allele_first_seen() {
        let mut alts = Vec::new();
        assert_eq!(register_allele(&mut alts, "AGC", "TGA".into()), 1);
        assert_eq!(register_allele(&mut alts, "AGC", "AGC".into()), 0);
        assert_eq!(register_allele(&mut alts, "AGC", "GGG".into()), 2);
        assert_eq!(register_allele(&mut alts, "AGC", "TGA".into()), 1);
        assert_eq!(alts, vec!["TGA".to_string(), "GGG".to_string()]);
    }

    #[test]
    fn test_generate_single_haplotype_site() {
        let reference = InMemoryReference::new().with_sequence("chr1", "CAGCTGAA");
        let positions = vec![snv(2, "A", "T", &["1|0"]), snv(4, "C", "A", &["1|0"])];
        let columns: Vec<GenotypeColumn> = positions
            .iter()
            .map(|p| GenotypeColumn::encode(p).unwrap())
            .collect();
        let set = AlleleSet::from_slice(&positions, &[4, 6]);
        let partition = partition(&set, &columns);
        let merged = merge(&partition);
        let sites = group_sites(&merged);
        assert_eq!(sites.len(), 1);

        let generator = VariantGenerator::new(&reference, &set, &columns, &partition);
        let generated = generator.generate(&sites[0]).unwrap().unwrap();
        let variant = &generated.variant;
        assert_eq!(
            variant.vcf_fields().join(" "),
            "chr1 2 . AGC TGA . PASS RECOMPOSED GT 1|0"
        );
        assert_eq!(variant.vid(0).unwrap(), "1-2-AGC-TGA");
        assert!(variant.vid(1).is_none());
        assert_eq!(
            generated.position_links,
            vec![
                (0, 0, VariantId::new("chr1", 2, "AGC", "TGA")),
                (1, 0, VariantId::new("chr1", 2, "AGC", "TGA")),
            ]
        );

        let position = variant.to_position();
        assert_eq!(position.info, RECOMPOSED_INFO);
        assert_eq!(position.end(), 4);
    }

    #[test]
    fn test_single_start_yields_nothing() {
        let reference = InMemoryReference::new().with_sequence("chr1", "CAGCTGAA");
        // Alts on different haplotypes never share a path
        let positions = vec![snv(2, "A", "T", &["1|0"]), snv(4, "C", "A", &["0|1"])];
        let columns: Vec<GenotypeColumn> = positions
            .iter()
            .map(|p| GenotypeColumn::encode(p).unwrap())
            .collect();
        let set = AlleleSet::from_slice(&positions, &[4, 6]);
        let partition = partition(&set, &columns);
        let merged = merge(&partition);
        let generator = VariantGenerator::new(&reference, &set, &columns, &partition);
        for site in group_sites(&merged) {
            assert!(generator.generate(&site).unwrap().is_none());
        }
    }
}
