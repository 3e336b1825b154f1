//! # Model Module
//!
//! The recomposition algorithms for one window group.
//!
//! ## Stages
//! - `allele_block`: per-haplotype allele windows interned into blocks, plus
//!   the successor graph between consecutive windows of a haplotype
//! - `merger`: collapses unbranched block chains into merged blocks
//! - `generator`: turns the merged blocks sharing a span into one recomposed
//!   record with rendered genotypes and link-back ids

pub mod allele_block;
pub mod generator;
pub mod merger;

pub use allele_block::{partition, AlleleBlock, AlleleBlockGraph, AlleleBlockId, AlleleSet, HaplotypePartition};
pub use generator::{group_sites, GeneratedSite, RecomposedVariant, VariantGenerator, RECOMPOSED_INFO};
pub use merger::{merge, MergedAlleleBlock};
