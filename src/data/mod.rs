//! # Data Module
//!
//! In-memory representations of input records, encoded genotypes and the
//! reference. Nothing here knows about windows or allele blocks.
//!
//! ## Design Notes
//! - **Zero-cost newtypes:** `SampleIdx` keeps sample indices apart from
//!   position offsets.
//! - **Read-only inputs:** `SimplePosition`s are owned by the caller; the engine
//!   only borrows them.

pub mod genotype;
pub mod haplotype;
pub mod position;
pub mod reference;

// Re-export commonly used types
pub use genotype::{genotype_blocks, parse_genotype, Genotype, GenotypeBlock, GenotypeColumn};
pub use haplotype::{SampleHaplotype, SampleIdx, Samples};
pub use position::{trim_alleles, Filter, NumericField, SimplePosition, VariantId};
pub use reference::{InMemoryReference, ReferenceSequence};
