//! # Recomposer Library Root
//!
//! ## Role
//! Recompose phased SNVs and short indels that sit close together on the same
//! haplotype into multi-nucleotide variant records, and link every original
//! allele to the records it was folded into.
//!
//! ## Module Structure
//! ```text
//! recomposer
//! ├── data        # Positions, encoded genotypes, reference sequence
//! ├── io          # VCF/FASTA reading and writing, function blocks
//! ├── model       # Allele blocks, chain merging, variant generation
//! ├── pipelines   # Window grouping and the end-to-end run
//! └── utils       # Helpers (threading)
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod pipelines;
pub mod utils;

pub use data::{InMemoryReference, ReferenceSequence, SimplePosition, VariantId};
pub use error::{RecomposeError, Result};
pub use model::RecomposedVariant;
pub use pipelines::{ChromosomeBatch, Diagnostic, LinkedVids, Recomposer, Recomposition};
