//! # I/O Module
//!
//! File reading/writing boundaries. Converts between VCF/FASTA on disk and the
//! in-memory positions and reference the engine works on.

pub mod fasta;
pub mod vcf;
pub mod window;

pub use fasta::read_fasta;
pub use vcf::{VcfReader, VcfWriter};
pub use window::FunctionBlockBuilder;
