//! # Pipeline Module
//!
//! High-level orchestration of recomposition.
//! `recompose` is the in-memory engine entry point; `pipeline` wires it to
//! VCF/FASTA files for the CLI.

pub mod pipeline;
pub mod recompose;

pub use pipeline::{RecomposePipeline, RunSummary};
pub use recompose::{ChromosomeBatch, Diagnostic, LinkedVids, Recomposer, Recomposition};
