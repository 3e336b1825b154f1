//! # Reference Sequence Access
//!
//! The generator rebuilds REF/ALT strings from the reference. Lookups are
//! 1-based and inclusive of `start`; any span running past a sequence end (or
//! an unknown chromosome) is `OutOfRangeSequence`.

use std::collections::HashMap;

use crate::error::{RecomposeError, Result};

/// Read-only reference shared across worker threads
pub trait ReferenceSequence: Sync {
    /// `len` bases starting at 1-based `start`
    fn substring(&self, chrom: &str, start: u32, len: usize) -> Result<String>;
}

/// Whole sequences held in memory, keyed by name
#[derive(Clone, Debug, Default)]
pub struct InMemoryReference {
    sequences: HashMap<String, Vec<u8>>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a sequence; bases are upper-cased
    pub fn insert(&mut self, name: impl Into<String>, sequence: impl AsRef<[u8]>) {
        let bases = sequence.as_ref().to_ascii_uppercase();
        self.sequences.insert(name.into(), bases);
    }

    pub fn with_sequence(mut self, name: impl Into<String>, sequence: impl AsRef<[u8]>) -> Self {
        self.insert(name, sequence);
        self
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Sequence by name, accepting a `chr` prefix mismatch either way
    fn lookup(&self, chrom: &str) -> Option<&[u8]> {
        if let Some(seq) = self.sequences.get(chrom) {
            return Some(seq.as_slice());
        }
        let alias = match chrom.strip_prefix("chr") {
            Some(bare) => bare.to_string(),
            None => format!("chr{}", chrom),
        };
        self.sequences.get(&alias).map(|s| s.as_slice())
    }
}

impl ReferenceSequence for InMemoryReference {
    fn substring(&self, chrom: &str, start: u32, len: usize) -> Result<String> {
        let out_of_range = || RecomposeError::out_of_range(chrom, start, len);
        let seq = self.lookup(chrom).ok_or_else(out_of_range)?;
        if start == 0 {
            return Err(out_of_range());
        }
        let begin = start as usize - 1;
        let end = begin.checked_add(len).ok_or_else(out_of_range)?;
        let bases = seq.get(begin..end).ok_or_else(out_of_range)?;
        Ok(String::from_utf8_lossy(bases).into_owned())
    }
}
