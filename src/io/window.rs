//! # Function-Block Windows
//!
//! Derives the function-block end of each position: the last base a position
//! may be merged with. The fixed-span detector reaches `span` bases past the
//! position start.

use crate::data::position::SimplePosition;
use crate::pipelines::recompose::ChromosomeBatch;

/// Default reach of a function block, in bases past the start
pub const DEFAULT_BLOCK_SPAN: u32 = 2;

/// Builder for function-block boundaries
#[derive(Clone, Debug)]
pub struct FunctionBlockBuilder {
    /// Bases past the start a block reaches
    span: u32,
}

impl FunctionBlockBuilder {
    /// Create a builder with the default span
    pub fn new() -> Self {
        Self {
            span: DEFAULT_BLOCK_SPAN,
        }
    }

    /// Set the block span
    pub fn span(mut self, span: u32) -> Self {
        self.span = span;
        self
    }

    /// One end per position, never decreasing
    pub fn build(&self, positions: &[SimplePosition]) -> Vec<u32> {
        let mut ends = Vec::with_capacity(positions.len());
        let mut last = 0u32;
        for position in positions {
            last = last.max(position.start.saturating_add(self.span));
            ends.push(last);
        }
        ends
    }

    /// Pair a chromosome's positions with their block ends
    pub fn batch(&self, positions: Vec<SimplePosition>) -> ChromosomeBatch {
        let block_ends = self.build(&positions);
        ChromosomeBatch::new(positions, block_ends)
    }
}

impl Default for FunctionBlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(starts: &[u32]) -> Vec<SimplePosition> {
        starts
            .iter()
            .map(|&s| SimplePosition::new("chr1", s, "A", vec!["T".into()]))
            .collect()
    }

    #[test]
    fn test_default_span() {
        let ends = FunctionBlockBuilder::new().build(&positions(&[2, 4, 6]));
        assert_eq!(ends, vec![4, 6, 8]);
    }

    #[test]
    fn test_custom_span() {
        let ends = FunctionBlockBuilder::new().span(5).build(&positions(&[10, 10, 12]));
        assert_eq!(ends, vec![15, 15, 17]);
    }

    #[test]
    fn test_batch() {
        let batch = FunctionBlockBuilder::default().batch(positions(&[1, 2]));
        assert_eq!(batch.block_ends, vec![3, 4]);
        assert_eq!(batch.chrom(), Some("chr1"));
    }
}
