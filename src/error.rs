//! # Centralized Error Handling
//!
//! Unified error types for the entire crate using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for recomposition
#[derive(Error, Debug)]
pub enum RecomposeError {
    /// I/O errors (file missing, permission denied, read/write failures)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// VCF header or record errors
    #[error("VCF error: {message}")]
    Vcf { message: String },

    /// FASTA reference errors
    #[error("FASTA error: {message}")]
    Fasta { message: String },

    /// Unparseable genotype syntax. Only the offending position is skipped.
    #[error("Malformed genotype '{genotype}'")]
    MalformedGenotype { genotype: String },

    /// Reference lookup outside the known sequence. Abandons one window group.
    #[error("Reference span {chrom}:{start} (+{len}) is outside the known sequence")]
    OutOfRangeSequence { chrom: String, start: u32, len: usize },

    /// Caller supplied inconsistent positions or window boundaries
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Broken internal invariant. Never silently produce a wrong record.
    #[error("Internal consistency error: {message}")]
    InternalConsistency { message: String },

    /// Configuration errors (invalid CLI arguments)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// File not found errors
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Parse errors
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// Type alias for Results using RecomposeError
pub type Result<T> = std::result::Result<T, RecomposeError>;

impl RecomposeError {
    /// Create a VCF error with a message
    pub fn vcf(message: impl Into<String>) -> Self {
        Self::Vcf {
            message: message.into(),
        }
    }

    /// Create a FASTA error with a message
    pub fn fasta(message: impl Into<String>) -> Self {
        Self::Fasta {
            message: message.into(),
        }
    }

    /// Create a malformed genotype error
    pub fn malformed_genotype(genotype: impl Into<String>) -> Self {
        Self::MalformedGenotype {
            genotype: genotype.into(),
        }
    }

    /// Create an out-of-range reference error
    pub fn out_of_range(chrom: impl Into<String>, start: u32, len: usize) -> Self {
        Self::OutOfRangeSequence {
            chrom: chrom.into(),
            start,
            len,
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal consistency error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalConsistency {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Errors that only invalidate the current window group
    pub fn is_group_local(&self) -> bool {
        matches!(self, Self::OutOfRangeSequence { .. })
    }
}

// Convert noodles VCF errors to RecomposeError
impl From<noodles::vcf::header::ParseError> for RecomposeError {
    fn from(err: noodles::vcf::header::ParseError) -> Self {
        Self::Vcf {
            message: err.to_string(),
        }
    }
}

impl From<needletail::errors::ParseError> for RecomposeError {
    fn from(err: needletail::errors::ParseError) -> Self {
        Self::Fasta {
            message: err.to_string(),
        }
    }
}
