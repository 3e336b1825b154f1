//! # Configuration Logic
//!
//! ## Role
//! CLI argument parsing and validation.
//!
//! ## Fields
//! - `vcf: PathBuf` - Phased input VCF (plain or BGZF)
//! - `r#ref: PathBuf` - Reference FASTA (plain or gzip)
//! - `out: PathBuf` - Output VCF; `.gz` writes BGZF
//! - `links: Option<PathBuf>` - Link-back table from original to recomposed alleles
//! - `block_span: u32` - Function-block reach past a position start (default: 2)
//! - `nthreads: Option<usize>` - Number of threads (default: all cores)
//! - `profile: bool` - Print tracing span timings to stderr
//!
//! ## Validation
//! - Ensure input files exist
//! - Ensure `block_span > 0`
//!
//! ## Example CLI
//! ```bash
//! recomposer --vcf phased.vcf.gz --ref genome.fa --out recomposed.vcf.gz --nthreads 8
//! ```

use std::path::PathBuf;

use clap::Parser;

use crate::error::{RecomposeError, Result};
use crate::io::window::DEFAULT_BLOCK_SPAN;

/// Recompose phased SNVs and short indels into multi-nucleotide variants
#[derive(Parser, Debug, Clone)]
#[command(name = "recomposer", version, about)]
pub struct Config {
    /// Phased input VCF
    #[arg(long)]
    pub vcf: PathBuf,

    /// Reference FASTA
    #[arg(long = "ref")]
    pub r#ref: PathBuf,

    /// Output VCF
    #[arg(long)]
    pub out: PathBuf,

    /// Write original allele -> recomposed allele links as TSV
    #[arg(long)]
    pub links: Option<PathBuf>,

    /// Bases past a position start that it may be merged with
    #[arg(long, default_value_t = DEFAULT_BLOCK_SPAN)]
    pub block_span: u32,

    /// Number of threads (default: all cores)
    #[arg(long)]
    pub nthreads: Option<usize>,

    /// Print per-stage span timings
    #[arg(long)]
    pub profile: bool,
}

impl Config {
    /// Parse the command line and validate it
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check values clap cannot check on its own
    pub fn validate(&self) -> Result<()> {
        for path in [&self.vcf, &self.r#ref] {
            if !path.exists() {
                return Err(RecomposeError::FileNotFound { path: path.clone() });
            }
        }
        if self.block_span == 0 {
            return Err(RecomposeError::config("--block-span must be at least 1"));
        }
        if self.nthreads == Some(0) {
            return Err(RecomposeError::config("--nthreads must be at least 1"));
        }
        Ok(())
    }

    /// Worker threads to use
    pub fn nthreads(&self) -> usize {
        self.nthreads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("recomposer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--vcf", "in.vcf", "--ref", "ref.fa", "--out", "out.vcf"]);
        assert_eq!(config.block_span, DEFAULT_BLOCK_SPAN);
        assert!(config.links.is_none());
        assert!(!config.profile);
        assert!(config.nthreads() >= 1);
    }

    #[test]
    fn test_explicit_options() {
        let config = parse(&[
            "--vcf", "in.vcf", "--ref", "ref.fa", "--out", "out.vcf.gz",
            "--links", "links.tsv", "--block-span", "5", "--nthreads", "3", "--profile",
        ]);
        assert_eq!(config.block_span, 5);
        assert_eq!(config.nthreads(), 3);
        assert_eq!(config.links, Some(PathBuf::from("links.tsv")));
        assert!(config.profile);
    }

    #[test]
    fn test_missing_required() {
        assert!(Config::try_parse_from(["recomposer", "--vcf", "in.vcf"]).is_err());
    }

    #[test]
    fn test_validate() {
        let dir = tempfile::tempdir().unwrap();
        let vcf = dir.path().join("in.vcf");
        let fasta = dir.path().join("ref.fa");
        std::fs::write(&vcf, "").unwrap();
        std::fs::write(&fasta, "").unwrap();

        let mut config = parse(&[
            "--vcf", vcf.to_str().unwrap(),
            "--ref", fasta.to_str().unwrap(),
            "--out", "out.vcf",
        ]);
        assert!(config.validate().is_ok());

        config.block_span = 0;
        assert!(matches!(config.validate(), Err(RecomposeError::Config { .. })));

        config.block_span = 2;
        config.r#ref = dir.path().join("missing.fa");
        assert!(matches!(config.validate(), Err(RecomposeError::FileNotFound { .. })));
    }
}
