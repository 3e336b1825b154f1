//! # Recomposition Pipeline
//!
//! ## Role
//! Drive a whole run from the CLI: read the phased VCF and the FASTA, derive
//! function blocks, recompose every chromosome and write the originals plus
//! the recomposed records, optionally with the link-back table.

use std::fs::File;
use std::io::{BufWriter, Write};

use crate::config::Config;
use crate::data::position::SimplePosition;
use crate::error::Result;
use crate::io::fasta::read_fasta;
use crate::io::vcf::{VcfReader, VcfWriter};
use crate::io::window::FunctionBlockBuilder;
use crate::pipelines::recompose::{ChromosomeBatch, Diagnostic, LinkedVids, Recomposer};

/// Counts reported at the end of a run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub n_chromosomes: usize,
    pub n_positions: usize,
    pub n_recomposed: usize,
    pub n_skipped: usize,
    pub n_abandoned_groups: usize,
}

/// End-to-end recomposition of one VCF
pub struct RecomposePipeline {
    config: Config,
}

impl RecomposePipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the pipeline
    pub fn run(&mut self) -> Result<RunSummary> {
        eprintln!("Loading reference...");
        let reference = read_fasta(&self.config.r#ref)?;

        eprintln!("Loading VCF...");
        let mut reader = VcfReader::open(&self.config.vcf)?;
        let chromosomes = reader.read_chromosomes()?;

        let blocks = FunctionBlockBuilder::new().span(self.config.block_span);
        let batches: Vec<ChromosomeBatch> = chromosomes
            .into_iter()
            .map(|(_, positions)| blocks.batch(positions))
            .collect();

        let mut summary = RunSummary {
            n_chromosomes: batches.len(),
            n_positions: batches.iter().map(|b| b.positions.len()).sum(),
            ..Default::default()
        };
        eprintln!(
            "Recomposing {} positions on {} chromosomes...",
            summary.n_positions, summary.n_chromosomes
        );

        let recomposer = Recomposer::new(&reference);
        let results = recomposer.recompose_chromosomes(&batches);

        let mut writer = VcfWriter::create(&self.config.out, reader.samples_arc())?;
        writer.write_header(reader.meta_lines())?;
        let mut links_writer = match &self.config.links {
            Some(path) => {
                let mut w = BufWriter::new(File::create(path)?);
                writeln!(w, "#original\trecomposed")?;
                Some(w)
            }
            None => None,
        };

        for (batch, result) in batches.iter().zip(results) {
            let recomposition = result?;
            for diagnostic in &recomposition.diagnostics {
                match diagnostic {
                    Diagnostic::SkippedPosition { .. } => summary.n_skipped += 1,
                    Diagnostic::AbandonedGroup { .. } => summary.n_abandoned_groups += 1,
                }
            }
            summary.n_recomposed += recomposition.variants.len();

            writer.write_chromosome(&batch.positions, &recomposition.variants)?;
            if let Some(w) = links_writer.as_mut() {
                write_links(w, &batch.positions, &recomposition.links)?;
            }
        }

        writer.flush()?;
        if let Some(mut w) = links_writer {
            w.flush()?;
        }

        eprintln!("Wrote {} records to {:?}", writer.n_records(), self.config.out);
        eprintln!(
            "Recomposed: {}  Skipped positions: {}  Abandoned groups: {}",
            summary.n_recomposed, summary.n_skipped, summary.n_abandoned_groups
        );
        Ok(summary)
    }
}

/// One line per linked original allele: its id, then the recomposed ids
pub fn write_links<W: Write>(writer: &mut W, positions: &[SimplePosition], links: &LinkedVids) -> Result<()> {
    for (index, alleles) in links.iter() {
        let position = &positions[index];
        for (alt_index, vids) in alleles.iter().enumerate() {
            if vids.is_empty() {
                continue;
            }
            let Some(original) = position.vid(alt_index) else {
                continue;
            };
            let joined: Vec<&str> = vids.iter().map(|v| v.as_str()).collect();
            writeln!(writer, "{}\t{}", original, joined.join(","))?;
        }
    }
    Ok(())
}
