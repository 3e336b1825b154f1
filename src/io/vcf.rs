//! # VCF Reading and Writing
//!
//! Line-level VCF I/O for the recomposition pipeline. Records are read into
//! `SimplePosition`s one chromosome at a time; original records are written
//! back unchanged, interleaved with recomposed ones.
//! Uses the `noodles` crate for header parsing and BGZF.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use noodles::bgzf;
use noodles::vcf::Header;
use tracing::info_span;

use crate::data::haplotype::Samples;
use crate::data::position::{Filter, NumericField, SimplePosition, FILTER_RECOMPOSED_FAILURE, MISSING};
use crate::error::{RecomposeError, Result};
use crate::model::generator::RecomposedVariant;

const RECOMPOSED_INFO_LINE: &str =
    "##INFO=<ID=RECOMPOSED,Number=0,Type=Flag,Description=\"Allele recomposed from phased small variants\">";
const RECOMPOSED_FILTER_LINE: &str =
    "##FILTER=<ID=FilteredVariantsRecomposed,Description=\"Recomposed from at least one variant that failed filters\">";

fn is_gzipped(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "gz" || e == "bgz")
        .unwrap_or(false)
}

/// VCF file reader
pub struct VcfReader {
    /// Sample information
    samples: Arc<Samples>,
    /// `##` meta lines, without line endings
    meta_lines: Vec<String>,
    reader: Box<dyn BufRead + Send>,
    line_num: usize,
    /// First record of the next chromosome
    pending: Option<SimplePosition>,
    /// Chromosomes already returned
    seen_chroms: Vec<String>,
}

impl VcfReader {
    /// Open a VCF file and read the header
    pub fn open(path: &Path) -> Result<Self> {
        info_span!("vcf_open", path = ?path).in_scope(|| {
            if !path.exists() {
                return Err(RecomposeError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            let file = File::open(path)?;

            let reader: Box<dyn BufRead + Send> = if is_gzipped(path) {
                Box::new(BufReader::new(bgzf::Reader::new(file)))
            } else {
                Box::new(BufReader::new(file))
            };

            Self::from_reader(reader)
        })
    }

    /// Create from a reader positioned at the start of the header
    pub fn from_reader(mut reader: Box<dyn BufRead + Send>) -> Result<Self> {
        let mut header_str = String::new();
        let mut meta_lines = Vec::new();
        let mut line_num = 0usize;
        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line)?;
            if bytes_read == 0 {
                break;
            }
            line_num += 1;
            if !line.starts_with('#') {
                return Err(RecomposeError::parse(line_num, "record before #CHROM header line"));
            }
            header_str.push_str(&line);
            if line.starts_with("#CHROM") {
                break;
            }
            meta_lines.push(line.trim_end().to_string());
        }

        let header: Header = header_str.parse()?;

        let sample_names: Vec<String> = header
            .sample_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        Ok(Self {
            samples: Arc::new(Samples::from_ids(sample_names)),
            meta_lines,
            reader,
            line_num,
            pending: None,
            seen_chroms: Vec::new(),
        })
    }

    /// Get samples Arc
    pub fn samples_arc(&self) -> Arc<Samples> {
        Arc::clone(&self.samples)
    }

    pub fn meta_lines(&self) -> &[String] {
        &self.meta_lines
    }

    fn next_position(&mut self) -> Result<Option<SimplePosition>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_num += 1;
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let position = parse_position_line(trimmed, self.line_num)?;
            if position.n_samples() != self.samples.len() {
                return Err(RecomposeError::parse(
                    self.line_num,
                    format!(
                        "expected {} sample columns, found {}",
                        self.samples.len(),
                        position.n_samples()
                    ),
                ));
            }
            return Ok(Some(position));
        }
    }

    /// Next run of records sharing a chromosome
    pub fn next_chromosome(&mut self) -> Result<Option<(String, Vec<SimplePosition>)>> {
        let first = match self.pending.take() {
            Some(position) => position,
            None => match self.next_position()? {
                Some(position) => position,
                None => return Ok(None),
            },
        };
        let chrom = first.chrom.clone();
        if self.seen_chroms.contains(&chrom) {
            return Err(RecomposeError::vcf(format!(
                "records of {} are not contiguous (line {})",
                chrom, self.line_num
            )));
        }
        self.seen_chroms.push(chrom.clone());

        let mut positions = vec![first];
        while let Some(position) = self.next_position()? {
            if position.chrom != chrom {
                self.pending = Some(position);
                break;
            }
            positions.push(position);
        }
        Ok(Some((chrom, positions)))
    }

    /// Read all records grouped by chromosome, in file order
    pub fn read_chromosomes(&mut self) -> Result<Vec<(String, Vec<SimplePosition>)>> {
        info_span!("vcf_read").in_scope(|| {
            let mut chromosomes = Vec::new();
            while let Some(batch) = self.next_chromosome()? {
                chromosomes.push(batch);
            }
            Ok(chromosomes)
        })
    }
}

/// Parse one tab-separated data line
pub fn parse_position_line(line: &str, line_num: usize) -> Result<SimplePosition> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 8 {
        return Err(RecomposeError::parse(
            line_num,
            format!("expected at least 8 columns, found {}", fields.len()),
        ));
    }

    let start: u32 = fields[1]
        .parse()
        .map_err(|_| RecomposeError::parse(line_num, format!("invalid POS '{}'", fields[1])))?;
    let alt_alleles = if fields[4] == MISSING {
        Vec::new()
    } else {
        fields[4].split(',').map(|a| a.to_string()).collect()
    };

    let mut position = SimplePosition::new(fields[0], start, fields[3], alt_alleles)
        .with_quality(NumericField::parse(fields[5]))
        .with_filter(Filter::parse(fields[6]));
    if fields[2] != MISSING {
        position.id = Some(fields[2].to_string());
    }
    position.info = fields[7].to_string();
    if let Some(format) = fields.get(8) {
        position.format = format.split(':').map(|k| k.to_string()).collect();
        position.samples = fields[9..].iter().map(|s| s.to_string()).collect();
    }
    Ok(position)
}

/// VCF columns of a position
pub fn record_fields(position: &SimplePosition) -> Vec<String> {
    let mut fields = vec![
        position.chrom.clone(),
        position.start.to_string(),
        position.id.clone().unwrap_or_else(|| MISSING.to_string()),
        position.ref_allele.clone(),
        if position.alt_alleles.is_empty() {
            MISSING.to_string()
        } else {
            position.alt_alleles.join(",")
        },
        position
            .quality
            .as_ref()
            .map(|q| q.to_string())
            .unwrap_or_else(|| MISSING.to_string()),
        position.filter.to_string(),
        position.info.clone(),
    ];
    if !position.format.is_empty() {
        fields.push(position.format.join(":"));
        fields.extend(position.samples.iter().cloned());
    }
    fields
}

/// One tab-separated data line (no line ending)
pub fn format_record(position: &SimplePosition) -> String {
    record_fields(position).join("\t")
}

/// VCF file writer
pub struct VcfWriter {
    writer: Box<dyn Write + Send>,
    samples: Arc<Samples>,
    n_records: usize,
}

impl VcfWriter {
    /// Create a new VCF writer
    pub fn create(path: &Path, samples: Arc<Samples>) -> Result<Self> {
        let file = File::create(path)?;

        let writer: Box<dyn Write + Send> = if is_gzipped(path) {
            Box::new(BufWriter::new(bgzf::Writer::new(file)))
        } else {
            Box::new(BufWriter::new(file))
        };

        Ok(Self::from_writer(writer, samples))
    }

    pub fn from_writer(writer: Box<dyn Write + Send>, samples: Arc<Samples>) -> Self {
        Self {
            writer,
            samples,
            n_records: 0,
        }
    }

    /// Write the input meta lines plus the recomposition INFO/FILTER lines
    pub fn write_header(&mut self, meta_lines: &[String]) -> Result<()> {
        let has_fileformat = meta_lines.iter().any(|l| l.starts_with("##fileformat"));
        if !has_fileformat {
            writeln!(self.writer, "##fileformat=VCFv4.2")?;
        }
        for line in meta_lines {
            writeln!(self.writer, "{}", line)?;
        }
        if !meta_lines.iter().any(|l| l.starts_with("##INFO=<ID=RECOMPOSED,")) {
            writeln!(self.writer, "{}", RECOMPOSED_INFO_LINE)?;
        }
        let filter_prefix = format!("##FILTER=<ID={},", FILTER_RECOMPOSED_FAILURE);
        if !meta_lines.iter().any(|l| l.starts_with(&filter_prefix)) {
            writeln!(self.writer, "{}", RECOMPOSED_FILTER_LINE)?;
        }

        write!(self.writer, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO")?;
        if !self.samples.is_empty() {
            write!(self.writer, "\tFORMAT")?;
            for sample in self.samples.ids() {
                write!(self.writer, "\t{}", sample)?;
            }
        }
        writeln!(self.writer)?;
        Ok(())
    }

    pub fn write_position(&mut self, position: &SimplePosition) -> Result<()> {
        writeln!(self.writer, "{}", format_record(position))?;
        self.n_records += 1;
        Ok(())
    }

    pub fn write_variant(&mut self, variant: &RecomposedVariant) -> Result<()> {
        writeln!(self.writer, "{}", variant)?;
        self.n_records += 1;
        Ok(())
    }

    /// Originals and recomposed records in start order; originals first on ties
    pub fn write_chromosome(
        &mut self,
        positions: &[SimplePosition],
        variants: &[RecomposedVariant],
    ) -> Result<()> {
        info_span!("vcf_write", n_positions = positions.len(), n_variants = variants.len()).in_scope(|| {
            let mut recomposed = variants.iter().peekable();
            for position in positions {
                while let Some(variant) = recomposed.next_if(|v| v.start < position.start) {
                    self.write_variant(variant)?;
                }
                self.write_position(position)?;
            }
            for variant in recomposed {
                self.write_variant(variant)?;
            }
            Ok(())
        })
    }

    /// Records written so far
    pub fn n_records(&self) -> usize {
        self.n_records
    }

    /// Flush the writer
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for VcfWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
