//! # FASTA Reference Loading
//!
//! Loads every sequence of a (optionally gzipped) FASTA file into an
//! `InMemoryReference` through `needletail`, which detects compression itself.
//! The sequence name is the first word of the `>` line.

use std::io::Read;
use std::path::Path;

use needletail::parser::FastxReader;
use needletail::Sequence;
use tracing::info_span;

use crate::data::reference::InMemoryReference;
use crate::error::{RecomposeError, Result};

/// Load a FASTA file
pub fn read_fasta(path: &Path) -> Result<InMemoryReference> {
    if !path.exists() {
        return Err(RecomposeError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    info_span!("fasta_read", path = ?path).in_scope(|| {
        let reader = needletail::parse_fastx_file(path)?;
        collect_sequences(reader)
    })
}

/// Parse FASTA text from any reader
pub fn parse_fasta<R: Read + Send + 'static>(reader: R) -> Result<InMemoryReference> {
    collect_sequences(needletail::parse_fastx_reader(reader)?)
}

fn collect_sequences(mut reader: Box<dyn FastxReader>) -> Result<InMemoryReference> {
    let mut reference = InMemoryReference::new();
    while let Some(record) = reader.next() {
        let record = record?;
        let name = record
            .id()
            .split(|b| b.is_ascii_whitespace())
            .next()
            .unwrap_or_default();
        if name.is_empty() {
            return Err(RecomposeError::fasta("record without a name"));
        }
        let name = String::from_utf8_lossy(name).to_string();
        reference.insert(name, record.normalize(false).as_ref());
    }
    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::reference::ReferenceSequence;
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_fasta_multi_record() {
        let text = ">chr1 test sequence\nCAGC\nTGAA\n>chr2\nacgt\n";
        let reference = parse_fasta(Cursor::new(text)).unwrap();
        assert_eq!(reference.len(), 2);
        assert_eq!(reference.substring("chr1", 3, 4).unwrap(), "GCTG");
        assert_eq!(reference.substring("chr2", 1, 4).unwrap(), "ACGT");
    }

    #[test]
    fn test_parse_fasta_rejects_headerless_sequence() {
        assert!(matches!(
            parse_fasta(Cursor::new("ACGT\n")),
            Err(RecomposeError::Fasta { .. })
        ));
    }

    #[test]
    fn test_read_gzipped_fasta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ref.fa.gz");
        let mut encoder = flate2::write::GzEncoder::new(
            std::fs::File::create(&path).unwrap(),
            flate2::Compression::default(),
        );
        encoder.write_all(b">chr1\nCAGCTGAA\n").unwrap();
        encoder.finish().unwrap();

        let reference = read_fasta(&path).unwrap();
        assert_eq!(reference.substring("1", 2, 3).unwrap(), "AGC");
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            read_fasta(Path::new("/nonexistent/ref.fa")),
            Err(RecomposeError::FileNotFound { .. })
        ));
    }
}
