//! FASTA sequence loading

use crate::types::SequenceRecord;
use anyhow::{bail, Context, Result};
use bio::io::fasta;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Load every record of a FASTA file, in file order.
pub fn load_fasta<P: AsRef<Path>>(path: P) -> Result<Vec<SequenceRecord>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open FASTA file {}", path.display()))?;
    let records = parse_fasta(file)
        .with_context(|| format!("Failed to parse FASTA file {}", path.display()))?;
    debug!(path = %path.display(), count = records.len(), "Loaded sequences");
    Ok(records)
}

/// Parse FASTA records from any reader.
///
/// The ID is the first whitespace-delimited token of the header. Residue
/// lines are concatenated and upper-cased.
pub fn parse_fasta<R: Read>(reader: R) -> Result<Vec<SequenceRecord>> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    for (index, record) in fasta::Reader::new(reader).records().enumerate() {
        let record = record.with_context(|| format!("record {}: malformed FASTA", index + 1))?;
        let id = record.id();
        if id.is_empty() {
            bail!("record {}: header without an identifier", index + 1);
        }
        if !seen.insert(id.to_string()) {
            bail!("record {}: duplicate sequence ID `{}`", index + 1, id);
        }

        let sequence: String = String::from_utf8_lossy(record.seq())
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        records.push(SequenceRecord::new(id, sequence));
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_multiline_records() {
        let input = ">AMP_1 magainin 2\nGIGKFLHSAK\nKFGKAFVGEIMNS\n\n>AMP_2\nklwkkllkll\n";
        let records = parse_fasta(input.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "AMP_1");
        assert_eq!(records[0].sequence, "GIGKFLHSAKKFGKAFVGEIMNS");
        assert_eq!(records[1].id, "AMP_2");
        assert_eq!(records[1].sequence, "KLWKKLLKLL");
    }

    #[test]
    fn test_sequence_before_first_header_is_rejected() {
        assert!(parse_fasta("ACDE\n>s1\nKK\n".as_bytes()).is_err());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let err = parse_fasta(">s1\nKK\n>s1\nRR\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("duplicate sequence ID `s1`"));
    }

    #[test]
    fn test_header_without_identifier_is_rejected() {
        let err = parse_fasta("> no id\nKK\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("without an identifier"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let records = parse_fasta(">s1\r\nkkll\r\nGG\r\n".as_bytes()).unwrap();
        assert_eq!(records, vec![SequenceRecord::new("s1", "KKLLGG")]);
    }

    #[test]
    fn test_empty_input_yields_no_records() {
        assert!(parse_fasta("".as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, ">pep\nGLFDIVKKVVGALGSL\n").unwrap();
        let records = load_fasta(file.path()).unwrap();
        assert_eq!(records[0].sequence, "GLFDIVKKVVGALGSL");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_fasta("/nonexistent/input.fasta").is_err());
    }
}
