//! File-backed collaborators: reference FASTA, CDS table, offset table, raw
//! coverage table, and the persisted coverage map.
//!
//! All tables are tab separated. Blank lines and lines starting with `#` are
//! ignored. Paths ending in `.gz` are read and written gzip-compressed.

pub mod annotation;
pub mod coverage;
pub mod fasta;
pub mod offsets;
pub mod raw;

use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use flate2::read::MultiGzDecoder;

use crate::types::RibostallError;

pub use annotation::read_coding_regions;
pub use coverage::{load_coverage_map, save_coverage_map};
pub use fasta::{IdentifierStyle, ReferenceSequences};
pub use offsets::read_offsets;
pub use raw::read_raw_coverage;

pub(crate) fn is_gzipped(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Opens a plain or gzip-compressed file for buffered reading.
///
/// # Errors
///
/// Returns [`RibostallError::IoError`] if the file cannot be opened.
pub fn get_reader(path: &Path) -> Result<Box<dyn BufRead>, RibostallError> {
    let file = File::open(path)?;
    if is_gzipped(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Numbered data lines of a table, skipping blanks and `#` comments.
pub(crate) fn data_lines<R: BufRead>(
    reader: R,
) -> impl Iterator<Item = Result<(usize, String), RibostallError>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match line {
            Ok(line) => {
                let trimmed = line.trim_end_matches(['\r', '\n']);
                if trimmed.trim().is_empty() || trimmed.starts_with('#') {
                    None
                } else {
                    Some(Ok((index + 1, trimmed.to_string())))
                }
            }
            Err(e) => Some(Err(e.into())),
        })
}

/// Splits a line into exactly `expected` tab-separated fields.
pub(crate) fn split_fields(
    line: &str,
    expected: usize,
    line_number: usize,
) -> Result<Vec<&str>, RibostallError> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() != expected {
        return Err(RibostallError::ParseError(format!(
            "line {line_number}: expected {expected} tab-separated fields, found {}",
            fields.len()
        )));
    }
    Ok(fields)
}

pub(crate) fn parse_field<T>(
    value: &str,
    name: &str,
    line_number: usize,
) -> Result<T, RibostallError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e| {
        RibostallError::ParseError(format!("line {line_number}: invalid {name} {value:?}: {e}"))
    })
}

/// Parses a comma-separated list of counts.
pub(crate) fn parse_counts<T>(value: &str, line_number: usize) -> Result<Vec<T>, RibostallError>
where
    T: FromStr,
    T::Err: Display,
{
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|count| parse_field(count, "count", line_number))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_data_lines_skip_comments_and_blanks() {
        let input = "# header\n\na\tb\r\n  \nc\td\n";
        let lines: Vec<(usize, String)> = data_lines(Cursor::new(input))
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(lines, vec![(3, "a\tb".to_string()), (5, "c\td".to_string())]);
    }

    #[test]
    fn test_split_fields_count() {
        assert_eq!(split_fields("a\tb\tc", 3, 1).unwrap(), vec!["a", "b", "c"]);
        let err = split_fields("a\tb", 3, 7).unwrap_err();
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn test_parse_counts() {
        assert_eq!(parse_counts::<u32>("1,0,3", 1).unwrap(), vec![1, 0, 3]);
        assert!(parse_counts::<u32>("", 1).unwrap().is_empty());
        assert!(matches!(
            parse_counts::<u32>("1,x", 2),
            Err(RibostallError::ParseError(_))
        ));
    }

    #[test]
    fn test_get_reader_plain_and_gzip() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("table.tsv");
        std::fs::write(&plain, "x\t1\n").unwrap();

        let gz = dir.path().join("table.tsv.gz");
        let mut encoder = GzEncoder::new(File::create(&gz).unwrap(), Compression::default());
        encoder.write_all(b"x\t1\n").unwrap();
        encoder.finish().unwrap();

        for path in [plain, gz] {
            let mut line = String::new();
            get_reader(&path).unwrap().read_line(&mut line).unwrap();
            assert_eq!(line, "x\t1\n");
        }
        assert!(get_reader(&dir.path().join("missing.tsv")).is_err());
    }
}
