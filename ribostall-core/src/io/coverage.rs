//! Persistence of the [`CoverageMap`] as a four-column table:
//! `experiment<TAB>transcript<TAB>status<TAB>values`, where status is `ok`
//! with comma-separated coverage or `failed` with the failure reason.

use std::fs::File;
use std::io::{BufRead, BufWriter, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use log::info;

use crate::io::{data_lines, get_reader, is_gzipped, parse_counts, split_fields};
use crate::types::{
    AdjustedCoverage, CoverageMap, CoverageRecord, ExperimentCoverage, RibostallError,
};

const STATUS_OK: &str = "ok";
const STATUS_FAILED: &str = "failed";

/// Writes a coverage map as a table.
///
/// # Errors
///
/// Returns [`RibostallError::IoError`] if writing fails.
pub fn write_coverage_map<W: Write>(
    writer: &mut W,
    coverage: &CoverageMap,
) -> Result<(), RibostallError> {
    writeln!(writer, "#experiment\ttranscript\tstatus\tvalues")?;
    for (experiment, records) in coverage {
        for (transcript, record) in &records.records {
            match record {
                CoverageRecord::Computed(values) => {
                    let joined = values
                        .values()
                        .iter()
                        .map(u64::to_string)
                        .collect::<Vec<_>>()
                        .join(",");
                    writeln!(writer, "{experiment}\t{transcript}\t{STATUS_OK}\t{joined}")?;
                }
                CoverageRecord::Failed { reason } => {
                    let reason = reason.replace(['\t', '\n', '\r'], " ");
                    writeln!(writer, "{experiment}\t{transcript}\t{STATUS_FAILED}\t{reason}")?;
                }
            }
        }
    }
    Ok(())
}

/// Reads a table written by [`write_coverage_map`].
///
/// # Errors
///
/// I/O errors, or [`RibostallError::ParseError`] for malformed rows.
pub fn read_coverage_map<R: BufRead>(reader: R) -> Result<CoverageMap, RibostallError> {
    let mut coverage = CoverageMap::new();
    for line in data_lines(reader) {
        let (number, line) = line?;
        let fields = split_fields(&line, 4, number)?;
        let (experiment, transcript) = (fields[0], fields[1]);

        let record = match fields[2] {
            STATUS_OK => {
                CoverageRecord::Computed(AdjustedCoverage::new(parse_counts(fields[3], number)?))
            }
            STATUS_FAILED => CoverageRecord::failed(fields[3]),
            other => {
                return Err(RibostallError::ParseError(format!(
                    "line {number}: unknown status {other:?}"
                )));
            }
        };

        coverage
            .entry(experiment.to_string())
            .or_insert_with(|| ExperimentCoverage::new(experiment))
            .insert(transcript, record);
    }
    Ok(coverage)
}

/// Saves a coverage map, gzip-compressed when `path` ends in `.gz`.
///
/// # Errors
///
/// Returns [`RibostallError::IoError`] if the file cannot be written.
pub fn save_coverage_map(path: &Path, coverage: &CoverageMap) -> Result<(), RibostallError> {
    let file = BufWriter::new(File::create(path)?);
    if is_gzipped(path) {
        let mut encoder = GzEncoder::new(file, Compression::default());
        write_coverage_map(&mut encoder, coverage)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = file;
        write_coverage_map(&mut writer, coverage)?;
        writer.flush()?;
    }
    info!("Saved coverage of {} experiments to {}", coverage.len(), path.display());
    Ok(())
}

/// Loads a coverage map saved by [`save_coverage_map`].
///
/// # Errors
///
/// Same as [`read_coverage_map`].
pub fn load_coverage_map(path: &Path) -> Result<CoverageMap, RibostallError> {
    read_coverage_map(get_reader(path)?)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use tempfile::tempdir;

    use super::*;

    fn sample() -> CoverageMap {
        let mut exp = ExperimentCoverage::new("exp1");
        exp.insert("tx1", CoverageRecord::Computed(vec![0, 4, 2].into()));
        exp.insert("tx2", CoverageRecord::failed("Offset 12 exceeds\tcoding start 4"));
        CoverageMap::from([("exp1".to_string(), exp)])
    }

    #[test]
    fn test_written_table_layout() {
        let mut buffer = Vec::new();
        write_coverage_map(&mut buffer, &sample()).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "exp1\ttx1\tok\t0,4,2");
        assert_eq!(lines[2], "exp1\ttx2\tfailed\tOffset 12 exceeds coding start 4");
    }

    #[test]
    fn test_gzip_file_keeps_failure_markers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coverage.tsv.gz");
        save_coverage_map(&path, &sample()).unwrap();

        let loaded = load_coverage_map(&path).unwrap();
        let exp = &loaded["exp1"];
        assert_eq!(exp.get("tx1").unwrap().values(), &[0, 4, 2]);
        assert!(exp.records["tx2"].is_failed());
    }

    #[test]
    fn test_unknown_status() {
        assert!(matches!(
            read_coverage_map(Cursor::new("exp1\ttx1\tmaybe\t1\n")),
            Err(RibostallError::ParseError(_))
        ));
    }
}
