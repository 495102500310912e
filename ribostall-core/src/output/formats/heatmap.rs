use std::io::Write;

use crate::constants::WINDOW_CODONS;
use crate::heatmap::{BackgroundCodonFrequency, NormalizedHeatmap, RawHeatmap, relative_position};
use crate::types::RibostallError;

fn write_position_header<W: Write>(writer: &mut W) -> Result<(), RibostallError> {
    write!(writer, "codon")?;
    for column in 0..WINDOW_CODONS {
        write!(writer, "\t{}", relative_position(column))?;
    }
    Ok(())
}

/// Raw heatmap with a trailing transcriptome count column, codons ascending.
///
/// Rows cover every codon of the heatmap or the background.
pub fn write_raw_heatmap_table<W: Write>(
    writer: &mut W,
    raw: &RawHeatmap,
    background: &BackgroundCodonFrequency,
) -> Result<(), RibostallError> {
    write_position_header(writer)?;
    writeln!(writer, "\ttranscriptome")?;

    let mut codons: Vec<&str> = raw.codons().chain(background.codons()).collect();
    codons.sort_unstable();
    codons.dedup();

    for codon in codons {
        let row = raw.row(codon).copied().unwrap_or([0; WINDOW_CODONS]);
        write!(writer, "{codon}")?;
        for count in row {
            write!(writer, "\t{count}")?;
        }
        writeln!(writer, "\t{}", background.count(codon))?;
    }
    Ok(())
}

/// Normalized heatmap, codons descending.
pub fn write_normalized_heatmap_table<W: Write>(
    writer: &mut W,
    normalized: &NormalizedHeatmap,
) -> Result<(), RibostallError> {
    write_position_header(writer)?;
    writeln!(writer)?;

    let mut rows: Vec<_> = normalized.rows().collect();
    rows.sort_unstable_by(|a, b| b.0.cmp(a.0));
    for (codon, scores) in rows {
        write!(writer, "{codon}")?;
        for score in scores {
            write!(writer, "\t{score:.6}")?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Cursor;

    use super::*;
    use crate::heatmap::{StallSite, normalize_heatmap};

    fn raw() -> RawHeatmap {
        let mut codons = vec!["GCT".to_string(); WINDOW_CODONS];
        codons[5] = "CCG".to_string();
        RawHeatmap::from_sites(&[StallSite {
            transcript: "t".to_string(),
            position: 48,
            codons,
        }])
        .unwrap()
    }

    fn background() -> BackgroundCodonFrequency {
        BackgroundCodonFrequency::from_counts(BTreeMap::from([
            ("AAA".to_string(), 2),
            ("GCT".to_string(), 8),
        ]))
    }

    #[test]
    fn test_raw_table_has_transcriptome_column() {
        let mut buffer = Cursor::new(Vec::new());
        write_raw_heatmap_table(&mut buffer, &raw(), &background()).unwrap();
        let output = String::from_utf8(buffer.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(
            lines[0],
            "codon\t-5\t-4\t-3\t-2\t-1\t0\t1\t2\t3\t4\t5\ttranscriptome"
        );
        assert_eq!(lines[1], "AAA\t0\t0\t0\t0\t0\t0\t0\t0\t0\t0\t0\t2");
        assert_eq!(lines[2], "CCG\t0\t0\t0\t0\t0\t1\t0\t0\t0\t0\t0\t0");
        assert_eq!(lines[3], "GCT\t1\t1\t1\t1\t1\t0\t1\t1\t1\t1\t1\t8");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_normalized_table_descending() {
        let normalized = normalize_heatmap(&raw(), &background());
        let mut buffer = Cursor::new(Vec::new());
        write_normalized_heatmap_table(&mut buffer, &normalized).unwrap();
        let output = String::from_utf8(buffer.into_inner()).unwrap();

        let codons: Vec<&str> = output
            .lines()
            .skip(1)
            .filter_map(|line| line.split('\t').next())
            .collect();
        assert_eq!(codons, vec!["GCT", "CCG", "AAA"]);
        assert!(output.contains("CCG\t0.000000\t0.000000\t0.000000\t0.000000\t0.000000\t1.000000"));
    }
}
