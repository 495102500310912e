use std::io::Write;

use crate::coverage::occupancy::CodonOccupancy;
use crate::types::RibostallError;

/// Codon, transcriptome count, then one occupancy column per experiment.
pub fn write_occupancy_table<W: Write>(
    writer: &mut W,
    occupancy: &CodonOccupancy,
) -> Result<(), RibostallError> {
    write!(writer, "codon\ttranscriptome")?;
    for experiment in &occupancy.experiments {
        write!(writer, "\t{experiment}")?;
    }
    writeln!(writer)?;

    for codon in occupancy.codons() {
        let transcriptome = occupancy.transcriptome.get(codon).copied().unwrap_or(0);
        write!(writer, "{codon}\t{transcriptome}")?;
        for experiment in &occupancy.experiments {
            write!(writer, "\t{}", occupancy.get(experiment, codon))?;
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

    #[test]
    fn test_occupancy_columns() {
        let occupancy = CodonOccupancy {
            experiments: vec!["a".to_string(), "b".to_string()],
            transcriptome: BTreeMap::from([("ATG".to_string(), 3)]),
            occupancy: BTreeMap::from([
                ("a".to_string(), BTreeMap::from([("ATG".to_string(), 10)])),
                ("b".to_string(), BTreeMap::from([("TAA".to_string(), 4)])),
            ]),
        };
        let mut buffer = Cursor::new(Vec::new());
        write_occupancy_table(&mut buffer, &occupancy).unwrap();
        let output = String::from_utf8(buffer.into_inner()).unwrap();

        assert_eq!(
            output,
            "codon\ttranscriptome\ta\tb\nATG\t3\t10\t0\nTAA\t0\t0\t4\n"
        );
    }
}
