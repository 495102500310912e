use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::path::Path;

use crate::io::{data_lines, get_reader, parse_field, split_fields};
use crate::types::{OffsetTable, RibostallError};

/// Reads an `experiment<TAB>read_length<TAB>offset` table into one
/// [`OffsetTable`] per experiment covering `[min_len, max_len]`.
///
/// Lengths outside the range are ignored.
///
/// # Errors
///
/// I/O or parse errors, a duplicated `(experiment, read_length)` pair, or the
/// configuration errors of [`OffsetTable::new`].
pub fn read_offsets(
    path: &Path,
    min_len: u32,
    max_len: u32,
) -> Result<HashMap<String, OffsetTable>, RibostallError> {
    parse_offsets(get_reader(path)?, min_len, max_len)
}

/// # Errors
///
/// Same as [`read_offsets`].
pub fn parse_offsets<R: BufRead>(
    reader: R,
    min_len: u32,
    max_len: u32,
) -> Result<HashMap<String, OffsetTable>, RibostallError> {
    let mut by_experiment: BTreeMap<String, BTreeMap<u32, usize>> = BTreeMap::new();
    for line in data_lines(reader) {
        let (number, line) = line?;
        let fields = split_fields(&line, 3, number)?;
        let read_length: u32 = parse_field(fields[1], "read length", number)?;
        let offset: usize = parse_field(fields[2], "offset", number)?;

        let lengths = by_experiment.entry(fields[0].to_string()).or_default();
        if lengths.insert(read_length, offset).is_some() {
            return Err(RibostallError::ParseError(format!(
                "line {number}: duplicate offset for {} at read length {read_length}",
                fields[0]
            )));
        }
    }

    by_experiment
        .into_iter()
        .map(|(experiment, lengths)| {
            OffsetTable::new(min_len, max_len, &lengths).map(|table| (experiment, table))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    const TABLE_EXP1: &str = "\
exp1\t25\t12
exp1\t26\t12
exp1\t27\t13
exp1\t40\t99
";

    fn table() -> String {
        format!("{TABLE_EXP1}exp2\t26\t11\n")
    }

    #[test]
    fn test_parse_offsets_restricts_range() {
        let tables = parse_offsets(Cursor::new(TABLE_EXP1), 25, 27).unwrap();
        let exp1 = &tables["exp1"];
        assert_eq!(exp1.min_len(), 25);
        assert_eq!(exp1.max_len(), 27);
        assert_eq!(exp1.max_offset(), 13);
    }

    #[test]
    fn test_missing_length_is_configuration_error() {
        // exp2 only has length 26
        let err = parse_offsets(Cursor::new(table()), 25, 27).unwrap_err();
        assert!(matches!(err, RibostallError::MissingOffset(25)));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_length() {
        assert!(matches!(
            parse_offsets(Cursor::new("exp1\t25\t12\nexp1\t25\t13\n"), 25, 25),
            Err(RibostallError::ParseError(_))
        ));
    }
}
