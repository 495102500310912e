use std::io::BufRead;
use std::path::Path;

use crate::io::{data_lines, get_reader, parse_field, split_fields};
use crate::types::{CodingRegion, CodingRegions, RibostallError};

/// Reads a `transcript<TAB>start<TAB>stop` coding-region table.
///
/// # Errors
///
/// I/O or parse errors, a duplicated transcript, or
/// [`RibostallError::InvalidCodingRegion`] for a region with `stop <= start`.
pub fn read_coding_regions(path: &Path) -> Result<CodingRegions, RibostallError> {
    parse_coding_regions(get_reader(path)?)
}

/// # Errors
///
/// Same as [`read_coding_regions`].
pub fn parse_coding_regions<R: BufRead>(reader: R) -> Result<CodingRegions, RibostallError> {
    let mut regions = CodingRegions::new();
    for line in data_lines(reader) {
        let (number, line) = line?;
        let fields = split_fields(&line, 3, number)?;
        let start = parse_field(fields[1], "start", number)?;
        let stop = parse_field(fields[2], "stop", number)?;
        let region = CodingRegion::new(start, stop)?;

        if regions.insert(fields[0].to_string(), region).is_some() {
            return Err(RibostallError::ParseError(format!(
                "line {number}: duplicate transcript {}",
                fields[0]
            )));
        }
    }
    Ok(regions)
}
