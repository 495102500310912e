use std::io::BufRead;
use std::path::Path;

use log::{info, warn};

use crate::dataset::InMemoryDataset;
use crate::io::{data_lines, get_reader, parse_counts, parse_field, split_fields};
use crate::types::{CodingRegions, RibostallError};

/// Loads an `experiment<TAB>transcript<TAB>read_length<TAB>counts` table,
/// counts comma separated, into a dataset over `regions`.
///
/// Rows of transcripts without a coding region are dropped. The returned
/// dataset is read-only once loaded; wrap it in an `Arc` and hand out clones
/// of the `Arc` as per-worker handles.
///
/// # Errors
///
/// I/O or parse errors.
pub fn read_raw_coverage(
    path: &Path,
    regions: &CodingRegions,
) -> Result<InMemoryDataset, RibostallError> {
    let dataset = parse_raw_coverage(get_reader(path)?, regions)?;
    info!("Loaded raw coverage from {}", path.display());
    Ok(dataset)
}

/// # Errors
///
/// Same as [`read_raw_coverage`].
pub fn parse_raw_coverage<R: BufRead>(
    reader: R,
    regions: &CodingRegions,
) -> Result<InMemoryDataset, RibostallError> {
    let mut dataset = InMemoryDataset::new();
    for (transcript, region) in regions {
        dataset.add_transcript(transcript.clone(), *region);
    }

    let mut unannotated = 0usize;
    for line in data_lines(reader) {
        let (number, line) = line?;
        let fields = split_fields(&line, 4, number)?;
        let (experiment, transcript) = (fields[0], fields[1]);
        let read_length: u32 = parse_field(fields[2], "read length", number)?;
        let counts: Vec<u32> = parse_counts(fields[3], number)?;

        dataset.add_experiment(experiment);
        if !regions.contains_key(transcript) {
            unannotated += 1;
            continue;
        }
        dataset.add_coverage(transcript, experiment, read_length, counts);
    }

    if unannotated > 0 {
        warn!("Ignored {unannotated} raw coverage rows of transcripts without a coding region");
    }
    Ok(dataset)
}
