//! Tab-separated writers for condition reports and codon occupancy.
//!
//! ## Tables
//!
//! - **Raw heatmap**: codon counts per relative position plus the
//!   transcriptome count, codons ascending
//! - **Normalized heatmap**: enrichment per relative position, codons
//!   descending
//! - **Stall sites**: transcript, 1-based stall position, window codons
//! - **Codon occupancy**: transcriptome count and one column per experiment
//!
//! ## Examples
//!
//! ```rust,no_run
//! use std::fs::File;
//! use ribostall_core::output::{ReportTable, write_report};
//! # use ribostall_core::results::ConditionReport;
//! # fn reports() -> Vec<ConditionReport> { Vec::new() }
//!
//! for report in reports() {
//!     let mut file = File::create(format!("{}_sites.tsv", report.condition))?;
//!     write_report(&mut file, &report, ReportTable::StallSites)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::Write;

use crate::coverage::occupancy::CodonOccupancy;
use crate::results::ConditionReport;
use crate::types::RibostallError;

mod formats {
    pub mod heatmap;
    pub mod occupancy;
    pub mod sites;
}

pub use formats::heatmap::{write_normalized_heatmap_table, write_raw_heatmap_table};
pub use formats::occupancy::write_occupancy_table;
pub use formats::sites::write_stall_sites_table;

/// Tables that can be written for a [`ConditionReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTable {
    RawHeatmap,
    NormalizedHeatmap,
    StallSites,
}

impl ReportTable {
    /// All tables, in the order the CLI writes them.
    pub const ALL: [Self; 3] = [Self::RawHeatmap, Self::NormalizedHeatmap, Self::StallSites];

    /// File name suffix used for this table.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::RawHeatmap => "raw_heatmap.tsv",
            Self::NormalizedHeatmap => "normalized_heatmap.tsv",
            Self::StallSites => "stall_sites.tsv",
        }
    }
}

/// Writes one table of a condition report.
///
/// # Errors
///
/// Returns [`RibostallError::IoError`] if writing fails.
pub fn write_report<W: Write>(
    writer: &mut W,
    report: &ConditionReport,
    table: ReportTable,
) -> Result<(), RibostallError> {
    match table {
        ReportTable::RawHeatmap => write_raw_heatmap_table(writer, &report.raw, &report.background),
        ReportTable::NormalizedHeatmap => {
            write_normalized_heatmap_table(writer, &report.normalized)
        }
        ReportTable::StallSites => write_stall_sites_table(writer, &report.stall_sites),
    }
}

/// Writes a codon occupancy table.
///
/// # Errors
///
/// Returns [`RibostallError::IoError`] if writing fails.
pub fn write_occupancy<W: Write>(
    writer: &mut W,
    occupancy: &CodonOccupancy,
) -> Result<(), RibostallError> {
    write_occupancy_table(writer, occupancy)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Cursor;

    use super::*;
    use crate::heatmap::{BackgroundCodonFrequency, RawHeatmap};

    fn empty_report() -> ConditionReport {
        ConditionReport {
            condition: "ctrl_1".to_string(),
            replicates: vec!["ctrl_1".to_string()],
            stall_masks: BTreeMap::new(),
            stall_sites: Vec::new(),
            raw: RawHeatmap::default(),
            normalized: Default::default(),
            background: BackgroundCodonFrequency::from_counts(BTreeMap::from([(
                "GCT".to_string(),
                4,
            )])),
        }
    }

    #[test]
    fn test_every_table_writes_a_header() {
        let report = empty_report();
        for table in ReportTable::ALL {
            let mut buffer = Cursor::new(Vec::new());
            write_report(&mut buffer, &report, table).unwrap();
            let output = String::from_utf8(buffer.into_inner()).unwrap();
            assert!(output.starts_with("codon") || output.starts_with("transcript"));
        }
    }

    #[test]
    fn test_empty_report_raw_table_lists_background() {
        let mut buffer = Cursor::new(Vec::new());
        write_report(&mut buffer, &empty_report(), ReportTable::RawHeatmap).unwrap();
        let output = String::from_utf8(buffer.into_inner()).unwrap();
        assert!(output.lines().nth(1).unwrap().ends_with("\t4"));
    }

    #[test]
    fn test_table_suffixes_are_distinct() {
        let suffixes: Vec<&str> = ReportTable::ALL.iter().map(|t| t.suffix()).collect();
        assert_eq!(
            suffixes,
            vec!["raw_heatmap.tsv", "normalized_heatmap.tsv", "stall_sites.tsv"]
        );
    }
}
