//! Offset-corrected coverage aggregation.
//!
//! For every read length the raw 5'-end counts are shifted by that length's
//! offset so each read is credited to the nucleotide under the ribosome's
//! active site, sliced to the coding region, and summed across lengths.

pub mod occupancy;
pub mod runner;

use crate::config::OffsetPolicy;
use crate::dataset::CoverageDataset;
use crate::types::{AdjustedCoverage, CodingRegion, OffsetTable, RibostallError};

/// Aggregates raw per-length coverage of single transcripts into
/// [`AdjustedCoverage`] vectors.
///
/// # Examples
///
/// ```rust
/// use ribostall_core::config::OffsetPolicy;
/// use ribostall_core::coverage::CoverageAggregator;
/// use ribostall_core::types::{CodingRegion, OffsetTable};
///
/// let offsets = OffsetTable::from_pairs([(25, 5), (26, 10)])?;
/// let aggregator = CoverageAggregator::new(&offsets, OffsetPolicy::ZeroPad);
/// let region = CodingRegion::new(30, 60)?;
///
/// let coverage = aggregator.aggregate(region, |_| Ok(vec![1; 80]))?;
/// assert_eq!(coverage.len(), 30);
/// assert!(coverage.values().iter().all(|&v| v == 2));
/// # Ok::<(), ribostall_core::types::RibostallError>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CoverageAggregator<'a> {
    offsets: &'a OffsetTable,
    policy: OffsetPolicy,
}

impl<'a> CoverageAggregator<'a> {
    #[must_use]
    pub const fn new(offsets: &'a OffsetTable, policy: OffsetPolicy) -> Self {
        Self { offsets, policy }
    }

    #[must_use]
    pub const fn policy(&self) -> OffsetPolicy {
        self.policy
    }

    /// Aggregates one transcript, fetching raw coverage per read length
    /// through `raw_coverage`.
    ///
    /// # Errors
    ///
    /// - [`RibostallError::InvalidCodingRegion`] for an inverted region
    /// - [`RibostallError::OffsetExceedsStart`] under
    ///   [`OffsetPolicy::RejectTranscript`] when any offset exceeds `start`
    /// - any error returned by `raw_coverage`, or
    ///   [`RibostallError::CoverageOutOfBounds`] when a raw vector is too short
    pub fn aggregate<F>(
        &self,
        region: CodingRegion,
        mut raw_coverage: F,
    ) -> Result<AdjustedCoverage, RibostallError>
    where
        F: FnMut(u32) -> Result<Vec<u32>, RibostallError>,
    {
        region.validate()?;

        if self.policy == OffsetPolicy::RejectTranscript {
            let offset = self.offsets.max_offset();
            if region.start() < offset {
                return Err(RibostallError::OffsetExceedsStart {
                    offset,
                    start: region.start(),
                });
            }
        }

        let mut totals = vec![0u64; region.len()];
        for (read_length, offset) in self.offsets.iter() {
            let raw = raw_coverage(read_length)?;
            accumulate_length(&mut totals, &raw, region, read_length, offset)?;
        }

        Ok(AdjustedCoverage::new(totals))
    }

    /// Aggregates `transcript` in `experiment` straight from a dataset handle.
    ///
    /// # Errors
    ///
    /// Same as [`CoverageAggregator::aggregate`].
    pub fn aggregate_transcript<D>(
        &self,
        dataset: &D,
        transcript: &str,
        experiment: &str,
        region: CodingRegion,
    ) -> Result<AdjustedCoverage, RibostallError>
    where
        D: CoverageDataset + ?Sized,
    {
        self.aggregate(region, |read_length| {
            dataset.raw_coverage(transcript, experiment, read_length)
        })
    }
}

/// Adds one read length's offset-shifted contribution to `totals`.
///
/// Position `j` of the coding region receives `raw[start + j - offset]`.
/// When `offset > start` the first `offset - start` positions would read
/// upstream of the transcript and receive nothing.
///
/// # Errors
///
/// Returns [`RibostallError::CoverageOutOfBounds`] when `raw` ends before
/// `stop - offset`.
pub fn accumulate_length(
    totals: &mut [u64],
    raw: &[u32],
    region: CodingRegion,
    read_length: u32,
    offset: usize,
) -> Result<(), RibostallError> {
    let (start, stop) = (region.start(), region.stop());
    let (padding, source) = if offset <= start {
        (0, (start - offset)..(stop - offset))
    } else {
        ((offset - start).min(totals.len()), 0..stop.saturating_sub(offset))
    };

    if source.end > raw.len() {
        return Err(RibostallError::CoverageOutOfBounds {
            read_length,
            available: raw.len(),
            required: source.end,
        });
    }

    for (total, &count) in totals[padding..].iter_mut().zip(&raw[source]) {
        *total += u64::from(count);
    }
    Ok(())
}
