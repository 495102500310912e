use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable transcript identifier, as reported by the dataset reader.
pub type TranscriptId = String;

/// Coding-region lookup keyed by transcript.
pub type CodingRegions = BTreeMap<TranscriptId, CodingRegion>;

/// Adjusted coverage for every experiment of a run, keyed by experiment.
///
/// This is the only intermediate that is persisted between the coverage
/// stage and the stall/heatmap stages.
pub type CoverageMap = BTreeMap<String, ExperimentCoverage>;

/// Coding region of a transcript as a half-open nucleotide range.
///
/// Coordinates are 0-based and relative to the transcript's 5' end, so
/// `start` is the first nucleotide of the start codon and `stop` is one past
/// the last translated nucleotide.
///
/// # Examples
///
/// ```rust
/// use ribostall_core::types::CodingRegion;
///
/// let cds = CodingRegion::new(30, 60)?;
/// assert_eq!(cds.len(), 30);
/// assert!(CodingRegion::new(60, 60).is_err());
/// # Ok::<(), ribostall_core::types::RibostallError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodingRegion {
    start: usize,
    stop: usize,
}

impl CodingRegion {
    /// Creates a coding region, rejecting empty or inverted ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RibostallError::InvalidCodingRegion`] when `stop <= start`.
    pub const fn new(start: usize, stop: usize) -> Result<Self, RibostallError> {
        if stop <= start {
            return Err(RibostallError::InvalidCodingRegion { start, stop });
        }
        Ok(Self { start, stop })
    }

    /// First nucleotide of the coding region.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// One past the last nucleotide of the coding region.
    #[must_use]
    pub const fn stop(&self) -> usize {
        self.stop
    }

    /// Number of nucleotides in the coding region.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-checks the range invariant, e.g. after deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`RibostallError::InvalidCodingRegion`] when `stop <= start`.
    pub fn validate(&self) -> Result<(), RibostallError> {
        match Self::new(self.start, self.stop) {
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Read length to ribosome active-site offset mapping for one experiment.
///
/// The table always covers a contiguous range of read lengths
/// `[min_len, max_len]` with exactly one offset per length.
///
/// # Examples
///
/// ```rust
/// use std::collections::BTreeMap;
/// use ribostall_core::types::{OffsetTable, RibostallError};
///
/// let offsets = OffsetTable::from_pairs([(25, 5), (26, 10)])?;
/// assert_eq!(offsets.get(26), Some(10));
/// assert_eq!(offsets.max_offset(), 10);
///
/// let sparse = BTreeMap::from([(25, 12), (27, 12)]);
/// assert!(matches!(
///     OffsetTable::new(25, 27, &sparse),
///     Err(RibostallError::MissingOffset(26))
/// ));
/// # Ok::<(), RibostallError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetTable {
    min_len: u32,
    offsets: Vec<usize>,
}

impl OffsetTable {
    /// Builds the table for `[min_len, max_len]` from a possibly larger map.
    ///
    /// Entries outside the range are ignored.
    ///
    /// # Errors
    ///
    /// - [`RibostallError::InvalidLengthRange`] if `min_len > max_len`
    /// - [`RibostallError::MissingOffset`] for the first length in range
    ///   without an entry
    pub fn new(
        min_len: u32,
        max_len: u32,
        offsets: &BTreeMap<u32, usize>,
    ) -> Result<Self, RibostallError> {
        if min_len > max_len {
            return Err(RibostallError::InvalidLengthRange { min_len, max_len });
        }
        let offsets = (min_len..=max_len)
            .map(|len| {
                offsets
                    .get(&len)
                    .copied()
                    .ok_or(RibostallError::MissingOffset(len))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { min_len, offsets })
    }

    /// Builds the table from `(read_length, offset)` pairs, taking the
    /// smallest and largest lengths given as the range.
    ///
    /// # Errors
    ///
    /// Fails like [`OffsetTable::new`] when the lengths are not contiguous,
    /// and with [`RibostallError::InvalidLengthRange`] when no pair is given.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, RibostallError>
    where
        I: IntoIterator<Item = (u32, usize)>,
    {
        let map: BTreeMap<u32, usize> = pairs.into_iter().collect();
        match (map.keys().next(), map.keys().next_back()) {
            (Some(&min_len), Some(&max_len)) => Self::new(min_len, max_len, &map),
            _ => Err(RibostallError::InvalidLengthRange {
                min_len: 0,
                max_len: 0,
            }),
        }
    }

    #[must_use]
    pub const fn min_len(&self) -> u32 {
        self.min_len
    }

    #[must_use]
    pub fn max_len(&self) -> u32 {
        self.min_len + (self.offsets.len() as u32).saturating_sub(1)
    }

    /// Offset for a read length, if the length is in range.
    #[must_use]
    pub fn get(&self, read_length: u32) -> Option<usize> {
        let index = read_length.checked_sub(self.min_len)? as usize;
        self.offsets.get(index).copied()
    }

    /// Iterates `(read_length, offset)` pairs in ascending length order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, usize)> + '_ {
        self.offsets
            .iter()
            .enumerate()
            .map(|(i, &offset)| (self.min_len + i as u32, offset))
    }

    /// Largest offset of any read length in the table.
    #[must_use]
    pub fn max_offset(&self) -> usize {
        self.offsets.iter().copied().max().unwrap_or(0)
    }
}

/// Offset-corrected, length-aggregated coverage over one coding region.
///
/// The vector always has exactly `stop - start` entries, one per coding
/// nucleotide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjustedCoverage(Vec<u64>);

impl AdjustedCoverage {
    #[must_use]
    pub const fn new(values: Vec<u64>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn values(&self) -> &[u64] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all positions.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    /// Reads per nucleotide across the coding region.
    #[must_use]
    pub fn density(&self) -> f64 {
        if self.0.is_empty() {
            0.0
        } else {
            self.total() as f64 / self.0.len() as f64
        }
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<u64> {
        self.0
    }
}

impl From<Vec<u64>> for AdjustedCoverage {
    fn from(values: Vec<u64>) -> Self {
        Self(values)
    }
}

/// Outcome of aggregating one transcript: a coverage vector or a failure
/// marker carrying the cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoverageRecord {
    Computed(AdjustedCoverage),
    Failed { reason: String },
}

impl CoverageRecord {
    pub fn failed(reason: impl ToString) -> Self {
        Self::Failed {
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub const fn coverage(&self) -> Option<&AdjustedCoverage> {
        match self {
            Self::Computed(coverage) => Some(coverage),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Per-transcript coverage records of one experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentCoverage {
    /// Experiment identifier
    pub experiment: String,
    /// Records keyed by transcript; ordering never depends on completion order
    pub records: BTreeMap<TranscriptId, CoverageRecord>,
}

impl ExperimentCoverage {
    pub fn new(experiment: impl Into<String>) -> Self {
        Self {
            experiment: experiment.into(),
            records: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, transcript: impl Into<TranscriptId>, record: CoverageRecord) {
        self.records.insert(transcript.into(), record);
    }

    /// Coverage of a transcript, `None` if absent or failed.
    #[must_use]
    pub fn get(&self, transcript: &str) -> Option<&AdjustedCoverage> {
        self.records.get(transcript).and_then(CoverageRecord::coverage)
    }

    /// Iterates successfully aggregated transcripts.
    pub fn computed(&self) -> impl Iterator<Item = (&TranscriptId, &AdjustedCoverage)> + '_ {
        self.records
            .iter()
            .filter_map(|(transcript, record)| record.coverage().map(|c| (transcript, c)))
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.records.values().filter(|r| !r.is_failed()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.records.values().filter(|r| r.is_failed()).count()
    }
}

/// Per-nucleotide stall flags aligned to an [`AdjustedCoverage`] vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StallMask(Vec<bool>);

impl StallMask {
    #[must_use]
    pub const fn new(flags: Vec<bool>) -> Self {
        Self(flags)
    }

    /// Flags every position whose z-score strictly exceeds `threshold`.
    #[must_use]
    pub fn from_zscores(zscores: &[f64], threshold: f64) -> Self {
        Self(zscores.iter().map(|&z| z > threshold).collect())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether position `index` is flagged; out-of-range reads as unflagged.
    #[must_use]
    pub fn is_set(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    /// Indices of all flagged positions.
    #[must_use]
    pub fn positions(&self) -> Vec<usize> {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, &flag)| flag.then_some(i))
            .collect()
    }

    /// Number of flagged positions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&flag| flag).count()
    }

    /// Position-wise logical AND; `None` when lengths differ.
    #[must_use]
    pub fn and(&self, other: &Self) -> Option<Self> {
        if self.0.len() != other.0.len() {
            return None;
        }
        Some(Self(
            self.0.iter().zip(&other.0).map(|(&a, &b)| a && b).collect(),
        ))
    }
}

/// Error types that can occur while computing coverage, stall sites or
/// heatmaps.
#[derive(Error, Debug)]
pub enum RibostallError {
    /// Coding region with `stop <= start`
    #[error("Invalid coding region: start {start} must be below stop {stop}")]
    InvalidCodingRegion { start: usize, stop: usize },
    /// Read length range with `min_len > max_len`, or no lengths at all
    #[error("Invalid read length range: {min_len}..={max_len}")]
    InvalidLengthRange { min_len: u32, max_len: u32 },
    /// Offset table lacks a length inside its range
    #[error("Missing offset for read length {0}")]
    MissingOffset(u32),
    /// No offset table was supplied for an experiment
    #[error("No offset table for experiment {0}")]
    MissingOffsetTable(String),
    /// Percentile outside `[0, 100]`
    #[error("Invalid percentile {0} (expected 0 to 100)")]
    InvalidPercentile(f64),
    /// Fixed-size batch scheduling with a zero batch size
    #[error("Batch size must be at least 1")]
    InvalidBatchSize,
    /// A condition was given without replicates
    #[error("Condition has no replicates")]
    EmptyCondition,
    /// Offset places the window before the 5' end under the reject policy
    #[error("Offset {offset} exceeds coding start {start}")]
    OffsetExceedsStart { offset: usize, start: usize },
    /// Raw coverage too short for the requested slice
    #[error(
        "Raw coverage at read length {read_length} has {available} positions, {required} required"
    )]
    CoverageOutOfBounds {
        read_length: u32,
        available: usize,
        required: usize,
    },
    /// Transcript not known to the dataset
    #[error("Unknown transcript: {0}")]
    UnknownTranscript(String),
    /// Experiment not known to the dataset or coverage map
    #[error("Unknown experiment: {0}")]
    UnknownExperiment(String),
    /// Coverage vector with zero standard deviation
    #[error("Coverage has zero variance")]
    DegenerateCoverage,
    /// Heatmap requested but no stall window was collected
    #[error("No stall windows collected; cannot build a heatmap")]
    NoStallWindows,
    /// Dataset reader failure
    #[error("Dataset error: {0}")]
    Dataset(String),
    /// Thread pool could not be built
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
    /// File I/O operation failed
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    /// Error parsing input data
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl RibostallError {
    /// Whether the error is a configuration error that must abort a run
    /// before any transcript is processed.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidCodingRegion { .. }
                | Self::InvalidLengthRange { .. }
                | Self::MissingOffset(_)
                | Self::MissingOffsetTable(_)
                | Self::InvalidPercentile(_)
                | Self::InvalidBatchSize
                | Self::EmptyCondition
        )
    }
}
