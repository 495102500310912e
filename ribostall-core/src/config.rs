use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PERCENTILE, DEFAULT_TOP_TRANSCRIPTS};
use crate::types::RibostallError;

/// How the coverage aggregator treats an offset larger than the coding start.
///
/// # Policies
///
/// - **ZeroPad**: positions whose ribosome site would lie upstream of the
///   transcript's 5' end get zero coverage for that read length
/// - **RejectTranscript**: the transcript is skipped whenever any offset
///   exceeds its coding start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OffsetPolicy {
    /// Left-pad the shifted coverage with zeros.
    #[default]
    ZeroPad,

    /// Skip the transcript and record a failure marker.
    RejectTranscript,
}

/// Unit of work handed to each worker during coverage aggregation.
///
/// Every unit opens its own dataset handle, so this also controls how often
/// the dataset is reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Scheduling {
    /// One transcript per task; each worker thread keeps a single handle.
    #[default]
    PerTranscript,

    /// Fixed-size transcript batches with one handle per batch.
    Batched(usize),
}

/// When a codon counts as a stall codon given its three nucleotide flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StallCodonRule {
    /// At least one of the codon's nucleotides is flagged.
    #[default]
    Any,

    /// More than half of the codon's nucleotides are flagged.
    Majority,
}

/// Configuration settings for a ribostall analysis run.
///
/// # Examples
///
/// ```rust
/// use ribostall_core::config::{AnalysisConfig, OffsetPolicy, Scheduling};
///
/// let config = AnalysisConfig {
///     offset_policy: OffsetPolicy::RejectTranscript,
///     scheduling: Scheduling::Batched(64),
///     num_threads: Some(4),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Treatment of offsets that exceed a transcript's coding start.
    ///
    /// **Default**: [`OffsetPolicy::ZeroPad`]
    pub offset_policy: OffsetPolicy,

    /// Work unit for the parallel coverage runner.
    ///
    /// **Default**: [`Scheduling::PerTranscript`]
    pub scheduling: Scheduling,

    /// Percentile of pooled interior z-scores used as the stall threshold.
    ///
    /// Must lie in `[0, 100]`.
    ///
    /// **Default**: `99.0`
    pub percentile: f64,

    /// Number of highest-density transcripts kept per experiment before
    /// intersecting across experiments.
    ///
    /// **Default**: `100`
    pub top_transcripts: usize,

    /// Rule deciding whether a codon is a stall codon.
    ///
    /// **Default**: [`StallCodonRule::Any`]
    pub stall_codon_rule: StallCodonRule,

    /// Number of threads to use for parallel processing.
    ///
    /// When set, a dedicated Rayon thread pool of this size is used for
    /// coverage aggregation. Set to `None` for automatic detection.
    ///
    /// **Default**: `None` (use all available cores)
    pub num_threads: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            offset_policy: OffsetPolicy::ZeroPad,
            scheduling: Scheduling::PerTranscript,
            percentile: DEFAULT_PERCENTILE,
            top_transcripts: DEFAULT_TOP_TRANSCRIPTS,
            stall_codon_rule: StallCodonRule::Any,
            num_threads: None,
        }
    }
}

impl AnalysisConfig {
    /// Checks the settings that would otherwise fail mid-run.
    ///
    /// # Errors
    ///
    /// - [`RibostallError::InvalidPercentile`] if `percentile` is outside
    ///   `[0, 100]` or not a number
    /// - [`RibostallError::InvalidBatchSize`] for `Scheduling::Batched(0)`
    pub fn validate(&self) -> Result<(), RibostallError> {
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(RibostallError::InvalidPercentile(self.percentile));
        }
        if self.scheduling == Scheduling::Batched(0) {
            return Err(RibostallError::InvalidBatchSize);
        }
        Ok(())
    }
}
