use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::heatmap::{BackgroundCodonFrequency, NormalizedHeatmap, RawHeatmap, StallSite};
use crate::types::{ExperimentCoverage, StallMask, TranscriptId};

/// Outcome counts of aggregating one experiment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub experiment: String,
    /// Transcripts with a coverage vector
    pub succeeded: usize,
    /// Transcripts carrying a failure marker
    pub failed: usize,
}

impl From<&ExperimentCoverage> for ExperimentSummary {
    fn from(coverage: &ExperimentCoverage) -> Self {
        Self {
            experiment: coverage.experiment.clone(),
            succeeded: coverage.succeeded(),
            failed: coverage.failed(),
        }
    }
}

impl ExperimentCoverage {
    #[must_use]
    pub fn summary(&self) -> ExperimentSummary {
        ExperimentSummary::from(self)
    }
}

/// Per-experiment outcome counts of a coverage run.
///
/// # Examples
///
/// ```rust
/// use ribostall_core::results::{ExperimentSummary, RunSummary};
///
/// let summary = RunSummary {
///     experiments: vec![
///         ExperimentSummary { experiment: "ctrl_1".into(), succeeded: 98, failed: 2 },
///         ExperimentSummary { experiment: "ctrl_2".into(), succeeded: 100, failed: 0 },
///     ],
/// };
/// assert_eq!(summary.total_failed(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub experiments: Vec<ExperimentSummary>,
}

impl RunSummary {
    #[must_use]
    pub fn total_succeeded(&self) -> usize {
        self.experiments.iter().map(|e| e.succeeded).sum()
    }

    #[must_use]
    pub fn total_failed(&self) -> usize {
        self.experiments.iter().map(|e| e.failed).sum()
    }
}

/// Stall sites and codon heatmaps of one condition.
///
/// A condition is a group of replicate experiments; stall sites are the
/// positions flagged in every replicate.
///
/// # Fields
///
/// - `condition`: display name, the first replicate's identifier
/// - `replicates`: experiments of the condition in the order given
/// - `stall_masks`: combined per-nucleotide stall flags per transcript
/// - `stall_sites`: codon windows around every stall codon
/// - `raw`: codon counts per relative position
/// - `normalized`: column frequency minus background frequency
/// - `background`: transcriptome codon frequencies of the analyzed transcripts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionReport {
    pub condition: String,
    pub replicates: Vec<String>,
    pub stall_masks: BTreeMap<TranscriptId, StallMask>,
    pub stall_sites: Vec<StallSite>,
    pub raw: RawHeatmap,
    pub normalized: NormalizedHeatmap,
    pub background: BackgroundCodonFrequency,
}

impl ConditionReport {
    /// Number of transcripts with at least one combined stall flag.
    #[must_use]
    pub fn stalled_transcripts(&self) -> usize {
        self.stall_masks.values().filter(|m| m.count() > 0).count()
    }
}
