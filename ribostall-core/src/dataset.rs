//! Collaborator interfaces for raw coverage and transcript sequences.
//!
//! The pipeline never touches storage directly. A [`DatasetFactory`] opens
//! independent [`CoverageDataset`] handles, one per worker or batch, and a
//! [`SequenceProvider`] serves nucleotide sequences for codon extraction.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::types::{CodingRegion, CodingRegions, RibostallError, TranscriptId};

/// Read-only access to per-read-length raw coverage.
///
/// Raw coverage vectors are indexed by transcript position (0-based from the
/// 5' end) and count read 5' ends at each position.
pub trait CoverageDataset {
    /// All transcripts with a coding-region annotation, in stable order.
    fn transcripts(&self) -> Result<Vec<TranscriptId>, RibostallError>;

    /// All experiments available in the dataset.
    fn experiments(&self) -> Result<Vec<String>, RibostallError>;

    fn coding_region(&self, transcript: &str) -> Result<CodingRegion, RibostallError>;

    /// Raw 5'-end counts of `transcript` in `experiment` for reads of exactly
    /// `read_length` nucleotides.
    fn raw_coverage(
        &self,
        transcript: &str,
        experiment: &str,
        read_length: u32,
    ) -> Result<Vec<u32>, RibostallError>;
}

impl<T: CoverageDataset + ?Sized> CoverageDataset for Arc<T> {
    fn transcripts(&self) -> Result<Vec<TranscriptId>, RibostallError> {
        (**self).transcripts()
    }

    fn experiments(&self) -> Result<Vec<String>, RibostallError> {
        (**self).experiments()
    }

    fn coding_region(&self, transcript: &str) -> Result<CodingRegion, RibostallError> {
        (**self).coding_region(transcript)
    }

    fn raw_coverage(
        &self,
        transcript: &str,
        experiment: &str,
        read_length: u32,
    ) -> Result<Vec<u32>, RibostallError> {
        (**self).raw_coverage(transcript, experiment, read_length)
    }
}

/// Opens dataset handles for concurrent workers.
///
/// Each call must return a handle that can be used without coordinating with
/// any other handle. Closures returning a handle implement this trait.
pub trait DatasetFactory: Sync {
    type Dataset: CoverageDataset;

    fn open(&self) -> Result<Self::Dataset, RibostallError>;
}

impl<F, D> DatasetFactory for F
where
    F: Fn() -> Result<D, RibostallError> + Sync,
    D: CoverageDataset,
{
    type Dataset = D;

    fn open(&self) -> Result<D, RibostallError> {
        self()
    }
}

/// Nucleotide sequences by transcript.
pub trait SequenceProvider {
    fn sequence(&self, transcript: &str) -> Option<&[u8]>;
}

impl SequenceProvider for HashMap<TranscriptId, Vec<u8>> {
    fn sequence(&self, transcript: &str) -> Option<&[u8]> {
        self.get(transcript).map(Vec::as_slice)
    }
}

impl SequenceProvider for BTreeMap<TranscriptId, Vec<u8>> {
    fn sequence(&self, transcript: &str) -> Option<&[u8]> {
        self.get(transcript).map(Vec::as_slice)
    }
}

impl SequenceProvider for HashMap<TranscriptId, String> {
    fn sequence(&self, transcript: &str) -> Option<&[u8]> {
        self.get(transcript).map(String::as_bytes)
    }
}

/// Coverage dataset held entirely in memory.
///
/// Missing `(transcript, experiment, read_length)` combinations read as all
/// zeros over the longest vector recorded for that transcript, so sparse
/// inputs only need to list lengths that were actually observed.
///
/// # Examples
///
/// ```rust
/// use ribostall_core::dataset::{CoverageDataset, InMemoryDataset};
/// use ribostall_core::types::CodingRegion;
///
/// let mut dataset = InMemoryDataset::new();
/// dataset.add_transcript("tx1", CodingRegion::new(3, 9)?);
/// dataset.add_coverage("tx1", "ctrl_1", 28, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
///
/// assert_eq!(dataset.raw_coverage("tx1", "ctrl_1", 28)?[4], 4);
/// assert_eq!(dataset.raw_coverage("tx1", "ctrl_1", 29)?, vec![0; 10]);
/// # Ok::<(), ribostall_core::types::RibostallError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataset {
    regions: CodingRegions,
    experiments: Vec<String>,
    lengths: HashMap<TranscriptId, usize>,
    coverage: HashMap<(TranscriptId, String, u32), Vec<u32>>,
}

impl InMemoryDataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_transcript(&mut self, transcript: impl Into<TranscriptId>, region: CodingRegion) {
        self.regions.insert(transcript.into(), region);
    }

    /// Registers an experiment with no coverage yet.
    pub fn add_experiment(&mut self, experiment: impl Into<String>) {
        let experiment = experiment.into();
        if !self.experiments.contains(&experiment) {
            self.experiments.push(experiment);
        }
    }

    /// Stores raw coverage for one read length, replacing earlier values.
    pub fn add_coverage(
        &mut self,
        transcript: impl Into<TranscriptId>,
        experiment: impl Into<String>,
        read_length: u32,
        counts: Vec<u32>,
    ) {
        let transcript = transcript.into();
        let experiment = experiment.into();
        self.add_experiment(experiment.clone());

        let length = self.lengths.entry(transcript.clone()).or_insert(0);
        *length = (*length).max(counts.len());
        self.coverage
            .insert((transcript, experiment, read_length), counts);
    }

    #[must_use]
    pub const fn regions(&self) -> &CodingRegions {
        &self.regions
    }
}

impl CoverageDataset for InMemoryDataset {
    fn transcripts(&self) -> Result<Vec<TranscriptId>, RibostallError> {
        Ok(self.regions.keys().cloned().collect())
    }

    fn experiments(&self) -> Result<Vec<String>, RibostallError> {
        Ok(self.experiments.clone())
    }

    fn coding_region(&self, transcript: &str) -> Result<CodingRegion, RibostallError> {
        self.regions
            .get(transcript)
            .copied()
            .ok_or_else(|| RibostallError::UnknownTranscript(transcript.to_string()))
    }

    fn raw_coverage(
        &self,
        transcript: &str,
        experiment: &str,
        read_length: u32,
    ) -> Result<Vec<u32>, RibostallError> {
        if !self.experiments.iter().any(|e| e == experiment) {
            return Err(RibostallError::UnknownExperiment(experiment.to_string()));
        }
        let key = (transcript.to_string(), experiment.to_string(), read_length);
        if let Some(counts) = self.coverage.get(&key) {
            return Ok(counts.clone());
        }
        let length = self
            .lengths
            .get(transcript)
            .copied()
            .or_else(|| self.regions.get(transcript).map(CodingRegion::stop))
            .ok_or_else(|| RibostallError::UnknownTranscript(transcript.to_string()))?;
        Ok(vec![0; length])
    }
}
