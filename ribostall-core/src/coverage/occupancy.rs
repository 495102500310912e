//! Codon occupancy: adjusted coverage summed per codon across the coding
//! regions of every transcript.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::constants::CODON_LENGTH;
use crate::dataset::SequenceProvider;
use crate::types::{CodingRegions, CoverageMap};

/// Codon occupancy of several experiments next to the transcriptome's codon
/// composition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodonOccupancy {
    /// Experiments in column order
    pub experiments: Vec<String>,
    /// In-frame codon counts over the coding regions of the transcripts
    /// computed in the first experiment column
    pub transcriptome: BTreeMap<String, u64>,
    /// Summed adjusted coverage per codon, keyed by experiment then codon
    pub occupancy: BTreeMap<String, BTreeMap<String, u64>>,
}

impl CodonOccupancy {
    /// Every codon seen in any column, sorted.
    #[must_use]
    pub fn codons(&self) -> BTreeSet<&str> {
        self.transcriptome
            .keys()
            .chain(self.occupancy.values().flat_map(BTreeMap::keys))
            .map(String::as_str)
            .collect()
    }

    /// Occupancy of `codon` in `experiment`, zero when never observed.
    #[must_use]
    pub fn get(&self, experiment: &str, codon: &str) -> u64 {
        self.occupancy
            .get(experiment)
            .and_then(|codons| codons.get(codon))
            .copied()
            .unwrap_or(0)
    }
}

/// Sums adjusted coverage per in-frame codon for every experiment of
/// `coverage`, in the map's (sorted) experiment order.
///
/// Use [`codon_occupancy_for`] to keep dataset order, which also decides
/// the experiment the transcriptome column is taken from.
pub fn codon_occupancy<S>(
    coverage: &CoverageMap,
    sequences: &S,
    regions: &CodingRegions,
) -> CodonOccupancy
where
    S: SequenceProvider + ?Sized,
{
    let experiments: Vec<&String> = coverage.keys().collect();
    codon_occupancy_for(coverage, &experiments, sequences, regions)
}

/// Sums adjusted coverage per in-frame codon for `experiments`, in the
/// given order.
///
/// The transcriptome column counts codons over the transcripts computed in
/// the first listed experiment. Experiments missing from `coverage` are
/// skipped. Transcripts without a sequence or a coding region are skipped,
/// and a trailing partial codon is ignored.
pub fn codon_occupancy_for<E, S>(
    coverage: &CoverageMap,
    experiments: &[E],
    sequences: &S,
    regions: &CodingRegions,
) -> CodonOccupancy
where
    E: AsRef<str>,
    S: SequenceProvider + ?Sized,
{
    let mut result = CodonOccupancy::default();

    let listed = experiments.iter().filter_map(|experiment| {
        let experiment = experiment.as_ref();
        let records = coverage.get(experiment);
        if records.is_none() {
            warn!("{experiment}: not in the coverage map; no occupancy column");
        }
        records.map(|records| (experiment, records))
    });
    for (index, (experiment, records)) in listed.enumerate() {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();

        for (transcript, adjusted) in records.computed() {
            let (Some(region), Some(sequence)) =
                (regions.get(transcript), sequences.sequence(transcript))
            else {
                debug!("No sequence or coding region for {transcript}; skipping");
                continue;
            };
            let stop = region.stop().min(sequence.len());
            let Some(cds) = sequence.get(region.start()..stop) else {
                continue;
            };

            for (codon_index, codon) in cds.chunks_exact(CODON_LENGTH).enumerate() {
                let codon = String::from_utf8_lossy(codon).into_owned();
                let from = codon_index * CODON_LENGTH;
                let to = (from + CODON_LENGTH).min(adjusted.len());
                let reads: u64 = adjusted.values().get(from..to).map_or(0, |v| v.iter().sum());

                if index == 0 {
                    *result.transcriptome.entry(codon.clone()).or_insert(0) += 1;
                }
                *counts.entry(codon).or_insert(0) += reads;
            }
        }

        result.experiments.push(experiment.to_string());
        result.occupancy.insert(experiment.to_string(), counts);
    }

    result
}
