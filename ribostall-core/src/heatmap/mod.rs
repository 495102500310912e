//! Codon-context heatmaps around stall sites.
//!
//! Every stall codon contributes a 33-nt window, read as 11 codons at
//! relative positions -5..=+5 with the stall codon at 0. Counting codons per
//! position gives the raw heatmap; subtracting the transcriptome codon
//! frequency from each column's frequency gives the normalized heatmap.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::StallCodonRule;
use crate::constants::{
    CODON_LENGTH, FIVE_PRIME_MARGIN, FLANKING_CODONS, THREE_PRIME_MARGIN, WINDOW_CODONS,
    WINDOW_DOWNSTREAM, WINDOW_UPSTREAM,
};
use crate::dataset::SequenceProvider;
use crate::types::{CodingRegions, RibostallError, StallMask, TranscriptId};

/// Codon window around one stall codon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StallSite {
    pub transcript: TranscriptId,
    /// 0-based transcript coordinate of the stall codon's first nucleotide
    pub position: usize,
    /// The 11 window codons, 5' to 3'
    pub codons: Vec<String>,
}

impl StallSite {
    /// 1-based coordinate used in reports.
    #[must_use]
    pub const fn display_position(&self) -> usize {
        self.position + 1
    }

    /// The window as one nucleotide string.
    #[must_use]
    pub fn window(&self) -> String {
        self.codons.concat()
    }

    /// The codon at relative position 0.
    #[must_use]
    pub fn stall_codon(&self) -> Option<&str> {
        self.codons
            .get(FLANKING_CODONS as usize)
            .map(String::as_str)
    }
}

impl StallCodonRule {
    /// Whether a codon with these nucleotide flags is a stall codon.
    #[must_use]
    pub fn is_stall(self, flags: &[bool]) -> bool {
        let flagged = flags.iter().filter(|&&flag| flag).count();
        match self {
            Self::Any => flagged > 0,
            Self::Majority => flagged * 2 > flags.len(),
        }
    }
}

/// Collects the codon window of every stall codon.
///
/// Codons are scanned in frame from `start + 18` up to `stop - 15`. Windows
/// reaching past the sequence, transcripts without a sequence or region,
/// and masks whose length differs from the region are skipped.
pub fn collect_stall_sites<S>(
    masks: &BTreeMap<TranscriptId, StallMask>,
    sequences: &S,
    regions: &CodingRegions,
    rule: StallCodonRule,
) -> Vec<StallSite>
where
    S: SequenceProvider + ?Sized,
{
    let mut sites = Vec::new();
    for (transcript, mask) in masks {
        let Some(region) = regions.get(transcript) else {
            warn!("No coding region for {transcript}; skipping its stall sites");
            continue;
        };
        let Some(sequence) = sequences.sequence(transcript) else {
            warn!("No sequence for {transcript}; skipping its stall sites");
            continue;
        };
        if mask.len() != region.len() {
            warn!(
                "Stall mask of {transcript} has {} positions, coding region {}; skipping",
                mask.len(),
                region.len()
            );
            continue;
        }

        let flags = mask.as_slice();
        let first = region.start() + FIVE_PRIME_MARGIN;
        let last = region.stop().saturating_sub(THREE_PRIME_MARGIN);
        for position in (first..last).step_by(CODON_LENGTH) {
            let offset = position - region.start();
            let codon_flags = &flags[offset..(offset + CODON_LENGTH).min(flags.len())];
            if !rule.is_stall(codon_flags) {
                continue;
            }

            let (from, to) = (position - WINDOW_UPSTREAM, position + WINDOW_DOWNSTREAM);
            let Some(window) = sequence.get(from..to) else {
                debug!("Window of {transcript} at {position} runs past the sequence; skipping");
                continue;
            };
            sites.push(StallSite {
                transcript: transcript.clone(),
                position,
                codons: window
                    .chunks_exact(CODON_LENGTH)
                    .map(|codon| String::from_utf8_lossy(codon).into_owned())
                    .collect(),
            });
        }
    }
    sites
}

/// Column index of a relative codon position, `None` outside -5..=5.
#[must_use]
pub fn column_index(position: i32) -> Option<usize> {
    (-FLANKING_CODONS..=FLANKING_CODONS)
        .contains(&position)
        .then(|| (position + FLANKING_CODONS) as usize)
}

/// Relative codon position of a column index.
#[must_use]
pub const fn relative_position(column: usize) -> i32 {
    column as i32 - FLANKING_CODONS
}

/// Codon by relative-position matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapMatrix<T> {
    rows: BTreeMap<String, [T; WINDOW_CODONS]>,
}

/// Codon counts per relative position.
pub type RawHeatmap = HeatmapMatrix<u64>;

/// Column frequency minus background frequency per relative position.
pub type NormalizedHeatmap = HeatmapMatrix<f64>;

impl<T> Default for HeatmapMatrix<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Copy> HeatmapMatrix<T> {
    /// Value of `codon` at relative position `position`.
    #[must_use]
    pub fn get(&self, codon: &str, position: i32) -> Option<T> {
        let column = column_index(position)?;
        self.rows.get(codon).map(|row| row[column])
    }

    #[must_use]
    pub fn row(&self, codon: &str) -> Option<&[T; WINDOW_CODONS]> {
        self.rows.get(codon)
    }

    /// Rows in codon order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &[T; WINDOW_CODONS])> + '_ {
        self.rows.iter().map(|(codon, row)| (codon.as_str(), row))
    }

    pub fn codons(&self) -> impl Iterator<Item = &str> + '_ {
        self.rows.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RawHeatmap {
    /// Counts the codons of every window.
    ///
    /// # Errors
    ///
    /// Returns [`RibostallError::NoStallWindows`] when `sites` is empty.
    pub fn from_sites(sites: &[StallSite]) -> Result<Self, RibostallError> {
        if sites.is_empty() {
            return Err(RibostallError::NoStallWindows);
        }
        let mut heatmap = Self::default();
        for site in sites {
            heatmap.add_site(site);
        }
        Ok(heatmap)
    }

    pub fn add_site(&mut self, site: &StallSite) {
        for (column, codon) in site.codons.iter().take(WINDOW_CODONS).enumerate() {
            self.rows.entry(codon.clone()).or_insert([0; WINDOW_CODONS])[column] += 1;
        }
    }

    /// Sum of every column.
    #[must_use]
    pub fn column_totals(&self) -> [u64; WINDOW_CODONS] {
        let mut totals = [0; WINDOW_CODONS];
        for row in self.rows.values() {
            for (total, count) in totals.iter_mut().zip(row) {
                *total += count;
            }
        }
        totals
    }
}

impl NormalizedHeatmap {
    /// Rows ordered by descending score at relative position `position`,
    /// ties by codon.
    #[must_use]
    pub fn sorted_by_position(&self, position: i32) -> Vec<(&str, &[f64; WINDOW_CODONS])> {
        let column = column_index(position).unwrap_or(0);
        let mut rows: Vec<_> = self.rows().collect();
        rows.sort_by(|a, b| b.1[column].total_cmp(&a.1[column]).then_with(|| a.0.cmp(b.0)));
        rows
    }
}

/// In-frame codon frequencies over the coding regions of a transcript set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundCodonFrequency {
    counts: BTreeMap<String, u64>,
    total: u64,
}

impl BackgroundCodonFrequency {
    /// Counts codons at `start + 3, start + 6, ...` below `stop` for every
    /// transcript, skipping the start codon.
    pub fn from_transcripts<'a, I, S>(
        transcripts: I,
        sequences: &S,
        regions: &CodingRegions,
    ) -> Self
    where
        I: IntoIterator<Item = &'a TranscriptId>,
        S: SequenceProvider + ?Sized,
    {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for transcript in transcripts {
            let (Some(region), Some(sequence)) =
                (regions.get(transcript), sequences.sequence(transcript))
            else {
                debug!("No sequence or coding region for {transcript}; not in background");
                continue;
            };
            for position in (region.start() + CODON_LENGTH..region.stop()).step_by(CODON_LENGTH) {
                let Some(codon) = sequence.get(position..position + CODON_LENGTH) else {
                    break;
                };
                *counts
                    .entry(String::from_utf8_lossy(codon).into_owned())
                    .or_insert(0) += 1;
            }
        }
        Self::from_counts(counts)
    }

    #[must_use]
    pub fn from_counts(counts: BTreeMap<String, u64>) -> Self {
        let total = counts.values().sum();
        Self { counts, total }
    }

    #[must_use]
    pub fn count(&self, codon: &str) -> u64 {
        self.counts.get(codon).copied().unwrap_or(0)
    }

    /// Share of `codon` among all counted codons, zero when nothing was counted.
    #[must_use]
    pub fn frequency(&self, codon: &str) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.count(codon) as f64 / self.total as f64
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    pub fn codons(&self) -> impl Iterator<Item = &str> + '_ {
        self.counts.keys().map(String::as_str)
    }
}

/// Normalizes a raw heatmap against a background.
///
/// Each cell becomes the codon's share of its column minus the codon's
/// background frequency. Rows cover every codon seen in either input.
#[must_use]
pub fn normalize_heatmap(
    raw: &RawHeatmap,
    background: &BackgroundCodonFrequency,
) -> NormalizedHeatmap {
    let totals = raw.column_totals();
    let codons: BTreeSet<&str> = raw.codons().chain(background.codons()).collect();

    let rows = codons
        .into_iter()
        .map(|codon| {
            let counts = raw.row(codon).copied().unwrap_or([0; WINDOW_CODONS]);
            let expected = background.frequency(codon);
            let mut scores = [0.0; WINDOW_CODONS];
            for ((score, &count), &total) in scores.iter_mut().zip(&counts).zip(&totals) {
                let observed = if total == 0 {
                    0.0
                } else {
                    count as f64 / total as f64
                };
                *score = observed - expected;
            }
            (codon.to_string(), scores)
        })
        .collect();

    HeatmapMatrix { rows }
}

/// Stall sites plus raw and normalized heatmaps for one condition.
#[derive(Debug, Clone, PartialEq)]
pub struct CodonHeatmaps {
    pub sites: Vec<StallSite>,
    pub raw: RawHeatmap,
    pub normalized: NormalizedHeatmap,
    pub background: BackgroundCodonFrequency,
}

/// Builds codon heatmaps from combined stall masks.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeatmapBuilder {
    rule: StallCodonRule,
}

impl HeatmapBuilder {
    #[must_use]
    pub const fn new(rule: StallCodonRule) -> Self {
        Self { rule }
    }

    /// Collects stall windows and builds both heatmaps. The background is
    /// computed over `transcripts`.
    ///
    /// # Errors
    ///
    /// Returns [`RibostallError::NoStallWindows`] when no window is collected.
    pub fn build<S>(
        &self,
        masks: &BTreeMap<TranscriptId, StallMask>,
        transcripts: &BTreeSet<TranscriptId>,
        sequences: &S,
        regions: &CodingRegions,
    ) -> Result<CodonHeatmaps, RibostallError>
    where
        S: SequenceProvider + ?Sized,
    {
        let sites = collect_stall_sites(masks, sequences, regions, self.rule);
        let raw = RawHeatmap::from_sites(&sites)?;
        let background =
            BackgroundCodonFrequency::from_transcripts(transcripts, sequences, regions);
        let normalized = normalize_heatmap(&raw, &background);
        info!(
            "{} stall windows over {} codons, background of {} codons",
            sites.len(),
            raw.len(),
            background.total()
        );

        Ok(CodonHeatmaps {
            sites,
            raw,
            normalized,
            background,
        })
    }
}
