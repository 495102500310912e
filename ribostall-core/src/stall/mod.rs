//! Stall-site detection from adjusted coverage.
//!
//! Each coverage vector is standardized to z-scores. A replicate's threshold
//! is a percentile of the pooled interior z-scores of all its transcripts,
//! and a position is a stall site only when it exceeds the threshold in every
//! replicate of the condition.

pub mod filter;

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::constants::{FIVE_PRIME_MARGIN, THREE_PRIME_MARGIN};
use crate::types::{ExperimentCoverage, RibostallError, StallMask, TranscriptId};

/// Standardizes a coverage vector with the population standard deviation.
///
/// # Errors
///
/// Returns [`RibostallError::DegenerateCoverage`] for an empty vector or one
/// whose values are all equal.
pub fn zscores(values: &[u64]) -> Result<Vec<f64>, RibostallError> {
    if values.is_empty() {
        return Err(RibostallError::DegenerateCoverage);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let std = variance.sqrt();
    if std == 0.0 || !std.is_finite() {
        return Err(RibostallError::DegenerateCoverage);
    }

    Ok(values.iter().map(|&v| (v as f64 - mean) / std).collect())
}

/// `p`-th percentile with linear interpolation between closest ranks.
///
/// Returns `None` for an empty input or `p` outside `[0, 100]`.
///
/// # Examples
///
/// ```rust
/// use ribostall_core::stall::percentile;
///
/// assert_eq!(percentile(&[1.0, 2.0, 3.0, 4.0], 50.0), Some(2.5));
/// assert_eq!(percentile(&[], 50.0), None);
/// ```
#[must_use]
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=100.0).contains(&p) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Z-scores eligible for the threshold pool: all but the first 18 and last
/// 15 positions. Empty for vectors of 33 positions or fewer.
#[must_use]
pub fn interior(zscores: &[f64]) -> &[f64] {
    if zscores.len() <= FIVE_PRIME_MARGIN + THREE_PRIME_MARGIN {
        &[]
    } else {
        &zscores[FIVE_PRIME_MARGIN..zscores.len() - THREE_PRIME_MARGIN]
    }
}

/// Z-scores and threshold of a single replicate.
#[derive(Debug, Clone)]
pub struct ReplicateScores {
    pub experiment: String,
    pub zscores: BTreeMap<TranscriptId, Vec<f64>>,
    /// `None` when no transcript contributed an interior position
    pub threshold: Option<f64>,
}

impl ReplicateScores {
    /// Scores the listed transcripts of one replicate.
    ///
    /// Transcripts that are absent, failed, or have zero variance are left
    /// out.
    #[must_use]
    pub fn compute(
        coverage: &ExperimentCoverage,
        transcripts: &BTreeSet<TranscriptId>,
        percentile_rank: f64,
    ) -> Self {
        let mut zscores_by_transcript = BTreeMap::new();
        for transcript in transcripts {
            let Some(adjusted) = coverage.get(transcript) else {
                debug!("{transcript} has no coverage in {}", coverage.experiment);
                continue;
            };
            match zscores(adjusted.values()) {
                Ok(z) => {
                    zscores_by_transcript.insert(transcript.clone(), z);
                }
                Err(e) => debug!("Skipping {transcript} in {}: {e}", coverage.experiment),
            }
        }

        let pooled: Vec<f64> = zscores_by_transcript
            .values()
            .flat_map(|z| interior(z).iter().copied())
            .collect();
        let threshold = percentile(&pooled, percentile_rank);

        Self {
            experiment: coverage.experiment.clone(),
            zscores: zscores_by_transcript,
            threshold,
        }
    }

    /// Per-transcript masks of positions strictly above the threshold.
    #[must_use]
    pub fn masks(&self) -> BTreeMap<TranscriptId, StallMask> {
        let Some(threshold) = self.threshold else {
            return BTreeMap::new();
        };
        self.zscores
            .iter()
            .map(|(transcript, z)| (transcript.clone(), StallMask::from_zscores(z, threshold)))
            .collect()
    }
}

/// Detects stall sites shared by all replicates of a condition.
///
/// # Examples
///
/// ```rust
/// use ribostall_core::stall::StallDetector;
///
/// assert!(StallDetector::new(99.0).is_ok());
/// assert!(StallDetector::new(120.0).is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StallDetector {
    percentile: f64,
}

impl StallDetector {
    /// # Errors
    ///
    /// Returns [`RibostallError::InvalidPercentile`] when `percentile` is
    /// outside `[0, 100]`.
    pub fn new(percentile: f64) -> Result<Self, RibostallError> {
        if !(0.0..=100.0).contains(&percentile) {
            return Err(RibostallError::InvalidPercentile(percentile));
        }
        Ok(Self { percentile })
    }

    /// Combined stall masks over `transcripts` for the given replicates.
    ///
    /// A transcript is reported only if every replicate produced a mask for
    /// it. A replicate without any interior position yields no masks, so the
    /// whole condition comes back empty.
    #[must_use]
    pub fn detect(
        &self,
        replicates: &[&ExperimentCoverage],
        transcripts: &BTreeSet<TranscriptId>,
    ) -> BTreeMap<TranscriptId, StallMask> {
        let per_replicate: Vec<BTreeMap<TranscriptId, StallMask>> = replicates
            .iter()
            .map(|coverage| {
                let scores = ReplicateScores::compute(coverage, transcripts, self.percentile);
                match scores.threshold {
                    Some(threshold) => {
                        debug!("{}: stall threshold {threshold:.4}", scores.experiment)
                    }
                    None => warn!(
                        "{}: no interior positions to pool, no stall sites reported",
                        scores.experiment
                    ),
                }
                scores.masks()
            })
            .collect();

        combine_masks(&per_replicate)
    }
}

/// Position-wise AND of the masks of every replicate.
///
/// Transcripts missing from any replicate, or whose mask lengths disagree,
/// are dropped.
#[must_use]
pub fn combine_masks(
    per_replicate: &[BTreeMap<TranscriptId, StallMask>],
) -> BTreeMap<TranscriptId, StallMask> {
    let Some((first, rest)) = per_replicate.split_first() else {
        return BTreeMap::new();
    };

    let mut combined = BTreeMap::new();
    'transcripts: for (transcript, mask) in first {
        let mut acc = mask.clone();
        for other in rest {
            let Some(next) = other.get(transcript) else {
                debug!("{transcript} missing from a replicate; excluded");
                continue 'transcripts;
            };
            match acc.and(next) {
                Some(joined) => acc = joined,
                None => {
                    warn!(
                        "{transcript} has differing coverage lengths across replicates; excluded"
                    );
                    continue 'transcripts;
                }
            }
        }
        combined.insert(transcript.clone(), acc);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CoverageRecord;

    fn experiment(name: &str, transcripts: &[(&str, Vec<u64>)]) -> ExperimentCoverage {
        let mut coverage = ExperimentCoverage::new(name);
        for (id, values) in transcripts {
            coverage.insert(*id, CoverageRecord::Computed(values.clone().into()));
        }
        coverage
    }

    fn ids(values: &[&str]) -> BTreeSet<TranscriptId> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_zscores_population_std() {
        let z = zscores(&[2, 4, 4, 4, 5, 5, 7, 9]).unwrap();
        // mean 5, population std 2
        assert!((z[0] + 1.5).abs() < 1e-12);
        assert!((z[7] - 2.0).abs() < 1e-12);
        assert!(z.iter().sum::<f64>().abs() < 1e-9);
    }

    #[test]
    fn test_zscores_degenerate() {
        assert!(matches!(
            zscores(&[3, 3, 3]),
            Err(RibostallError::DegenerateCoverage)
        ));
        assert!(zscores(&[]).is_err());
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 100.0), Some(5.0));
        assert_eq!(percentile(&values, 50.0), Some(3.0));
        let p90 = percentile(&values, 90.0).unwrap();
        assert!((p90 - 4.6).abs() < 1e-12);
        assert_eq!(percentile(&values, 101.0), None);
    }

    #[test]
    fn test_interior_excludes_margins() {
        let z: Vec<f64> = (0..40).map(f64::from).collect();
        let pool = interior(&z);
        assert_eq!(pool.len(), 7);
        assert_eq!(pool[0], 18.0);
        assert_eq!(pool[6], 24.0);
        assert!(interior(&z[..33]).is_empty());
    }

    #[test]
    fn test_margin_spike_does_not_enter_pool() {
        let mut values = vec![1u64; 60];
        values[30] = 5;
        values[2] = 500;
        values[55] = 500;

        let scores =
            ReplicateScores::compute(&experiment("a", &[("t", values)]), &ids(&["t"]), 100.0);
        let z = &scores.zscores["t"];

        // the maximum of the pool is the interior peak, not the margin spikes
        assert_eq!(scores.threshold, Some(z[30]));
        assert!(z[2] > z[30]);
        let masks = scores.masks();
        assert_eq!(masks["t"].positions(), vec![2, 55]);
    }

    #[test]
    fn test_short_transcripts_give_no_threshold() {
        let scores = ReplicateScores::compute(
            &experiment("a", &[("t", (0..30).collect())]),
            &ids(&["t"]),
            99.0,
        );
        assert!(scores.threshold.is_none());
        assert!(scores.masks().is_empty());
    }

    #[test]
    fn test_combine_masks_intersection() {
        let mut a = vec![false; 10];
        let mut b = vec![false; 10];
        for i in [3, 4, 5] {
            a[i] = true;
        }
        for i in [4, 5, 6] {
            b[i] = true;
        }
        let masks = vec![
            BTreeMap::from([("t".to_string(), StallMask::new(a))]),
            BTreeMap::from([("t".to_string(), StallMask::new(b))]),
        ];

        let combined = combine_masks(&masks);
        assert_eq!(combined["t"].positions(), vec![4, 5]);
    }

    #[test]
    fn test_combine_masks_requires_all_replicates() {
        let masks = vec![
            BTreeMap::from([
                ("t1".to_string(), StallMask::new(vec![true])),
                ("t2".to_string(), StallMask::new(vec![true])),
            ]),
            BTreeMap::from([("t1".to_string(), StallMask::new(vec![true]))]),
        ];
        let combined = combine_masks(&masks);
        assert!(combined.contains_key("t1"));
        assert!(!combined.contains_key("t2"));
        assert!(combine_masks(&[]).is_empty());
    }

    #[test]
    fn test_detect_single_replicate_flags_peak() {
        let mut values = vec![1u64; 80];
        values[40] = 50;
        let coverage = experiment("a", &[("t", values)]);

        let detector = StallDetector::new(99.0).unwrap();
        let masks = detector.detect(&[&coverage], &ids(&["t"]));
        assert_eq!(masks["t"].positions(), vec![40]);
    }

    #[test]
    fn test_detect_combines_replicates() {
        let mut a = vec![1u64; 80];
        let mut b = vec![1u64; 80];
        a[40] = 50;
        a[50] = 50;
        b[40] = 50;
        b[60] = 50;
        let rep_a = experiment("a", &[("t", a)]);
        let rep_b = experiment("b", &[("t", b)]);

        let detector = StallDetector::new(95.0).unwrap();
        let masks = detector.detect(&[&rep_a, &rep_b], &ids(&["t"]));
        assert_eq!(masks["t"].positions(), vec![40]);
    }

    #[test]
    fn test_detect_only_requested_transcripts() {
        let mut values = vec![1u64; 80];
        values[40] = 50;
        let coverage = experiment("a", &[("t", values.clone()), ("u", values)]);

        let detector = StallDetector::new(99.0).unwrap();
        let masks = detector.detect(&[&coverage], &ids(&["u"]));
        assert_eq!(masks.keys().collect::<Vec<_>>(), vec!["u"]);
    }

    #[test]
    fn test_invalid_percentile() {
        assert!(matches!(
            StallDetector::new(-1.0),
            Err(RibostallError::InvalidPercentile(_))
        ));
    }
}
