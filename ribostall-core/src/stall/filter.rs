//! Selection of well-covered transcripts shared by all experiments.

use std::collections::BTreeSet;

use log::{info, warn};

use crate::types::{CoverageMap, ExperimentCoverage, RibostallError, TranscriptId};

/// The `top_n` transcripts of one experiment by coverage density.
///
/// Ties are broken by transcript identifier so the selection is stable.
/// Failed records are ignored.
#[must_use]
pub fn top_transcripts_by_density(
    coverage: &ExperimentCoverage,
    top_n: usize,
) -> BTreeSet<TranscriptId> {
    let mut ranked: Vec<(&TranscriptId, f64)> = coverage
        .computed()
        .map(|(transcript, adjusted)| (transcript, adjusted.density()))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(top_n)
        .map(|(transcript, _)| transcript.clone())
        .collect()
}

/// Intersection of the per-experiment top-`top_n` sets.
///
/// # Errors
///
/// Returns [`RibostallError::UnknownExperiment`] when an experiment is not
/// in `coverage`.
pub fn filter_transcripts<S: AsRef<str>>(
    coverage: &CoverageMap,
    experiments: &[S],
    top_n: usize,
) -> Result<BTreeSet<TranscriptId>, RibostallError> {
    let mut selected: Option<BTreeSet<TranscriptId>> = None;
    for experiment in experiments {
        let experiment = experiment.as_ref();
        let records = coverage
            .get(experiment)
            .ok_or_else(|| RibostallError::UnknownExperiment(experiment.to_string()))?;
        let top = top_transcripts_by_density(records, top_n);

        selected = Some(match selected {
            None => top,
            Some(previous) => previous.intersection(&top).cloned().collect(),
        });
    }

    let selected = selected.unwrap_or_default();
    if selected.is_empty() {
        warn!("No transcript is among the top {top_n} of every experiment");
    } else {
        info!(
            "{} transcripts shared by the top {top_n} of {} experiments",
            selected.len(),
            experiments.len()
        );
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CoverageRecord;

    fn experiment(name: &str, densities: &[(&str, u64)]) -> ExperimentCoverage {
        let mut coverage = ExperimentCoverage::new(name);
        for (id, value) in densities {
            coverage.insert(*id, CoverageRecord::Computed(vec![*value; 10].into()));
        }
        coverage
    }

    #[test]
    fn test_top_by_density() {
        let exp = experiment("a", &[("t1", 5), ("t2", 9), ("t3", 1), ("t4", 7)]);
        let top = top_transcripts_by_density(&exp, 2);
        assert_eq!(top, BTreeSet::from(["t2".to_string(), "t4".to_string()]));
    }

    #[test]
    fn test_ties_break_by_identifier() {
        let exp = experiment("a", &[("t3", 5), ("t1", 5), ("t2", 5)]);
        let top = top_transcripts_by_density(&exp, 2);
        assert_eq!(top, BTreeSet::from(["t1".to_string(), "t2".to_string()]));
    }

    #[test]
    fn test_failed_records_are_ignored() {
        let mut exp = experiment("a", &[("t1", 1)]);
        exp.insert("t0", CoverageRecord::failed("offset"));
        let top = top_transcripts_by_density(&exp, 5);
        assert_eq!(top.len(), 1);
    }

    #[test]
    fn test_intersection_across_experiments() {
        let coverage = CoverageMap::from([
            (
                "a".to_string(),
                experiment("a", &[("t1", 9), ("t2", 8), ("t3", 1)]),
            ),
            (
                "b".to_string(),
                experiment("b", &[("t1", 1), ("t2", 8), ("t3", 9)]),
            ),
        ]);

        let shared = filter_transcripts(&coverage, &["a", "b"], 2).unwrap();
        assert_eq!(shared, BTreeSet::from(["t2".to_string()]));

        let disjoint = filter_transcripts(&coverage, &["a", "b"], 1).unwrap();
        assert!(disjoint.is_empty());
    }

    #[test]
    fn test_unknown_experiment() {
        let coverage = CoverageMap::new();
        assert!(matches!(
            filter_transcripts(&coverage, &["missing"], 10),
            Err(RibostallError::UnknownExperiment(_))
        ));
        assert!(filter_transcripts::<&str>(&coverage, &[], 10).unwrap().is_empty());
    }
}
