//! Parallel coverage aggregation over every transcript of an experiment.
//!
//! Workers never share a dataset handle: under
//! [`Scheduling::PerTranscript`] each Rayon worker opens one handle on first
//! use, under [`Scheduling::Batched`] each batch opens its own. A failure on
//! one transcript is recorded as a [`CoverageRecord::Failed`] marker and never
//! aborts the run. A collaborator that panics on one transcript is treated
//! the same way.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, info};
use rayon::prelude::*;

use crate::config::{OffsetPolicy, Scheduling};
use crate::coverage::CoverageAggregator;
use crate::dataset::{CoverageDataset, DatasetFactory};
use crate::results::RunSummary;
use crate::types::{
    CodingRegion, CodingRegions, CoverageMap, CoverageRecord, ExperimentCoverage, OffsetTable,
    RibostallError, TranscriptId,
};

/// Reads and validates every coding region of the dataset.
///
/// Runs before any work is scheduled so an invalid annotation aborts the run
/// instead of surfacing as per-transcript failures.
///
/// # Errors
///
/// Returns the dataset's error, or [`RibostallError::InvalidCodingRegion`]
/// for the first invalid region.
pub fn load_coding_regions<D>(dataset: &D) -> Result<CodingRegions, RibostallError>
where
    D: CoverageDataset + ?Sized,
{
    let mut regions = CodingRegions::new();
    for transcript in dataset.transcripts()? {
        let region = dataset.coding_region(&transcript)?;
        region.validate()?;
        regions.insert(transcript, region);
    }
    Ok(regions)
}

/// Checks that every experiment has an offset table.
///
/// # Errors
///
/// Returns [`RibostallError::MissingOffsetTable`] for the first experiment
/// without one.
pub fn check_offset_tables(
    experiments: &[String],
    offsets: &HashMap<String, OffsetTable>,
) -> Result<(), RibostallError> {
    match experiments.iter().find(|e| !offsets.contains_key(*e)) {
        Some(missing) => Err(RibostallError::MissingOffsetTable(missing.clone())),
        None => Ok(()),
    }
}

/// Runs the aggregator over all transcripts in parallel.
pub struct CoverageRunner<'a, F: DatasetFactory> {
    factory: &'a F,
    regions: &'a CodingRegions,
    policy: OffsetPolicy,
    scheduling: Scheduling,
}

impl<'a, F: DatasetFactory> CoverageRunner<'a, F> {
    /// `regions` is expected to come from [`load_coding_regions`].
    pub const fn new(
        factory: &'a F,
        regions: &'a CodingRegions,
        policy: OffsetPolicy,
        scheduling: Scheduling,
    ) -> Self {
        Self {
            factory,
            regions,
            policy,
            scheduling,
        }
    }

    /// Aggregates every transcript of one experiment.
    ///
    /// Uses the current Rayon pool; wrap the call in `ThreadPool::install` to
    /// bound parallelism.
    pub fn run_experiment(&self, experiment: &str, offsets: &OffsetTable) -> ExperimentCoverage {
        let aggregator = CoverageAggregator::new(offsets, self.policy);
        let work: Vec<(&TranscriptId, CodingRegion)> = self
            .regions
            .iter()
            .map(|(transcript, region)| (transcript, *region))
            .collect();

        let records: Vec<(TranscriptId, CoverageRecord)> = match self.scheduling {
            Scheduling::PerTranscript => work
                .par_iter()
                .map_init(
                    || self.factory.open(),
                    |handle, &(transcript, region)| {
                        let record = match handle {
                            Ok(dataset) => process_transcript(
                                dataset,
                                &aggregator,
                                experiment,
                                transcript,
                                region,
                            ),
                            Err(e) => handle_unavailable(experiment, transcript, e),
                        };
                        (transcript.clone(), record)
                    },
                )
                .collect(),
            Scheduling::Batched(size) => work
                .par_chunks(size.max(1))
                .flat_map_iter(|batch| {
                    let handle = self.factory.open();
                    batch
                        .iter()
                        .map(|&(transcript, region)| {
                            let record = match &handle {
                                Ok(dataset) => process_transcript(
                                    dataset,
                                    &aggregator,
                                    experiment,
                                    transcript,
                                    region,
                                ),
                                Err(e) => handle_unavailable(experiment, transcript, e),
                            };
                            (transcript.clone(), record)
                        })
                        .collect::<Vec<_>>()
                })
                .collect(),
        };

        let mut coverage = ExperimentCoverage::new(experiment);
        for (transcript, record) in records {
            coverage.insert(transcript, record);
        }
        coverage
    }

    /// Aggregates every listed experiment, one after another, each with
    /// transcript-level parallelism.
    ///
    /// # Errors
    ///
    /// Returns [`RibostallError::MissingOffsetTable`] before any work starts
    /// if an experiment has no offset table.
    pub fn run(
        &self,
        experiments: &[String],
        offsets: &HashMap<String, OffsetTable>,
    ) -> Result<(CoverageMap, RunSummary), RibostallError> {
        check_offset_tables(experiments, offsets)?;

        let mut coverage = CoverageMap::new();
        let mut summary = RunSummary::default();
        for experiment in experiments {
            let Some(table) = offsets.get(experiment) else {
                continue;
            };
            info!(
                "Aggregating {} transcripts for {} (read lengths {}-{})",
                self.regions.len(),
                experiment,
                table.min_len(),
                table.max_len()
            );

            let result = self.run_experiment(experiment, table);
            let experiment_summary = result.summary();
            info!(
                "{}: {} transcripts aggregated, {} failed",
                experiment, experiment_summary.succeeded, experiment_summary.failed
            );

            summary.experiments.push(experiment_summary);
            coverage.insert(experiment.clone(), result);
        }
        Ok((coverage, summary))
    }
}

fn process_transcript<D: CoverageDataset>(
    dataset: &D,
    aggregator: &CoverageAggregator<'_>,
    experiment: &str,
    transcript: &str,
    region: CodingRegion,
) -> CoverageRecord {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        aggregator.aggregate_transcript(dataset, transcript, experiment, region)
    }));
    match outcome {
        Ok(Ok(coverage)) => CoverageRecord::Computed(coverage),
        Ok(Err(e @ RibostallError::OffsetExceedsStart { .. })) => {
            debug!("Skipping {transcript} in {experiment}: {e}");
            CoverageRecord::failed(e)
        }
        Ok(Err(e)) => {
            error!("Error processing transcript {transcript} in {experiment}: {e}");
            CoverageRecord::failed(e)
        }
        Err(payload) => {
            let cause = panic_message(payload.as_ref());
            error!("Panic while processing transcript {transcript} in {experiment}: {cause}");
            CoverageRecord::failed(format!("panicked: {cause}"))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

fn handle_unavailable(
    experiment: &str,
    transcript: &str,
    cause: &RibostallError,
) -> CoverageRecord {
    error!("Error processing transcript {transcript} in {experiment}: no dataset handle: {cause}");
    CoverageRecord::failed(format!("dataset handle unavailable: {cause}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::dataset::InMemoryDataset;

    fn dataset() -> InMemoryDataset {
        let mut dataset = InMemoryDataset::new();
        for i in 0..40u32 {
            let id = format!("tx{i:02}");
            dataset.add_transcript(id.clone(), CodingRegion::new(20, 50).unwrap());
            dataset.add_coverage(id.clone(), "exp1", 28, vec![i; 60]);
            dataset.add_coverage(id, "exp2", 28, vec![1; 60]);
        }
        // offset 12 exceeds this start
        dataset.add_transcript("short_utr", CodingRegion::new(4, 34).unwrap());
        dataset.add_coverage("short_utr", "exp1", 28, vec![3; 40]);
        dataset.add_coverage("short_utr", "exp2", 28, vec![3; 40]);
        dataset
    }

    fn offsets() -> HashMap<String, OffsetTable> {
        let table = OffsetTable::from_pairs([(28, 12)]).unwrap();
        HashMap::from([("exp1".to_string(), table.clone()), ("exp2".to_string(), table)])
    }

    fn experiments() -> Vec<String> {
        vec!["exp1".to_string(), "exp2".to_string()]
    }

    #[test]
    fn test_load_coding_regions() {
        let regions = load_coding_regions(&dataset()).unwrap();
        assert_eq!(regions.len(), 41);
        assert_eq!(regions["short_utr"].start(), 4);
    }

    #[test]
    fn test_missing_offset_table_aborts() {
        let shared = Arc::new(dataset());
        let factory = || Ok::<_, RibostallError>(Arc::clone(&shared));
        let regions = load_coding_regions(&*shared).unwrap();
        let runner = CoverageRunner::new(
            &factory,
            &regions,
            OffsetPolicy::ZeroPad,
            Scheduling::PerTranscript,
        );

        let mut tables = offsets();
        tables.remove("exp2");
        let err = runner.run(&experiments(), &tables).unwrap_err();
        assert!(matches!(err, RibostallError::MissingOffsetTable(ref e) if e == "exp2"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_scheduling_modes_agree() {
        let shared = Arc::new(dataset());
        let factory = || Ok::<_, RibostallError>(Arc::clone(&shared));
        let regions = load_coding_regions(&*shared).unwrap();

        let results: Vec<CoverageMap> = [
            Scheduling::PerTranscript,
            Scheduling::Batched(1),
            Scheduling::Batched(7),
            Scheduling::Batched(1000),
        ]
        .into_iter()
        .map(|scheduling| {
            let runner = CoverageRunner::new(&factory, &regions, OffsetPolicy::ZeroPad, scheduling);
            runner.run(&experiments(), &offsets()).unwrap().0
        })
        .collect();

        for other in &results[1..] {
            assert_eq!(&results[0], other);
        }
        assert_eq!(results[0]["exp1"].get("tx05").unwrap().values(), &[5; 30]);
    }

    #[test]
    fn test_reject_policy_marks_failure_only_for_offending_transcript() {
        let shared = Arc::new(dataset());
        let factory = || Ok::<_, RibostallError>(Arc::clone(&shared));
        let regions = load_coding_regions(&*shared).unwrap();
        let runner = CoverageRunner::new(
            &factory,
            &regions,
            OffsetPolicy::RejectTranscript,
            Scheduling::PerTranscript,
        );

        let (coverage, summary) = runner.run(&experiments(), &offsets()).unwrap();
        let exp1 = &coverage["exp1"];
        assert!(exp1.records["short_utr"].is_failed());
        assert_eq!(exp1.succeeded(), 40);
        assert_eq!(summary.experiments.len(), 2);
        assert_eq!(summary.experiments[0].failed, 1);
        assert_eq!(summary.total_failed(), 2);
    }

    #[test]
    fn test_zero_pad_keeps_short_utr_transcript() {
        let shared = Arc::new(dataset());
        let factory = || Ok::<_, RibostallError>(Arc::clone(&shared));
        let regions = load_coding_regions(&*shared).unwrap();
        let runner = CoverageRunner::new(
            &factory,
            &regions,
            OffsetPolicy::ZeroPad,
            Scheduling::Batched(4),
        );

        let exp = runner.run_experiment("exp1", &offsets()["exp1"]);
        let values = exp.get("short_utr").unwrap().values();
        assert_eq!(values.len(), 30);
        assert_eq!(&values[..8], &[0; 8]);
        assert_eq!(&values[8..], &[3; 22]);
    }

    #[test]
    fn test_failing_handle_marks_whole_unit() {
        let shared = Arc::new(dataset());
        let opened = AtomicUsize::new(0);
        let factory = || {
            if opened.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(RibostallError::Dataset("cannot open".to_string()))
            } else {
                Ok(Arc::clone(&shared))
            }
        };
        let regions = load_coding_regions(&*shared).unwrap();
        let runner = CoverageRunner::new(
            &factory,
            &regions,
            OffsetPolicy::ZeroPad,
            Scheduling::Batched(10),
        );

        let exp = runner.run_experiment("exp1", &offsets()["exp1"]);
        assert_eq!(exp.records.len(), 41);
        // exactly one batch lost its handle: one of the four full batches or
        // the trailing single transcript
        assert!(exp.failed() == 10 || exp.failed() == 1);
        assert_eq!(exp.failed() + exp.succeeded(), 41);
        assert_eq!(opened.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_records_ordered_by_transcript() {
        let shared = Arc::new(dataset());
        let factory = || Ok::<_, RibostallError>(Arc::clone(&shared));
        let regions = load_coding_regions(&*shared).unwrap();
        let runner = CoverageRunner::new(
            &factory,
            &regions,
            OffsetPolicy::ZeroPad,
            Scheduling::PerTranscript,
        );

        let exp = runner.run_experiment("exp2", &offsets()["exp2"]);
        let ids: Vec<&String> = exp.records.keys().collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    /// Panics on one transcript and delegates everything else.
    struct Flaky(Arc<InMemoryDataset>);

    impl CoverageDataset for Flaky {
        fn transcripts(&self) -> Result<Vec<TranscriptId>, RibostallError> {
            self.0.transcripts()
        }

        fn experiments(&self) -> Result<Vec<String>, RibostallError> {
            self.0.experiments()
        }

        fn coding_region(&self, transcript: &str) -> Result<CodingRegion, RibostallError> {
            self.0.coding_region(transcript)
        }

        fn raw_coverage(
            &self,
            transcript: &str,
            experiment: &str,
            read_length: u32,
        ) -> Result<Vec<u32>, RibostallError> {
            if transcript == "tx07" {
                panic!("corrupt record for {transcript}");
            }
            self.0.raw_coverage(transcript, experiment, read_length)
        }
    }

    #[test]
    fn test_panicking_collaborator_fails_only_its_transcript() {
        let shared = Arc::new(dataset());
        let factory = || Ok::<_, RibostallError>(Flaky(Arc::clone(&shared)));
        let regions = load_coding_regions(&*shared).unwrap();

        for scheduling in [Scheduling::PerTranscript, Scheduling::Batched(8)] {
            let runner = CoverageRunner::new(&factory, &regions, OffsetPolicy::ZeroPad, scheduling);
            let (coverage, summary) = runner.run(&experiments(), &offsets()).unwrap();

            let exp1 = &coverage["exp1"];
            assert_eq!(exp1.failed(), 1);
            assert_eq!(exp1.succeeded(), 40);
            match &exp1.records["tx07"] {
                CoverageRecord::Failed { reason } => {
                    assert!(reason.contains("corrupt record for tx07"));
                }
                other => panic!("expected a failure marker, got {other:?}"),
            }
            assert_eq!(exp1.get("tx08").unwrap().values(), &[8; 30]);
            assert_eq!(summary.total_failed(), 2);
        }
    }
}
