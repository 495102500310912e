use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{info, warn};

use crate::config::AnalysisConfig;
use crate::coverage::occupancy::{CodonOccupancy, codon_occupancy, codon_occupancy_for};
use crate::coverage::runner::{CoverageRunner, check_offset_tables, load_coding_regions};
use crate::dataset::{CoverageDataset, DatasetFactory, SequenceProvider};
use crate::heatmap::{BackgroundCodonFrequency, HeatmapBuilder, RawHeatmap};
use crate::results::{ConditionReport, RunSummary};
use crate::stall::StallDetector;
use crate::stall::filter::filter_transcripts;
use crate::types::{CodingRegions, CoverageMap, OffsetTable, RibostallError, TranscriptId};

/// High-level entry point running the ribostall pipeline.
///
/// The analyzer holds only its configuration; every call receives its
/// collaborators explicitly and nothing is kept between calls.
///
/// # Examples
///
/// ```rust
/// use std::collections::HashMap;
/// use std::sync::Arc;
///
/// use ribostall_core::RibostallAnalyzer;
/// use ribostall_core::config::AnalysisConfig;
/// use ribostall_core::dataset::InMemoryDataset;
/// use ribostall_core::types::{CodingRegion, OffsetTable, RibostallError};
///
/// let mut dataset = InMemoryDataset::new();
/// dataset.add_transcript("tx1", CodingRegion::new(30, 60)?);
/// dataset.add_coverage("tx1", "ctrl_1", 28, vec![1; 80]);
/// let dataset = Arc::new(dataset);
///
/// let offsets = HashMap::from([("ctrl_1".to_string(), OffsetTable::from_pairs([(28, 12)])?)]);
/// let analyzer = RibostallAnalyzer::new(AnalysisConfig::default());
/// let (coverage, summary) =
///     analyzer.compute_coverage(&|| Ok::<_, RibostallError>(Arc::clone(&dataset)), &offsets)?;
///
/// assert_eq!(coverage["ctrl_1"].get("tx1").map(|c| c.len()), Some(30));
/// assert_eq!(summary.total_failed(), 0);
/// # Ok::<(), RibostallError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct RibostallAnalyzer {
    /// Configuration options for the analysis
    pub config: AnalysisConfig,
}

impl RibostallAnalyzer {
    pub const fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// Aggregates adjusted coverage for every experiment of the dataset.
    ///
    /// Configuration is validated before any transcript is processed: the
    /// analysis settings, every coding region, and the presence of an offset
    /// table per experiment. After that, per-transcript problems only produce
    /// failure markers.
    ///
    /// # Errors
    ///
    /// Configuration errors (see [`RibostallError::is_configuration`]), a
    /// dataset that cannot be opened or listed, or a thread pool that cannot
    /// be built.
    pub fn compute_coverage<F>(
        &self,
        factory: &F,
        offsets: &HashMap<String, OffsetTable>,
    ) -> Result<(CoverageMap, RunSummary), RibostallError>
    where
        F: DatasetFactory,
    {
        let experiments = factory.open()?.experiments()?;
        self.compute_coverage_for(factory, &experiments, offsets)
    }

    /// Like [`RibostallAnalyzer::compute_coverage`], restricted to
    /// `experiments`.
    ///
    /// # Errors
    ///
    /// Same as [`RibostallAnalyzer::compute_coverage`].
    pub fn compute_coverage_for<F>(
        &self,
        factory: &F,
        experiments: &[String],
        offsets: &HashMap<String, OffsetTable>,
    ) -> Result<(CoverageMap, RunSummary), RibostallError>
    where
        F: DatasetFactory,
    {
        self.config.validate()?;
        check_offset_tables(experiments, offsets)?;
        let regions = {
            let dataset = factory.open()?;
            load_coding_regions(&dataset)?
        };
        info!(
            "Computing adjusted coverage for {} experiments over {} transcripts",
            experiments.len(),
            regions.len()
        );

        let runner = CoverageRunner::new(
            factory,
            &regions,
            self.config.offset_policy,
            self.config.scheduling,
        );
        match self.config.num_threads {
            Some(num_threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .map_err(|e| {
                        RibostallError::ThreadPool(format!("Failed to configure thread pool: {e}"))
                    })?;
                pool.install(|| runner.run(experiments, offsets))
            }
            None => runner.run(experiments, offsets),
        }
    }

    /// Detects stall sites and builds codon heatmaps for each condition.
    ///
    /// `conditions` lists the replicate experiments of each condition. The
    /// analysed transcripts are the top transcripts by coverage density
    /// shared by every experiment of every condition.
    ///
    /// # Errors
    ///
    /// - [`RibostallError::InvalidPercentile`] for an invalid configuration
    /// - [`RibostallError::EmptyCondition`] for a condition without replicates
    /// - [`RibostallError::UnknownExperiment`] for a replicate missing from
    ///   `coverage`
    /// - [`RibostallError::NoStallWindows`] when a condition has combined
    ///   masks but no codon window is collected
    pub fn analyze<S>(
        &self,
        coverage: &CoverageMap,
        conditions: &[Vec<String>],
        sequences: &S,
        regions: &CodingRegions,
    ) -> Result<Vec<ConditionReport>, RibostallError>
    where
        S: SequenceProvider + ?Sized,
    {
        self.config.validate()?;
        if conditions.iter().any(Vec::is_empty) {
            return Err(RibostallError::EmptyCondition);
        }

        let experiments: Vec<&String> = conditions.iter().flatten().collect();
        let transcripts = filter_transcripts(coverage, &experiments, self.config.top_transcripts)?;

        conditions
            .iter()
            .map(|replicates| {
                self.analyze_condition(coverage, replicates, &transcripts, sequences, regions)
            })
            .collect()
    }

    /// Runs detection and heatmap construction for one condition over a
    /// fixed transcript set.
    ///
    /// A condition without combined masks, because the transcript set is
    /// empty or no replicate has an interior threshold pool, yields an empty
    /// report. Masks without a single collected window are an error.
    ///
    /// # Errors
    ///
    /// Same as [`RibostallAnalyzer::analyze`].
    pub fn analyze_condition<S>(
        &self,
        coverage: &CoverageMap,
        replicates: &[String],
        transcripts: &BTreeSet<TranscriptId>,
        sequences: &S,
        regions: &CodingRegions,
    ) -> Result<ConditionReport, RibostallError>
    where
        S: SequenceProvider + ?Sized,
    {
        let condition = replicates
            .first()
            .ok_or(RibostallError::EmptyCondition)?
            .clone();
        let replicate_coverage = replicates
            .iter()
            .map(|experiment| {
                coverage
                    .get(experiment)
                    .ok_or_else(|| RibostallError::UnknownExperiment(experiment.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let detector = StallDetector::new(self.config.percentile)?;
        let stall_masks = detector.detect(&replicate_coverage, transcripts);
        let flagged: usize = stall_masks.values().map(|mask| mask.count()).sum();
        info!(
            "{condition}: {} transcripts with combined masks, {flagged} stall positions",
            stall_masks.len()
        );

        if stall_masks.is_empty() {
            warn!("{condition}: no transcripts with combined masks; reporting empty heatmaps");
            return Ok(ConditionReport {
                condition,
                replicates: replicates.to_vec(),
                stall_masks,
                stall_sites: Vec::new(),
                raw: RawHeatmap::default(),
                normalized: Default::default(),
                background: BackgroundCodonFrequency::from_transcripts(
                    transcripts,
                    sequences,
                    regions,
                ),
            });
        }

        let heatmaps = HeatmapBuilder::new(self.config.stall_codon_rule).build(
            &stall_masks,
            transcripts,
            sequences,
            regions,
        )?;

        Ok(ConditionReport {
            condition,
            replicates: replicates.to_vec(),
            stall_masks,
            stall_sites: heatmaps.sites,
            raw: heatmaps.raw,
            normalized: heatmaps.normalized,
            background: heatmaps.background,
        })
    }

    /// Codon occupancy of every experiment in `coverage`.
    pub fn codon_occupancy<S>(
        &self,
        coverage: &CoverageMap,
        sequences: &S,
        regions: &CodingRegions,
    ) -> CodonOccupancy
    where
        S: SequenceProvider + ?Sized,
    {
        codon_occupancy(coverage, sequences, regions)
    }

    /// Codon occupancy of `experiments` in the given order, e.g. the
    /// dataset order reported by [`RunSummary`].
    pub fn codon_occupancy_for<E, S>(
        &self,
        coverage: &CoverageMap,
        experiments: &[E],
        sequences: &S,
        regions: &CodingRegions,
    ) -> CodonOccupancy
    where
        E: AsRef<str>,
        S: SequenceProvider + ?Sized,
    {
        codon_occupancy_for(coverage, experiments, sequences, regions)
    }
}

/// Splits `experiments` into conditions by the name left of the last `_`,
/// e.g. `ctrl_1` and `ctrl_2` form one condition.
///
/// Conditions keep the order of their first replicate.
#[must_use]
pub fn group_replicates(experiments: &[String]) -> Vec<Vec<String>> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for experiment in experiments {
        let base = experiment
            .rsplit_once('_')
            .map_or(experiment.as_str(), |(base, _)| base);
        if !groups.contains_key(base) {
            order.push(base);
        }
        groups.entry(base).or_default().push(experiment.clone());
    }
    order
        .into_iter()
        .filter_map(|base| groups.remove(base))
        .collect()
}
