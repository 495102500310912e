//! # ribostall
//!
//! Ribosome stall-site detection and codon-context heatmaps from ribosome
//! profiling coverage.
//!
//! ## Overview
//!
//! Ribosome profiling reports where the 5' ends of ribosome-protected
//! fragments map on each transcript, separately for every read length. This
//! library turns those counts into per-nucleotide ribosome occupancy over the
//! coding region, finds positions where ribosomes pile up reproducibly across
//! replicates, and summarizes which codons surround those positions.
//!
//! ## Features
//!
//! - **Adjusted coverage**: offset-corrected, length-aggregated coverage per
//!   transcript, with a zero-padding or a reject policy for offsets that
//!   reach past the 5' end
//! - **Parallel aggregation**: transcript-level parallelism with Rayon, one
//!   independent dataset handle per worker or batch
//! - **Stall detection**: z-scores, percentile thresholds over the CDS
//!   interior, and intersection across replicates
//! - **Codon heatmaps**: raw codon counts at positions -5..=+5 around stall
//!   codons and enrichment over the transcriptome background
//! - **Codon occupancy**: coverage summed per codon for every experiment
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use ribostall_core::{RibostallAnalyzer, config::AnalysisConfig, io};
//! use ribostall_core::types::RibostallError;
//!
//! let regions = io::read_coding_regions(Path::new("cds.tsv"))?;
//! let offsets = io::read_offsets(Path::new("offsets.tsv"), 25, 35)?;
//! let dataset = Arc::new(io::read_raw_coverage(Path::new("raw.tsv.gz"), &regions)?);
//! let reference = io::ReferenceSequences::read(Path::new("transcripts.fa"), Default::default())?;
//!
//! let analyzer = RibostallAnalyzer::new(AnalysisConfig::default());
//! let factory = || Ok::<_, RibostallError>(Arc::clone(&dataset));
//! let (coverage, _summary) = analyzer.compute_coverage(&factory, &offsets)?;
//!
//! let conditions = vec![vec!["ctrl_1".to_string(), "ctrl_2".to_string()]];
//! for report in analyzer.analyze(&coverage, &conditions, &reference, &regions)? {
//!     println!("{}: {} stall sites", report.condition, report.stall_sites.len());
//! }
//! # Ok::<(), RibostallError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`config`]: Configuration options for analysis
//! - [`engine`]: Pipeline entry point
//! - [`types`]: Core data types and the error type
//! - [`results`]: Run summaries and condition reports
//! - [`dataset`]: Collaborator traits for coverage and sequences
//! - [`coverage`]: Adjusted coverage, parallel runner, codon occupancy
//! - [`stall`]: Z-scores, thresholds, replicate intersection, transcript filter
//! - [`heatmap`]: Stall windows, raw and normalized codon heatmaps
//! - [`io`]: File-backed collaborators
//! - [`output`]: Tab-separated table writers
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, RibostallError>`](types::RibostallError).
//! Configuration errors abort a run before any transcript is processed;
//! problems with a single transcript become failure markers in the
//! coverage map instead.

pub mod config;
pub mod constants;
pub mod coverage;
pub mod dataset;
pub mod engine;
pub mod heatmap;
pub mod io;
pub mod output;
pub mod results;
pub mod stall;
pub mod types;

pub use engine::RibostallAnalyzer;
pub use types::RibostallError;
