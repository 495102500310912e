//! # ribostall - Command-Line Stall-Site Analysis
//!
//! A command-line interface for ribosome stall-site detection and codon
//! heatmaps from ribosome profiling coverage.
//!
//! ## Usage
//!
//! ```bash
//! # Offset-corrected coverage for every experiment
//! ribostall coverage --raw raw.tsv.gz --cds cds.tsv --offsets offsets.tsv -o coverage.tsv.gz
//!
//! # Stall sites and codon heatmaps per condition
//! ribostall heatmap --coverage coverage.tsv.gz --cds cds.tsv --reference transcripts.fa \
//!     --condition "ctrl_1 ctrl_2" --condition "drug_1 drug_2" --outdir heatmaps/
//!
//! # Codon occupancy table
//! ribostall occupancy --coverage coverage.tsv.gz --cds cds.tsv --reference transcripts.fa
//! ```
//!
//! ## Global options
//!
//! - `--level <LEVEL>`: Log level: error, warn, info, debug, trace (default: info)
//! - `-t, --threads <N>`: Worker threads for coverage aggregation (default: all cores)
//!
//! ## Input tables
//!
//! All tables are tab separated; `.gz` files are read transparently.
//!
//! - CDS: `transcript  start  stop` (0-based, half open)
//! - Offsets: `experiment  read_length  offset`
//! - Raw coverage: `experiment  transcript  read_length  counts` (comma separated)

use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use log::{Level, info};
use ribostall_core::config::{AnalysisConfig, OffsetPolicy, Scheduling, StallCodonRule};
use ribostall_core::constants::{DEFAULT_PERCENTILE, DEFAULT_TOP_TRANSCRIPTS};
use ribostall_core::engine::group_replicates;
use ribostall_core::io::{
    self as rio, IdentifierStyle, ReferenceSequences, load_coverage_map, save_coverage_map,
};
use ribostall_core::output::{ReportTable, write_occupancy, write_report};
use ribostall_core::{RibostallAnalyzer, RibostallError};

type CliResult<T> = Result<T, Box<dyn Error>>;

fn file_arg(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(long)
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .required(true)
        .help(help)
}

fn reference_args(command: Command) -> Command {
    command
        .arg(file_arg("coverage", "coverage", "Coverage map written by `ribostall coverage`"))
        .arg(file_arg("cds", "cds", "CDS table: transcript, start, stop"))
        .arg(file_arg("reference", "reference", "Transcript FASTA"))
        .arg(
            Arg::new("alias-field")
                .long("alias-field")
                .value_name("INDEX")
                .value_parser(value_parser!(usize))
                .help("Use this 0-based field of '|'-delimited FASTA ids as transcript id"),
        )
}

fn cli() -> Command {
    Command::new("ribostall")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Ribosome stall-site detection and codon-context heatmaps")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("level")
                .long("level")
                .value_name("LEVEL")
                .value_parser(value_parser!(Level))
                .default_value("info")
                .global(true)
                .help("Log level: error, warn, info, debug, trace"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .global(true)
                .help("Worker threads for coverage aggregation (default: all cores)"),
        )
        .subcommand(
            Command::new("coverage")
                .about("Compute offset-corrected coverage for every experiment")
                .arg(file_arg("raw", "raw", "Raw coverage table"))
                .arg(file_arg("cds", "cds", "CDS table: transcript, start, stop"))
                .arg(file_arg(
                    "offsets",
                    "offsets",
                    "Offsets table: experiment, read length, offset",
                ))
                .arg(
                    Arg::new("min-len")
                        .long("min-len")
                        .value_name("LEN")
                        .value_parser(value_parser!(u32))
                        .default_value("25")
                        .help("Shortest read length to aggregate"),
                )
                .arg(
                    Arg::new("max-len")
                        .long("max-len")
                        .value_name("LEN")
                        .value_parser(value_parser!(u32))
                        .default_value("35")
                        .help("Longest read length to aggregate"),
                )
                .arg(
                    Arg::new("policy")
                        .long("policy")
                        .value_name("POLICY")
                        .value_parser(["zero-pad", "reject"])
                        .default_value("zero-pad")
                        .help("Offsets beyond the CDS start: zero-pad or reject the transcript"),
                )
                .arg(
                    Arg::new("batch-size")
                        .long("batch-size")
                        .value_name("N")
                        .value_parser(value_parser!(usize))
                        .num_args(0..=1)
                        .default_missing_value("64")
                        .help("Process transcripts in batches of N (N defaults to 64)"),
                )
                .arg(
                    Arg::new("experiment")
                        .short('e')
                        .long("experiment")
                        .value_name("NAME")
                        .action(ArgAction::Append)
                        .help("Only aggregate this experiment (repeatable)"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .required(true)
                        .help("Coverage map output (.gz for compression)"),
                ),
        )
        .subcommand(
            reference_args(
                Command::new("heatmap").about("Detect stall sites and build codon heatmaps"),
            )
            .arg(
                Arg::new("condition")
                    .short('c')
                    .long("condition")
                    .value_name("REPLICATES")
                    .action(ArgAction::Append)
                    .help("Replicates of one condition, space separated (repeatable)"),
            )
            .arg(
                Arg::new("top")
                    .long("top")
                    .value_name("N")
                    .value_parser(value_parser!(usize))
                    .default_value("100")
                    .help("Keep the N highest-density transcripts per experiment"),
            )
            .arg(
                Arg::new("percentile")
                    .short('p')
                    .long("percentile")
                    .value_name("P")
                    .value_parser(value_parser!(f64))
                    .default_value("99")
                    .help("Z-score percentile used as stall threshold"),
            )
            .arg(
                Arg::new("rule")
                    .long("rule")
                    .value_name("RULE")
                    .value_parser(["any", "majority"])
                    .default_value("any")
                    .help("Stall codon rule: any or majority of its nucleotides flagged"),
            )
            .arg(
                Arg::new("outdir")
                    .short('o')
                    .long("outdir")
                    .value_name("DIR")
                    .value_parser(value_parser!(PathBuf))
                    .required(true)
                    .help("Directory for heatmap and stall-site tables"),
            ),
        )
        .subcommand(
            reference_args(Command::new("occupancy").about("Sum coverage per codon"))
                .arg(
                    Arg::new("experiment")
                        .short('e')
                        .long("experiment")
                        .value_name("NAME")
                        .action(ArgAction::Append)
                        .help("Experiment column (repeatable); the first sets the transcriptome"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .value_parser(value_parser!(PathBuf))
                        .help("Output file (default: stdout)"),
                ),
        )
}

fn path<'a>(matches: &'a ArgMatches, id: &str) -> CliResult<&'a Path> {
    matches
        .get_one::<PathBuf>(id)
        .map(PathBuf::as_path)
        .ok_or_else(|| format!("missing --{id}").into())
}

fn identifier_style(matches: &ArgMatches) -> IdentifierStyle {
    matches
        .get_one::<usize>("alias-field")
        .map_or(IdentifierStyle::RecordId, |&field| IdentifierStyle::PipeField(field))
}

fn run_coverage(matches: &ArgMatches, config: AnalysisConfig) -> CliResult<()> {
    let min_len = matches.get_one::<u32>("min-len").copied().unwrap_or(25);
    let max_len = matches.get_one::<u32>("max-len").copied().unwrap_or(35);
    let config = AnalysisConfig {
        offset_policy: match matches.get_one::<String>("policy").map(String::as_str) {
            Some("reject") => OffsetPolicy::RejectTranscript,
            _ => OffsetPolicy::ZeroPad,
        },
        scheduling: matches
            .get_one::<usize>("batch-size")
            .map_or(Scheduling::PerTranscript, |&n| Scheduling::Batched(n)),
        ..config
    };

    let regions = rio::read_coding_regions(path(matches, "cds")?)?;
    let offsets = rio::read_offsets(path(matches, "offsets")?, min_len, max_len)?;
    let dataset = Arc::new(rio::read_raw_coverage(path(matches, "raw")?, &regions)?);
    let factory = || Ok::<_, RibostallError>(Arc::clone(&dataset));

    let analyzer = RibostallAnalyzer::new(config);
    let (coverage, summary) = match matches.get_many::<String>("experiment") {
        Some(experiments) => {
            let experiments: Vec<String> = experiments.cloned().collect();
            analyzer.compute_coverage_for(&factory, &experiments, &offsets)?
        }
        None => analyzer.compute_coverage(&factory, &offsets)?,
    };

    save_coverage_map(path(matches, "output")?, &coverage)?;
    info!(
        "Coverage complete: {} transcripts aggregated, {} failed across {} experiments",
        summary.total_succeeded(),
        summary.total_failed(),
        summary.experiments.len()
    );
    Ok(())
}

fn run_heatmap(matches: &ArgMatches, config: AnalysisConfig) -> CliResult<()> {
    let config = AnalysisConfig {
        top_transcripts: matches
            .get_one::<usize>("top")
            .copied()
            .unwrap_or(DEFAULT_TOP_TRANSCRIPTS),
        percentile: matches
            .get_one::<f64>("percentile")
            .copied()
            .unwrap_or(DEFAULT_PERCENTILE),
        stall_codon_rule: match matches.get_one::<String>("rule").map(String::as_str) {
            Some("majority") => StallCodonRule::Majority,
            _ => StallCodonRule::Any,
        },
        ..config
    };

    let coverage = load_coverage_map(path(matches, "coverage")?)?;
    let regions = rio::read_coding_regions(path(matches, "cds")?)?;
    let reference =
        ReferenceSequences::read(path(matches, "reference")?, identifier_style(matches))?;

    let conditions: Vec<Vec<String>> = match matches.get_many::<String>("condition") {
        Some(values) => values
            .map(|value| {
                value
                    .split([' ', ','])
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .collect(),
        None => group_replicates(&coverage.keys().cloned().collect::<Vec<_>>()),
    };

    let analyzer = RibostallAnalyzer::new(config);
    let reports = analyzer.analyze(&coverage, &conditions, &reference, &regions)?;

    let outdir = path(matches, "outdir")?;
    fs::create_dir_all(outdir)?;
    for report in &reports {
        for table in ReportTable::ALL {
            let target = outdir.join(format!("{}_{}", report.condition, table.suffix()));
            let mut writer = BufWriter::new(File::create(&target)?);
            write_report(&mut writer, report, table)?;
            writer.flush()?;
        }
        info!(
            "{}: {} stall sites in {} transcripts",
            report.condition,
            report.stall_sites.len(),
            report.stalled_transcripts()
        );
    }
    Ok(())
}

fn run_occupancy(matches: &ArgMatches, config: AnalysisConfig) -> CliResult<()> {
    let coverage = load_coverage_map(path(matches, "coverage")?)?;
    let regions = rio::read_coding_regions(path(matches, "cds")?)?;
    let reference =
        ReferenceSequences::read(path(matches, "reference")?, identifier_style(matches))?;

    let analyzer = RibostallAnalyzer::new(config);
    let occupancy = match matches.get_many::<String>("experiment") {
        Some(experiments) => {
            let experiments: Vec<&String> = experiments.collect();
            analyzer.codon_occupancy_for(&coverage, &experiments, &reference, &regions)
        }
        None => analyzer.codon_occupancy(&coverage, &reference, &regions),
    };

    let mut writer: Box<dyn Write> = match matches.get_one::<PathBuf>("output") {
        Some(output) => Box::new(BufWriter::new(File::create(output)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    write_occupancy(&mut writer, &occupancy)?;
    writer.flush()?;
    Ok(())
}

/// Main entry point for the ribostall CLI application.
///
/// Parses command-line arguments, sets up logging, and dispatches to the
/// requested subcommand.
fn main() -> Result<(), Box<dyn Error>> {
    let matches = cli().get_matches();
    let Some((name, sub)) = matches.subcommand() else {
        return Err("no subcommand given".into());
    };

    let level = sub.get_one::<Level>("level").copied().unwrap_or(Level::Info);
    simple_logger::init_with_level(level)?;

    let config = AnalysisConfig {
        num_threads: sub.get_one::<usize>("threads").copied(),
        ..Default::default()
    };

    match name {
        "coverage" => run_coverage(sub, config),
        "heatmap" => run_heatmap(sub, config),
        "occupancy" => run_occupancy(sub, config),
        other => Err(format!("unknown subcommand {other}").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ribostall_core::constants::DEFAULT_BATCH_SIZE;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_global_options_reach_subcommands() {
        let matches = cli()
            .try_get_matches_from([
                "ribostall", "--level", "debug", "-t", "3", "occupancy", "--coverage", "c.tsv",
                "--cds", "cds.tsv", "--reference", "ref.fa",
            ])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<Level>("level"), Some(&Level::Debug));
        assert_eq!(sub.get_one::<usize>("threads"), Some(&3));
    }

    fn coverage_matches(extra: &[&str]) -> ArgMatches {
        let mut args = vec![
            "ribostall", "coverage", "--raw", "raw.tsv", "--cds", "cds.tsv", "--offsets",
            "offsets.tsv",
        ];
        args.extend_from_slice(extra);
        args.extend(["-o", "coverage.tsv"]);
        let matches = cli().try_get_matches_from(args).unwrap();
        matches.subcommand_matches("coverage").unwrap().clone()
    }

    #[test]
    fn test_batch_size_without_value_uses_default() {
        let sub = coverage_matches(&["--batch-size"]);
        assert_eq!(sub.get_one::<usize>("batch-size"), Some(&DEFAULT_BATCH_SIZE));

        let sub = coverage_matches(&["--batch-size", "8"]);
        assert_eq!(sub.get_one::<usize>("batch-size"), Some(&8));

        assert_eq!(coverage_matches(&[]).get_one::<usize>("batch-size"), None);
    }
}
