#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;

pub const UTR: usize = 30;
pub const CDS_CODONS: usize = 40;
pub const STALL_CODON: usize = 20;
pub const OFFSET: usize = 12;
/// 1-based transcript position of the stall codon's first nucleotide.
pub const STALL_SITE: usize = UTR + STALL_CODON * 3 + 1;
pub const READ_LENGTH: u32 = 28;
pub const TRANSCRIPTS: usize = 6;
pub const EXPERIMENTS: [&str; 4] = ["ctrl_1", "ctrl_2", "drug_1", "drug_2"];

/// Paths of the input tables written by [`write_fixture`].
pub struct Fixture {
    pub cds: PathBuf,
    pub offsets: PathBuf,
    pub raw: PathBuf,
    pub reference: PathBuf,
}

/// Transcript with a 30 nt leader and a 40-codon CDS of GCT, starting with
/// ATG and carrying CCG at codon 20.
pub fn transcript_sequence() -> String {
    let mut codons = vec!["GCT"; CDS_CODONS];
    codons[0] = "ATG";
    codons[STALL_CODON] = "CCG";
    format!("{}{}", "A".repeat(UTR), codons.concat())
}

/// Raw 5' end counts: uniform background with a pile-up whose P-site lands
/// on the CCG codon.
pub fn raw_counts() -> Vec<u32> {
    let mut raw = vec![2u32; UTR + CDS_CODONS * 3];
    raw[UTR + STALL_CODON * 3 - OFFSET] = 100;
    raw
}

/// Writes the CDS, offsets, raw coverage and FASTA inputs into `dir`.
///
/// `offset_experiments` lists the experiments that get an offset table.
pub fn write_fixture(dir: &Path, offset_experiments: &[&str]) -> std::io::Result<Fixture> {
    let fixture = Fixture {
        cds: dir.join("cds.tsv"),
        offsets: dir.join("offsets.tsv"),
        raw: dir.join("raw.tsv"),
        reference: dir.join("transcripts.fa"),
    };

    let mut cds = String::from("# transcript\tstart\tstop\n");
    let mut fasta = String::new();
    let mut raw = String::new();
    let counts = raw_counts()
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",");
    for t in 0..TRANSCRIPTS {
        cds.push_str(&format!("tx{t}\t{UTR}\t{}\n", UTR + CDS_CODONS * 3));
        fasta.push_str(&format!(">tx{t}\n{}\n", transcript_sequence()));
        for experiment in EXPERIMENTS {
            raw.push_str(&format!("{experiment}\ttx{t}\t{READ_LENGTH}\t{counts}\n"));
        }
    }
    let offsets: String = offset_experiments
        .iter()
        .map(|experiment| format!("{experiment}\t{READ_LENGTH}\t{OFFSET}\n"))
        .collect();

    fs::write(&fixture.cds, cds)?;
    fs::write(&fixture.offsets, offsets)?;
    fs::write(&fixture.raw, raw)?;
    fs::write(&fixture.reference, fasta)?;
    Ok(fixture)
}

/// The ribostall binary built for this test run.
pub fn ribostall() -> Command {
    Command::cargo_bin("ribostall").expect("ribostall binary should be built")
}

/// Runs `ribostall coverage` on `fixture`, writing the map to `output`.
pub fn run_coverage(fixture: &Fixture, output: &Path, extra: &[&str]) -> Command {
    let mut cmd = ribostall();
    cmd.arg("coverage")
        .arg("--raw")
        .arg(&fixture.raw)
        .arg("--cds")
        .arg(&fixture.cds)
        .arg("--offsets")
        .arg(&fixture.offsets)
        .arg("--min-len")
        .arg(READ_LENGTH.to_string())
        .arg("--max-len")
        .arg(READ_LENGTH.to_string())
        .arg("-o")
        .arg(output)
        .args(extra);
    cmd
}
