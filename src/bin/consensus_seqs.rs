//! MTB Consensus Sequence Tool
//!
//! Aligns paired-end reads against the reference, calls variants and writes
//! the consensus sequence of every target locus to a multi-FASTA file.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, Command};
use log::info;
use mtb_amr_tools::config::{
    init_logging, output_arg, parse_positive_int, path_value, reference_arg, stats_arg,
    workdir_arg, ALIGNMENT_FILES_DIR, CONSENSUS_SCRIPT, VARIANT_CALLING_SCRIPT, VERSION,
};
use mtb_amr_tools::consensus::{write_fasta, ConsensusExtractor};
use mtb_amr_tools::external::SystemRunner;
use mtb_amr_tools::regions::read_regions_path;
use mtb_amr_tools::{sample_name, ConsensusStats, StatsReport};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

fn main() -> Result<()> {
    init_logging()?;

    let matches = Command::new("mtb-consensus-seqs")
        .version(VERSION)
        .about(
            "Align reads against the reference, call variants and write the consensus \
             sequences of the target loci to a multi-FASTA file",
        )
        .arg(
            Arg::new("forward_reads")
                .value_name("FORWARD_READS")
                .value_parser(value_parser!(PathBuf))
                .help("FASTQ file with the forward reads")
                .required(true),
        )
        .arg(
            Arg::new("reverse_reads")
                .value_name("REVERSE_READS")
                .value_parser(value_parser!(PathBuf))
                .help("FASTQ file with the reverse reads")
                .required(true),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .long("threads")
                .value_name("INT")
                .value_parser(parse_positive_int)
                .help("Threads to use for alignment and variant calling")
                .default_value("1"),
        )
        .arg(
            Arg::new("regions")
                .short('r')
                .long("regions")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("CSV file with the target loci (header 'locus,start,end', 1-based)")
                .required(true),
        )
        .arg(output_arg(true, "Output multi-FASTA file"))
        .arg(reference_arg())
        .arg(
            Arg::new("variant_calling_script")
                .long("variant-calling-script")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Script aligning the reads and calling variants")
                .default_value(VARIANT_CALLING_SCRIPT),
        )
        .arg(
            Arg::new("consensus_script")
                .long("consensus-script")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Script printing the consensus sequence of one region")
                .default_value(CONSENSUS_SCRIPT),
        )
        .arg(workdir_arg())
        .arg(stats_arg())
        .get_matches();

    // Parse arguments
    let forward_reads = path_value(&matches, "forward_reads")?;
    let reverse_reads = path_value(&matches, "reverse_reads")?;
    let regions_path = path_value(&matches, "regions")?;
    let output = path_value(&matches, "output")?;
    let workdir = path_value(&matches, "workdir")?;
    let threads = *matches.get_one::<usize>("threads").unwrap_or(&1);
    let stats_file = matches.get_one::<PathBuf>("stats").cloned();

    info!("🧬 MTB Consensus Sequences");
    info!("Forward reads: {}", forward_reads.display());
    info!("Reverse reads: {}", reverse_reads.display());
    info!("Threads: {}", threads);

    let regions = read_regions_path(&regions_path)
        .with_context(|| format!("failed to read regions from {}", regions_path.display()))?;
    info!("Target loci: {}", regions.len());

    std::fs::create_dir_all(workdir.join(ALIGNMENT_FILES_DIR))
        .with_context(|| format!("failed to prepare {}", workdir.display()))?;

    let runner = SystemRunner;
    let extractor = ConsensusExtractor {
        runner: &runner,
        reference: path_value(&matches, "reference")?,
        variant_calling_script: path_value(&matches, "variant_calling_script")?,
        consensus_script: path_value(&matches, "consensus_script")?,
        workdir,
        threads,
    };
    let sequences = extractor.extract(&forward_reads, &reverse_reads, &regions)?;

    let mut writer = BufWriter::new(
        File::create(&output).with_context(|| format!("failed to create {}", output.display()))?,
    );
    write_fasta(&sequences, &mut writer)?;
    writer.flush()?;
    info!("💾 Consensus sequences saved to: {}", output.display());

    let total_bases: usize = sequences.iter().map(|s| s.sequence.len()).sum();
    info!("📊 {} loci, {} bases", sequences.len(), total_bases);

    if let Some(stats_file) = stats_file {
        let report = ConsensusStats {
            sample_name: sample_name(&forward_reads),
            loci: sequences.len(),
            total_bases,
            threads,
        };
        report.write_json(&stats_file)?;
        info!("💾 Statistics saved to: {}", stats_file.display());
    }

    Ok(())
}
