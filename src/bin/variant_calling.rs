//! MTB Variant Calling Tool
//!
//! Genotypes a list of target variants from a sorted BAM/CRAM file and replaces
//! missing genotypes / non-calls with the targets' allele frequencies, in the
//! variant order the genotype models expect.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, Command};
use log::info;
use mtb_amr_tools::config::{
    init_logging, output_arg, path_value, stats_arg, GET_GENOTYPES_SCRIPT, VERSION,
};
use mtb_amr_tools::external::SystemRunner;
use mtb_amr_tools::reconcile::{reconcile, DEFAULT_DEPTH_THRESHOLD};
use mtb_amr_tools::variants::{call_genotypes, read_calls_path, TargetSet};
use mtb_amr_tools::{sample_name, StatsReport, VariantCallingStats};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

fn main() -> Result<()> {
    init_logging()?;

    let matches = Command::new("mtb-variant-calling")
        .version(VERSION)
        .about(
            "Calls the genotypes of the target variants in a sorted BAM/CRAM file and replaces \
             missing genotypes / noncalls with the corresponding allele frequencies",
        )
        .arg(
            Arg::new("bam")
                .short('b')
                .long("bam")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Sorted BAM/CRAM file of reads aligned against the reference")
                .required_unless_present("calls"),
        )
        .arg(
            Arg::new("calls")
                .long("calls")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Pre-computed calls table (POS,REF,ALT,GT,DP) to use instead of calling")
                .conflicts_with("bam"),
        )
        .arg(
            Arg::new("target_vars")
                .short('t')
                .long("target-vars")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("CSV with target variants and allele frequencies (POS,REF,ALT,AF)")
                .required(true),
        )
        .arg(output_arg(
            false,
            "File to write the variants to; stats then go to STDOUT. Without it, stats are \
             printed as '#' header lines above the variants on STDOUT",
        ))
        .arg(
            Arg::new("dp_threshold")
                .long("DP-threshold")
                .value_name("INT")
                .value_parser(value_parser!(u32))
                .help("Calls with a lower DP are replaced by the corresponding allele frequency")
                .default_value("10"),
        )
        .arg(
            Arg::new("genotype_script")
                .long("genotype-script")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Variant calling script printing POS,REF,ALT,GT,DP")
                .default_value(GET_GENOTYPES_SCRIPT),
        )
        .arg(stats_arg())
        .get_matches();

    // Parse arguments
    let target_vars = path_value(&matches, "target_vars")?;
    let output = matches.get_one::<PathBuf>("output").cloned();
    let stats_file = matches.get_one::<PathBuf>("stats").cloned();
    let dp_threshold = *matches
        .get_one::<u32>("dp_threshold")
        .unwrap_or(&DEFAULT_DEPTH_THRESHOLD);

    info!("🧬 MTB Variant Calling");
    info!("Target variants: {}", target_vars.display());
    info!("DP threshold: {}", dp_threshold);

    let targets = TargetSet::from_path(&target_vars).with_context(|| {
        format!("failed to read target variants from {}", target_vars.display())
    })?;

    let (calls, sample) = match matches.get_one::<PathBuf>("calls") {
        Some(calls_path) => {
            info!("Calls: {}", calls_path.display());
            let calls = read_calls_path(calls_path)
                .with_context(|| format!("failed to read calls from {}", calls_path.display()))?;
            (calls, sample_name(calls_path))
        }
        None => {
            let bam = path_value(&matches, "bam")?;
            let script = path_value(&matches, "genotype_script")?;
            info!("Input: {}", bam.display());
            let calls = call_genotypes(&SystemRunner, &script, &bam, &target_vars)
                .context("no variants produced by pipeline")?;
            (calls, sample_name(&bam))
        }
    };

    let (genotypes, stats) = reconcile(&targets, &calls, dp_threshold);

    info!("📊 Reconciliation Results:");
    for (name, value) in stats.entries() {
        info!("  {}: {}", name, value);
    }

    let stdout = std::io::stdout();
    let mut stdout = stdout.lock();
    match &output {
        Some(path) => {
            let mut writer = BufWriter::new(
                File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?,
            );
            genotypes.write_csv(&mut writer)?;
            writer.flush()?;
            stats.write_key_values(&mut stdout)?;
            info!("💾 Variants saved to: {}", path.display());
        }
        None => {
            stats.write_comment_header(&mut stdout)?;
            genotypes.write_csv(&mut stdout)?;
        }
    }
    stdout.flush()?;

    if let Some(stats_file) = stats_file {
        let report = VariantCallingStats {
            sample_name: sample,
            target_variants: targets.len(),
            called_variants: calls.len(),
            depth_threshold: dp_threshold,
            reconciliation: stats,
        };
        report.write_json(&stats_file)?;
        info!("💾 Statistics saved to: {}", stats_file.display());
    }

    Ok(())
}
