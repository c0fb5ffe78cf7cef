//! MTB One-Hot Encoding Tool
//!
//! Extracts one-hot-encoded consensus sequences of target regions from aligned
//! reads with `sambamba depth base`. Sequences are concatenated without gaps
//! and positions where a deletion is the majority call are dropped.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, Command};
use log::info;
use mtb_amr_tools::alignment::{prepare_sorted_bam, reference_name};
use mtb_amr_tools::config::{
    init_logging, output_arg, path_value, reference_arg, stats_arg, workdir_arg, REGIONS_BED,
    VERSION,
};
use mtb_amr_tools::depth::{one_hot_rows, run_base_depth, write_one_hot_csv};
use mtb_amr_tools::external::SystemRunner;
use mtb_amr_tools::regions::{read_regions_path, write_bed4};
use mtb_amr_tools::{sample_name, OneHotStats, StatsReport};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

fn main() -> Result<()> {
    init_logging()?;

    let matches = Command::new("mtb-one-hot-encode")
        .version(VERSION)
        .about(
            "Extract one-hot-encoded consensus sequences from aligned reads. Needs a SAM/BAM/CRAM \
             file and a CSV (locus,start,end) or BED file with the regions to extract",
        )
        .arg(
            Arg::new("bam")
                .short('b')
                .long("bam")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Alignment file (SAM/BAM/CRAM)")
                .required(true),
        )
        .arg(
            Arg::new("regions")
                .short('r')
                .long("regions")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Regions CSV file with the header 'locus,start,end' (1-based) or a BED file")
                .required(true),
        )
        .arg(reference_arg())
        .arg(output_arg(false, "Output CSV file (STDOUT if not given)"))
        .arg(workdir_arg())
        .arg(stats_arg())
        .get_matches();

    // Parse arguments
    let input = path_value(&matches, "bam")?;
    let regions_path = path_value(&matches, "regions")?;
    let reference = path_value(&matches, "reference")?;
    let output = matches.get_one::<PathBuf>("output").cloned();
    let workdir = path_value(&matches, "workdir")?;
    let stats_file = matches.get_one::<PathBuf>("stats").cloned();

    info!("🧬 MTB One-Hot Encoding");
    info!("Input: {}", input.display());
    info!("Regions: {}", regions_path.display());

    let runner = SystemRunner;
    let sorted = prepare_sorted_bam(&runner, &input, Some(reference.as_path()), &workdir)
        .with_context(|| format!("failed to prepare {}", input.display()))?;
    let reference_seq = reference_name(&runner, &sorted)?;
    info!("Reference sequence: {}", reference_seq);

    // sambamba needs a BED file
    let bed = if regions_path.extension().and_then(|e| e.to_str()) == Some("bed") {
        regions_path.clone()
    } else {
        let regions = read_regions_path(&regions_path).with_context(|| {
            format!("failed to read regions from {}", regions_path.display())
        })?;
        let bed = workdir.join(REGIONS_BED);
        let mut writer = BufWriter::new(File::create(&bed)?);
        write_bed4(&regions, &reference_seq, &mut writer)?;
        writer.flush()?;
        info!("Converted {} regions to {}", regions.len(), bed.display());
        bed
    };

    let depths = run_base_depth(&runner, &bed, &sorted)?;
    let (rows, dropped) = one_hot_rows(&depths);
    info!("📊 One-hot encoded {} positions ({} deletions dropped)", rows.len(), dropped);

    match &output {
        Some(path) => {
            let writer = BufWriter::new(
                File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?,
            );
            write_one_hot_csv(&rows, writer)?;
            info!("💾 Sequences saved to: {}", path.display());
        }
        None => write_one_hot_csv(&rows, std::io::stdout().lock())?,
    }

    if let Some(stats_file) = stats_file {
        let report = OneHotStats {
            sample_name: sample_name(&input),
            positions: rows.len(),
            deletions_dropped: dropped,
            reference_name: reference_seq,
        };
        report.write_json(&stats_file)?;
        info!("💾 Statistics saved to: {}", stats_file.display());
    }

    Ok(())
}
