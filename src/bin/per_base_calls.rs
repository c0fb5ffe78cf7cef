//! MTB Per-Base Calls Tool
//!
//! Majority base call at every position of the target regions of an indexed
//! BAM file, printed as `Chr,Pos,A,C,G,T,N`.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, Command};
use log::info;
use mtb_amr_tools::alignment::index_bam;
use mtb_amr_tools::config::{init_logging, output_arg, path_value, VERSION};
use mtb_amr_tools::depth::{run_base_depth, write_per_base_calls};
use mtb_amr_tools::external::SystemRunner;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

fn main() -> Result<()> {
    init_logging()?;

    let matches = Command::new("mtb-per-base-calls")
        .version(VERSION)
        .about("Majority base calls per position of the target regions")
        .arg(
            Arg::new("bam")
                .long("bam")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("BAM file")
                .default_value("/data/aligned_reads"),
        )
        .arg(
            Arg::new("regions")
                .long("regions")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Regions BED file")
                .default_value("/data/regions.bed"),
        )
        .arg(output_arg(false, "Output CSV file (STDOUT if not given)"))
        .get_matches();

    let bam = path_value(&matches, "bam")?;
    let regions = path_value(&matches, "regions")?;
    let output = matches.get_one::<PathBuf>("output").cloned();

    info!("🧬 MTB Per-Base Calls");
    info!("Input: {}", bam.display());
    info!("Regions: {}", regions.display());

    let runner = SystemRunner;
    index_bam(&runner, &bam).with_context(|| format!("failed to index {}", bam.display()))?;
    let depths = run_base_depth(&runner, &regions, &bam)?;
    info!("📊 {} positions called", depths.len());

    match &output {
        Some(path) => {
            let writer = BufWriter::new(
                File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?,
            );
            write_per_base_calls(&depths, writer)?;
            info!("💾 Calls saved to: {}", path.display());
        }
        None => write_per_base_calls(&depths, std::io::stdout().lock())?,
    }

    Ok(())
}
