//! Container paths, defaults and argument builders shared by the binaries

use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgMatches};
use log::Level;
use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// container paths
pub const SHELL: &str = "/bin/bash";
pub const REFERENCE_FASTA: &str = "/internal_data/refgenome.fa";
pub const INTERNAL_DATA_DIR: &str = "/internal_data";
pub const ALIGNMENTS_DIR: &str = "/internal_data/alignments";
pub const SCORER: &str = "/internal_data/score-model";
pub const GET_GENOTYPES_SCRIPT: &str = "/get_genotypes.sh";
pub const VARIANT_CALLING_SCRIPT: &str = "/scripts/variant-calling-pipeline.sh";
pub const CONSENSUS_SCRIPT: &str = "/scripts/get-aligned-consensus-sequence.sh";
pub const MAFFT_ADD_SCRIPT: &str =
    "/scripts/add-to-alignment-with-mafft-and-get-aligned-sequence.sh";

// file names inside the data dir / working dir
pub const TARGET_LOCI_CSV: &str = "target_loci.csv";
pub const TARGET_VARS_CSV: &str = "target_vars.csv";
pub const READS_BAM: &str = "reads.bam";
pub const READS_SORTED_BAM: &str = "reads.sorted.bam";
pub const REGIONS_BED: &str = "regions.bed";
pub const TARGET_LOCI_BED: &str = "target_loci.bed";
pub const VARIANTS_VCF: &str = "variants.vcf.gz";
pub const ALIGNMENT_FILES_DIR: &str = "alignment-files";
pub const INPUT_SEQ_FASTA: &str = "input-seq.fa";
pub const FEATURES_CSV: &str = "features.csv";

// reference
pub const CHROMOSOME: &str = "Chromosome";

pub fn init_logging() -> Result<()> {
    simple_logger::init_with_level(Level::Info)?;
    Ok(())
}

pub fn output_arg(required: bool, help: &'static str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("FILE")
        .value_parser(value_parser!(PathBuf))
        .help(help)
        .required(required)
}

pub fn stats_arg() -> Arg {
    Arg::new("stats")
        .long("stats")
        .value_name("JSON")
        .value_parser(value_parser!(PathBuf))
        .help("Also write run statistics to this JSON file")
}

pub fn workdir_arg() -> Arg {
    Arg::new("workdir")
        .long("workdir")
        .value_name("DIR")
        .value_parser(value_parser!(PathBuf))
        .help("Directory for intermediate files")
        .default_value(".")
}

pub fn reference_arg() -> Arg {
    Arg::new("reference")
        .long("reference")
        .value_name("FASTA")
        .value_parser(value_parser!(PathBuf))
        .help("Reference genome FASTA")
        .default_value(REFERENCE_FASTA)
}

pub fn data_dir_arg() -> Arg {
    Arg::new("data_dir")
        .long("data-dir")
        .value_name("DIR")
        .value_parser(value_parser!(PathBuf))
        .help("Directory holding the model and its bundled tables")
        .default_value(INTERNAL_DATA_DIR)
}

pub fn scorer_arg() -> Arg {
    Arg::new("scorer")
        .long("scorer")
        .value_name("PROGRAM")
        .value_parser(value_parser!(PathBuf))
        .help("Program that loads the model artifact and scores a feature table")
        .default_value(SCORER)
}

/// Fetch an argument clap guarantees through `required` or a default value
pub fn path_value(matches: &ArgMatches, id: &str) -> Result<PathBuf> {
    matches
        .get_one::<PathBuf>(id)
        .cloned()
        .ok_or_else(|| anyhow!("missing value for '{}'", id))
}

pub fn parse_positive_int(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(v) if v >= 1 => Ok(v),
        _ => Err(format!("invalid value (must be positive int): '{}'", value)),
    }
}
