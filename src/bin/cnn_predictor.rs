//! MTB CNN Predictor
//!
//! Predicts resistance against 13 drugs from the consensus sequences of 18
//! target loci, aligned to the reference alignments the network was trained on.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use log::info;
use mtb_amr_tools::config::{
    data_dir_arg, init_logging, output_arg, path_value, scorer_arg, workdir_arg, ALIGNMENTS_DIR,
    MAFFT_ADD_SCRIPT, TARGET_LOCI_CSV, VERSION,
};
use mtb_amr_tools::external::SystemRunner;
use mtb_amr_tools::predict::cnn::{self, SequenceAligner};
use mtb_amr_tools::predict::ExternalModel;
use std::collections::HashMap;
use std::path::PathBuf;

fn main() -> Result<()> {
    init_logging()?;

    let matches = Command::new("mtb-cnn-predictor")
        .version(VERSION)
        .about(
            "Predict resistance against 13 drugs from a FASTA file with the consensus \
             sequences of the 18 target loci. Prints 'drug,prediction,resistance_status'",
        )
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("FASTA file with one sequence per target locus (IDs must match the loci)")
                .required_unless_present("get_target_loci"),
        )
        .arg(
            Arg::new("get_target_loci")
                .long("get-target-loci")
                .action(ArgAction::SetTrue)
                .help("Write the target loci CSV to the file given with -o")
                .conflicts_with("file")
                .requires("output"),
        )
        .arg(output_arg(false, "Target loci output file (with --get-target-loci)"))
        .arg(
            Arg::new("alignments_dir")
                .long("alignments-dir")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Directory with the reference alignment of each locus")
                .default_value(ALIGNMENTS_DIR),
        )
        .arg(
            Arg::new("mafft_script")
                .long("mafft-script")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("Script adding a sequence to an alignment and printing the aligned sequence")
                .default_value(MAFFT_ADD_SCRIPT),
        )
        .arg(data_dir_arg())
        .arg(scorer_arg())
        .arg(workdir_arg())
        .get_matches();

    let data_dir = path_value(&matches, "data_dir")?;

    if matches.get_flag("get_target_loci") {
        let output = path_value(&matches, "output")?;
        let source = data_dir.join(TARGET_LOCI_CSV);
        std::fs::copy(&source, &output)
            .with_context(|| format!("failed to copy {}", source.display()))?;
        info!("💾 Target loci saved to: {}", output.display());
        return Ok(());
    }

    let input = path_value(&matches, "file")?;
    let workdir = path_value(&matches, "workdir")?;
    info!("🧬 MTB CNN Resistance Prediction");
    info!("Input: {}", input.display());

    let records = cnn::read_fasta(&input)
        .with_context(|| format!("failed to read sequences from {}", input.display()))?;
    cnn::check_loci(records.iter().map(|(id, _)| id.as_str()))?;

    let runner = SystemRunner;
    let aligner = SequenceAligner {
        runner: &runner,
        script: path_value(&matches, "mafft_script")?,
        alignments_dir: path_value(&matches, "alignments_dir")?,
        workdir: workdir.clone(),
    };

    let mut encoded = HashMap::with_capacity(records.len());
    for (locus, sequence) in &records {
        let aligned = aligner
            .align(locus, sequence)
            .with_context(|| format!("failed to align {}", locus))?;
        info!("  {}: {} aligned positions", locus, aligned.len());
        encoded.insert(locus.clone(), cnn::one_hot_encode(locus, &aligned)?);
    }

    let tensor = cnn::build_tensor(&encoded)?;
    let model = ExternalModel {
        runner: &runner,
        scorer: path_value(&matches, "scorer")?,
        model: data_dir.join("MDCNN_saved_model"),
        workdir,
    };
    let predictions = cnn::predict(&model, &tensor)?;
    cnn::write_predictions(&predictions, std::io::stdout().lock())?;

    Ok(())
}
