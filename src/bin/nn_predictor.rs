//! MTB Neural Network Predictor
//!
//! Predicts resistance against 13 drugs from one-hot-encoded consensus
//! sequences of the target loci.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use log::info;
use mtb_amr_tools::config::{
    data_dir_arg, init_logging, output_arg, path_value, scorer_arg, workdir_arg,
    TARGET_LOCI_CSV, VERSION,
};
use mtb_amr_tools::external::SystemRunner;
use mtb_amr_tools::predict::{nn, write_predictions, ExternalModel};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

fn main() -> Result<()> {
    init_logging()?;

    let matches = Command::new("mtb-nn-predictor")
        .version(VERSION)
        .about(
            "Predict resistance against 13 drugs from one-hot-encoded consensus sequences. \
             Prints 'DRUG,probability,status' lines (R if probability > 0.5)",
        )
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("CSV file with the one-hot-encoded sequences (columns A,C,G,T)")
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
        .arg(output_arg(false, "Output file (STDOUT if not given)"))
        .arg(data_dir_arg())
        .arg(scorer_arg())
        .arg(workdir_arg())
        .get_matches();

    let data_dir = path_value(&matches, "data_dir")?;
    let output = matches.get_one::<PathBuf>("output").cloned();

    if matches.get_flag("get_target_loci") {
        let output = path_value(&matches, "output")?;
        let source = data_dir.join(TARGET_LOCI_CSV);
        std::fs::copy(&source, &output)
            .with_context(|| format!("failed to copy {}", source.display()))?;
        info!("💾 Target loci saved to: {}", output.display());
        return Ok(());
    }

    let input = path_value(&matches, "file")?;
    info!("🧬 MTB NN Resistance Prediction");
    info!("Input: {}", input.display());

    let features = nn::read_one_hot_path(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    info!("📊 {} encoded positions", features.rows.len());

    let runner = SystemRunner;
    let model = ExternalModel {
        runner: &runner,
        scorer: path_value(&matches, "scorer")?,
        model: data_dir.join("model"),
        workdir: path_value(&matches, "workdir")?,
    };
    let predictions = nn::predict(&model, &features)?;

    match &output {
        Some(path) => {
            let writer = BufWriter::new(
                File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?,
            );
            write_predictions(&predictions, writer)?;
            info!("💾 Predictions saved to: {}", path.display());
        }
        None => write_predictions(&predictions, std::io::stdout().lock())?,
    }

    Ok(())
}
