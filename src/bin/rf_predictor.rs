//! MTB Random Forest Predictor
//!
//! Predicts streptomycin resistance from the reconciled genotypes of the
//! target variants.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use log::info;
use mtb_amr_tools::config::{
    data_dir_arg, init_logging, output_arg, path_value, scorer_arg, workdir_arg,
    TARGET_VARS_CSV, VERSION,
};
use mtb_amr_tools::external::SystemRunner;
use mtb_amr_tools::predict::{rf, ExternalModel};
use mtb_amr_tools::variants::TargetSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

fn main() -> Result<()> {
    init_logging()?;

    let matches = Command::new("mtb-rf-predictor")
        .version(VERSION)
        .about(
            "Predict streptomycin resistance from genotypes given as 'POS,REF,ALT,GT'. \
             Lines starting with '#' are ignored",
        )
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .help("CSV file with the genotypes of the target variants")
                .required_unless_present("get_target_vars"),
        )
        .arg(
            Arg::new("get_target_vars")
                .long("get-target-vars")
                .action(ArgAction::SetTrue)
                .help("Write the target variants CSV to the file given with -o")
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

    let targets_path = data_dir.join(TARGET_VARS_CSV);
    let targets = TargetSet::from_path(&targets_path).with_context(|| {
        format!("failed to read target variants from {}", targets_path.display())
    })?;

    if matches.get_flag("get_target_vars") {
        let output = path_value(&matches, "output")?;
        let mut writer = BufWriter::new(
            File::create(&output)
                .with_context(|| format!("failed to create {}", output.display()))?,
        );
        targets.write_csv(&mut writer)?;
        writer.flush()?;
        info!("💾 Target variants saved to: {}", output.display());
        return Ok(());
    }

    let input = path_value(&matches, "file")?;
    info!("🧬 MTB RF Resistance Prediction");
    info!("Input: {}", input.display());

    let features = rf::read_genotypes_path(&input, &targets)
        .with_context(|| format!("failed to read genotypes from {}", input.display()))?;
    info!("📊 {} target variants", features.columns.len());

    let runner = SystemRunner;
    let model = ExternalModel {
        runner: &runner,
        scorer: path_value(&matches, "scorer")?,
        model: data_dir.join("model.pkl"),
        workdir: path_value(&matches, "workdir")?,
    };
    let prediction = rf::predict(&model, &features)?;

    match &output {
        Some(path) => {
            let mut writer = BufWriter::new(
                File::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?,
            );
            rf::write_prediction(&prediction, &mut writer)?;
            writer.flush()?;
            info!("💾 Prediction saved to: {}", path.display());
        }
        None => rf::write_prediction(&prediction, std::io::stdout().lock())?,
    }

    Ok(())
}
