//! Neural network on one-hot encoded sequences of 18 loci (13 drugs)

use super::{expect_outputs, DrugPrediction, FeatureTable, ResistanceModel, ResistanceStatus};
use crate::error::{PipelineError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Model output order
pub const DRUGS: [&str; 13] = [
    "AMIKACIN",
    "CAPREOMYCIN",
    "CIPROFLOXACIN",
    "ETHAMBUTOL",
    "ETHIONAMIDE",
    "ISONIAZID",
    "KANAMYCIN",
    "LEVOFLOXACIN",
    "MOXIFLOXACIN",
    "OFLOXACIN",
    "PYRAZINAMIDE",
    "RIFAMPICIN",
    "STREPTOMYCIN",
];

pub const INPUT_COLUMNS: [&str; 4] = ["A", "C", "G", "T"];

/// Read one-hot sequences; the header must be exactly `A,C,G,T`
pub fn read_one_hot<R: Read>(reader: R, source_name: &str) -> Result<FeatureTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers != INPUT_COLUMNS {
        return Err(PipelineError::malformed(
            source_name,
            format!(
                "input file must have columns {:?}, but has {:?}",
                INPUT_COLUMNS, headers
            ),
        ));
    }

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = record
            .iter()
            .map(|v| v.parse::<f64>())
            .collect::<std::result::Result<Vec<f64>, _>>()
            .map_err(|_| {
                PipelineError::malformed(source_name, format!("non-numeric value on line {}", i + 2))
            })?;
        rows.push(row);
    }

    let shape = vec![1, rows.len(), INPUT_COLUMNS.len()];
    Ok(FeatureTable::new(headers, rows).with_shape(shape))
}

pub fn read_one_hot_path<P: AsRef<Path>>(path: P) -> Result<FeatureTable> {
    let path = path.as_ref();
    read_one_hot(File::open(path)?, &path.display().to_string())
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Score the sequences; the model emits one logit per drug
pub fn predict<M: ResistanceModel + ?Sized>(
    model: &M,
    features: &FeatureTable,
) -> Result<Vec<DrugPrediction>> {
    let logits = model.score(features)?;
    expect_outputs(&logits, DRUGS.len())?;
    Ok(DRUGS
        .iter()
        .zip(logits)
        .map(|(drug, logit)| {
            let probability = sigmoid(logit);
            DrugPrediction {
                drug: drug.to_string(),
                probability,
                status: ResistanceStatus::exceeding(probability),
            }
        })
        .collect())
}
