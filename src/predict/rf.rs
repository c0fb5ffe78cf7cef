//! Random forest on reconciled genotypes (streptomycin)

use super::{expect_outputs, FeatureTable, ResistanceModel, ResistanceStatus};
use crate::error::{PipelineError, Result};
use crate::format_value;
use crate::variants::{
    column_index, csv_reader, field, parse_key, TargetSet, VariantKey, ALT_COLUMN, POS_COLUMN,
    REF_COLUMN,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

const FORMAT_HINT: &str =
    "the input variants need to be provided in the format 'POS,REF,ALT,GT' with a header line";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RfPrediction {
    pub resistance_probability: f64,
    pub resistance_status: ResistanceStatus,
}

/// Read genotypes (`#` comment lines allowed) and order them like `targets`.
///
/// The result is a single-row table whose columns are the `POS_REF_ALT`
/// feature names the forest was fitted with.
pub fn read_genotypes<R: Read>(
    reader: R,
    source_name: &str,
    targets: &TargetSet,
) -> Result<FeatureTable> {
    let mut rdr = csv_reader(reader);
    let headers = rdr.headers()?.clone();
    if headers.len() != 4 {
        return Err(PipelineError::malformed(source_name, FORMAT_HINT));
    }
    let pos_col = column_index(&headers, POS_COLUMN, source_name)?;
    let ref_col = column_index(&headers, REF_COLUMN, source_name)?;
    let alt_col = column_index(&headers, ALT_COLUMN, source_name)?;
    let value_col = (0..headers.len())
        .find(|c| ![pos_col, ref_col, alt_col].contains(c))
        .ok_or_else(|| PipelineError::malformed(source_name, FORMAT_HINT))?;

    let mut genotypes: HashMap<VariantKey, f64> = HashMap::new();
    for record in rdr.records() {
        let record = record?;
        let key = parse_key(&record, pos_col, ref_col, alt_col, source_name)?;
        let raw = field(&record, value_col);
        let value = raw.parse().map_err(|_| {
            PipelineError::malformed(source_name, format!("invalid genotype '{}' at {}", raw, key))
        })?;
        genotypes.insert(key, value);
    }

    let mut columns = Vec::with_capacity(targets.len());
    let mut row = Vec::with_capacity(targets.len());
    for key in targets.keys() {
        let value = genotypes.get(key).ok_or_else(|| {
            PipelineError::malformed(source_name, format!("missing target variant {}", key))
        })?;
        columns.push(key.to_string());
        row.push(*value);
    }

    Ok(FeatureTable::new(columns, vec![row]))
}

pub fn read_genotypes_path<P: AsRef<Path>>(path: P, targets: &TargetSet) -> Result<FeatureTable> {
    let path = path.as_ref();
    read_genotypes(File::open(path)?, &path.display().to_string(), targets)
}

/// The model emits the probability of the resistant class
pub fn predict<M: ResistanceModel + ?Sized>(model: &M, features: &FeatureTable) -> Result<RfPrediction> {
    let scores = model.score(features)?;
    expect_outputs(&scores, 1)?;
    let p = scores[0];
    Ok(RfPrediction {
        resistance_probability: p,
        resistance_status: ResistanceStatus::reaching(p),
    })
}

pub fn write_prediction<W: Write>(prediction: &RfPrediction, mut writer: W) -> Result<()> {
    writeln!(
        writer,
        "resistance_probability,{}",
        format_value(prediction.resistance_probability)
    )?;
    writeln!(writer, "resistance_status,{}", prediction.resistance_status)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variants::TargetVariant;

    fn targets() -> TargetSet {
        TargetSet::new(vec![
            TargetVariant::new(VariantKey::new(781687, "A", "G"), 0.2),
            TargetVariant::new(VariantKey::new(1472359, "A", "C"), 0.05),
        ])
        .unwrap()
    }

    struct FixedModel(f64);

    impl ResistanceModel for FixedModel {
        fn score(&self, features: &FeatureTable) -> Result<Vec<f64>> {
            assert_eq!(features.rows.len(), 1);
            Ok(vec![self.0])
        }
    }

    #[test]
    fn test_read_genotypes_reorders_and_skips_comments() {
        let csv = "#parameter,value\n#shared_variants,2\nPOS,REF,ALT,GT\n1472359,A,C,0.05\n781687,A,G,1.0\n";
        let table = read_genotypes(csv.as_bytes(), "gt.csv", &targets()).unwrap();
        assert_eq!(table.columns, vec!["781687_A_G", "1472359_A_C"]);
        assert_eq!(table.rows, vec![vec![1.0, 0.05]]);
    }

    #[test]
    fn test_read_genotypes_extra_column() {
        let csv = "POS,REF,ALT,GT,DP\n781687,A,G,1.0,20\n";
        let err = read_genotypes(csv.as_bytes(), "gt.csv", &targets()).unwrap_err();
        assert!(err.to_string().contains("POS,REF,ALT,GT"));
    }

    #[test]
    fn test_read_genotypes_missing_target() {
        let csv = "POS,REF,ALT,GT\n781687,A,G,1.0\n";
        let err = read_genotypes(csv.as_bytes(), "gt.csv", &targets()).unwrap_err();
        assert!(err.to_string().contains("1472359_A_C"));
    }

    #[test]
    fn test_predict_and_write() {
        let features = FeatureTable::new(vec!["x".to_string()], vec![vec![1.0]]);
        let prediction = predict(&FixedModel(0.5), &features).unwrap();
        assert_eq!(prediction.resistance_status, ResistanceStatus::R);

        let mut out = Vec::new();
        write_prediction(&prediction, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "resistance_probability,0.5\nresistance_status,R\n"
        );
    }
}
