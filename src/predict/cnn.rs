//! Convolutional network on aligned consensus sequences of 18 loci (13 drugs)
//!
//! Each consensus sequence is first added to the reference alignment of its
//! locus with `mafft --add --keeplength`, so gaps sit where the network saw
//! them during training.

use super::{expect_outputs, DrugPrediction, FeatureTable, ResistanceModel, ResistanceStatus};
use crate::config::INPUT_SEQ_FASTA;
use crate::error::{PipelineError, Result};
use crate::external::{ToolCommand, ToolRunner};
use crate::format_value;
use needletail::parser::FastxReader;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Locus order along the last tensor axis
pub const LOCI: [&str; 18] = [
    "acpM-kasA",
    "gid",
    "rpsA",
    "clpC",
    "embCAB",
    "aftB-ubiA",
    "rrs-rrl",
    "ethAR",
    "oxyR-ahpC",
    "tlyA",
    "katG",
    "rpsL",
    "rpoBC",
    "fabG1-inhA",
    "eis",
    "gyrBA",
    "panD",
    "pncA",
];

/// Model output order
pub const DRUGS: [&str; 13] = [
    "RIFAMPICIN",
    "ISONIAZID",
    "PYRAZINAMIDE",
    "ETHAMBUTOL",
    "STREPTOMYCIN",
    "LEVOFLOXACIN",
    "CAPREOMYCIN",
    "AMIKACIN",
    "MOXIFLOXACIN",
    "OFLOXACIN",
    "KANAMYCIN",
    "ETHIONAMIDE",
    "CIPROFLOXACIN",
];

/// One-hot channel order
pub const BASE_ORDER: [char; 5] = ['A', 'C', 'T', 'G', '-'];

pub const ALIGNED_LENGTH: usize = 10291;

/// Read `(id, sequence)` pairs; the id is the first word of the header
pub fn read_fasta<P: AsRef<Path>>(path: P) -> Result<Vec<(String, String)>> {
    let path = path.as_ref();
    let source_name = path.display().to_string();
    let mut reader = needletail::parse_fastx_file(path)
        .map_err(|e| PipelineError::malformed(&source_name, e.to_string()))?;

    let mut records = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|e| PipelineError::malformed(&source_name, e.to_string()))?;
        let header = String::from_utf8_lossy(record.id());
        let id = header.split_whitespace().next().unwrap_or("").to_string();
        let sequence = String::from_utf8_lossy(&record.seq()).into_owned();
        records.push((id, sequence));
    }
    Ok(records)
}

/// The ids must be exactly the 18 target loci
pub fn check_loci<'a, I: IntoIterator<Item = &'a str>>(ids: I) -> Result<()> {
    let found: HashSet<&str> = ids.into_iter().collect();
    let expected: HashSet<&str> = LOCI.iter().copied().collect();
    if found != expected {
        return Err(PipelineError::Validation(
            "sequence IDs in input FASTA not matching target loci".to_string(),
        ));
    }
    Ok(())
}

/// Adds sequences to the per-locus reference alignments
pub struct SequenceAligner<'a, R: ToolRunner + ?Sized> {
    pub runner: &'a R,
    pub script: PathBuf,
    pub alignments_dir: PathBuf,
    pub workdir: PathBuf,
}

impl<'a, R: ToolRunner + ?Sized> SequenceAligner<'a, R> {
    /// Gapped, uppercased sequence as it sits in the locus alignment
    pub fn align(&self, locus: &str, sequence: &str) -> Result<String> {
        let input = self.workdir.join(INPUT_SEQ_FASTA);
        std::fs::write(&input, format!(">{}\n{}\n", locus, sequence))?;
        let alignment = self.alignments_dir.join(format!("{}.fasta", locus));
        let command = ToolCommand::script(&self.script).path(&input).path(&alignment);
        let table = self.runner.run(&command)?.into_table()?;
        Ok(table.split_whitespace().collect::<String>().to_uppercase())
    }
}

pub fn one_hot_encode(locus: &str, aligned: &str) -> Result<Vec<[u8; 5]>> {
    aligned
        .chars()
        .enumerate()
        .map(|(i, base)| {
            let channel = BASE_ORDER.iter().position(|&b| b == base).ok_or_else(|| {
                PipelineError::malformed(
                    locus,
                    format!("unexpected character '{}' at aligned position {}", base, i + 1),
                )
            })?;
            let mut encoded = [0u8; 5];
            encoded[channel] = 1;
            Ok(encoded)
        })
        .collect()
}

/// Assemble the `(1, 5, ALIGNED_LENGTH, 18)` input tensor.
///
/// Rows are `(channel, position)` pairs in row-major order, columns are the
/// loci; shorter sequences are zero-padded at the end.
pub fn build_tensor(encoded: &HashMap<String, Vec<[u8; 5]>>) -> Result<FeatureTable> {
    let longest = encoded.values().map(Vec::len).max().unwrap_or(0);
    if longest != ALIGNED_LENGTH {
        return Err(PipelineError::Validation(format!(
            "longest aligned sequence has unexpected length {} (expected {})",
            longest, ALIGNED_LENGTH
        )));
    }

    let mut by_locus = Vec::with_capacity(LOCI.len());
    for locus in LOCI {
        let seq = encoded.get(locus).ok_or_else(|| {
            PipelineError::Validation(format!("no aligned sequence for locus {}", locus))
        })?;
        by_locus.push(seq);
    }

    let mut rows = Vec::with_capacity(BASE_ORDER.len() * ALIGNED_LENGTH);
    for channel in 0..BASE_ORDER.len() {
        for pos in 0..ALIGNED_LENGTH {
            rows.push(
                by_locus
                    .iter()
                    .map(|seq| seq.get(pos).map_or(0.0, |b| f64::from(b[channel])))
                    .collect(),
            );
        }
    }

    let columns = LOCI.iter().map(|l| l.to_string()).collect();
    Ok(FeatureTable::new(columns, rows).with_shape(vec![
        1,
        BASE_ORDER.len(),
        ALIGNED_LENGTH,
        LOCI.len(),
    ]))
}

/// The network encodes resistance as 0, so the resistance probability is `1 - score`
pub fn predict<M: ResistanceModel + ?Sized>(
    model: &M,
    tensor: &FeatureTable,
) -> Result<Vec<DrugPrediction>> {
    let scores = model.score(tensor)?;
    expect_outputs(&scores, DRUGS.len())?;
    Ok(DRUGS
        .iter()
        .zip(scores)
        .map(|(drug, score)| {
            let probability = 1.0 - score;
            DrugPrediction {
                drug: drug.to_string(),
                probability,
                status: ResistanceStatus::exceeding(probability),
            }
        })
        .collect())
}

/// `drug,prediction,resistance_status` with a header
pub fn write_predictions<W: Write>(predictions: &[DrugPrediction], mut writer: W) -> Result<()> {
    writeln!(writer, "drug,prediction,resistance_status")?;
    for p in predictions {
        writeln!(writer, "{},{},{}", p.drug, format_value(p.probability), p.status)?;
    }
    Ok(())
}
