//! Resistance model adapters
//!
//! The trained models are opaque artifacts. An adapter prepares the feature
//! table a model expects, hands it to a [`ResistanceModel`] and turns the raw
//! scores into per-drug resistance calls.

pub mod cnn;
pub mod nn;
pub mod rf;

use crate::config::FEATURES_CSV;
use crate::error::{PipelineError, Result};
use crate::external::{ToolCommand, ToolRunner};
use crate::format_value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub const RESISTANCE_CUTOFF: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResistanceStatus {
    R,
    S,
}

impl ResistanceStatus {
    /// Resistant iff `probability > 0.5`
    pub fn exceeding(probability: f64) -> Self {
        if probability > RESISTANCE_CUTOFF {
            Self::R
        } else {
            Self::S
        }
    }

    /// Resistant iff `probability >= 0.5`
    pub fn reaching(probability: f64) -> Self {
        if probability < RESISTANCE_CUTOFF {
            Self::S
        } else {
            Self::R
        }
    }
}

impl fmt::Display for ResistanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::R => write!(f, "R"),
            Self::S => write!(f, "S"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugPrediction {
    pub drug: String,
    pub probability: f64,
    pub status: ResistanceStatus,
}

/// Dense numeric table handed to a model.
///
/// `shape` records the tensor shape the rows flatten (row-major) into when it
/// differs from `rows x columns`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub shape: Vec<usize>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        let shape = vec![rows.len(), columns.len()];
        Self {
            columns,
            rows,
            shape,
        }
    }

    pub fn with_shape(mut self, shape: Vec<usize>) -> Self {
        self.shape = shape;
        self
    }

    pub fn write_csv<W: Write>(&self, mut writer: W) -> Result<()> {
        let shape: Vec<String> = self.shape.iter().map(|d| d.to_string()).collect();
        writeln!(writer, "#shape={}", shape.join(","))?;
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(row.iter().map(|v| format_value(*v)))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

pub trait ResistanceModel {
    /// Raw model output, one value per model output unit
    fn score(&self, features: &FeatureTable) -> Result<Vec<f64>>;
}

/// A model artifact scored by an external program:
/// `<scorer> <model> <features.csv>` printing whitespace-separated numbers
pub struct ExternalModel<'a, R: ToolRunner + ?Sized> {
    pub runner: &'a R,
    pub scorer: PathBuf,
    pub model: PathBuf,
    pub workdir: PathBuf,
}

impl<'a, R: ToolRunner + ?Sized> ResistanceModel for ExternalModel<'a, R> {
    fn score(&self, features: &FeatureTable) -> Result<Vec<f64>> {
        let features_path = self.workdir.join(FEATURES_CSV);
        let mut writer = BufWriter::new(File::create(&features_path)?);
        features.write_csv(&mut writer)?;
        writer.flush()?;
        drop(writer);

        let command = ToolCommand::new(self.scorer.display().to_string())
            .path(&self.model)
            .path(&features_path);
        let output = self.runner.run(&command)?.check()?;
        let tool = output.tool.clone();
        let table = output.into_table()?;
        parse_scores(&table, &tool)
    }
}

pub fn parse_scores(text: &str, source_name: &str) -> Result<Vec<f64>> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(|token| {
            token.parse().map_err(|_| {
                PipelineError::malformed(source_name, format!("invalid model score '{}'", token))
            })
        })
        .collect()
}

pub(crate) fn expect_outputs(scores: &[f64], expected: usize) -> Result<()> {
    if scores.len() != expected {
        return Err(PipelineError::malformed(
            "model output",
            format!("expected {} scores, got {}", expected, scores.len()),
        ));
    }
    Ok(())
}

/// `drug,probability,status` lines without a header
pub fn write_predictions<W: Write>(predictions: &[DrugPrediction], mut writer: W) -> Result<()> {
    for p in predictions {
        writeln!(writer, "{},{},{}", p.drug, format_value(p.probability), p.status)?;
    }
    Ok(())
}
