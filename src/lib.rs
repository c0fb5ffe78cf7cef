//! MTB AMR Tools
//!
//! Containerized pipeline steps for M. tuberculosis resistance prediction.
//!
//! This library provides shared functionality for:
//! - Genotype reconciliation against a target-variant universe
//! - Running external tools (samtools, sambamba, freebayes, mafft) behind one seam
//! - One-hot encoding and per-base calls from base-depth tables
//! - Consensus sequence extraction
//! - Resistance model adapters

pub mod alignment;
pub mod config;
pub mod consensus;
pub mod depth;
pub mod error;
pub mod external;
pub mod predict;
pub mod reconcile;
pub mod regions;
pub mod variants;

pub use error::{PipelineError, Result};

use reconcile::ReconcileStats;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Trait for statistics reports that binaries persist with `--stats`
pub trait StatsReport: Serialize + std::fmt::Debug {
    fn write_json<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let json_content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json_content)?;
        Ok(())
    }
}

/// Variant calling + reconciliation statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantCallingStats {
    pub sample_name: String,
    pub target_variants: usize,
    pub called_variants: usize,
    pub depth_threshold: u32,
    #[serde(flatten)]
    pub reconciliation: ReconcileStats,
}

impl StatsReport for VariantCallingStats {}

/// One-hot encoding statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotStats {
    pub sample_name: String,
    pub positions: usize,
    pub deletions_dropped: usize,
    pub reference_name: String,
}

impl StatsReport for OneHotStats {}

/// Consensus extraction statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusStats {
    pub sample_name: String,
    pub loci: usize,
    pub total_bases: usize,
    pub threads: usize,
}

impl StatsReport for ConsensusStats {}

/// Sample name derived from an input file name, without extension
pub fn sample_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Render a numeric cell the way the models' training tables were written:
/// always with a fractional part (`1.0`, `0.3`).
pub fn format_value(value: f64) -> String {
    format!("{:?}", value)
}
