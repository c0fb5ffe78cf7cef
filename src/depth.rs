//! Per-base depth tables from `sambamba depth base`
//!
//! The majority base at each position drives both the one-hot encoded
//! sequences fed to the neural network and the per-base call table.

use crate::config::CHROMOSOME;
use crate::error::{PipelineError, Result};
use crate::external::{ToolCommand, ToolRunner};
use crate::variants::{column_index, field};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// Count columns in argmax priority order
pub const COUNT_COLUMNS: [&str; 5] = ["A", "C", "G", "T", "DEL"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MajorityBase {
    A,
    C,
    G,
    T,
    Del,
}

impl MajorityBase {
    const ORDER: [MajorityBase; 5] = [Self::A, Self::C, Self::G, Self::T, Self::Del];

    pub fn index(&self) -> usize {
        match self {
            Self::A => 0,
            Self::C => 1,
            Self::G => 2,
            Self::T => 3,
            Self::Del => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseDepth {
    pub reference: String,
    pub pos: u64,
    /// Counts for `A, C, G, T, DEL`
    pub counts: [u64; 5],
}

impl BaseDepth {
    /// Column with the highest count; ties go to the earliest column
    pub fn majority(&self) -> MajorityBase {
        let mut best = 0;
        for (i, &count) in self.counts.iter().enumerate().skip(1) {
            if count > self.counts[best] {
                best = i;
            }
        }
        MajorityBase::ORDER[best]
    }
}

/// Parse the tab-separated table by header name
pub fn parse_base_depth<R: Read>(reader: R, source_name: &str) -> Result<Vec<BaseDepth>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let ref_col = column_index(&headers, "REF", source_name)?;
    let pos_col = column_index(&headers, "POS", source_name)?;
    let mut count_cols = [0usize; 5];
    for (slot, name) in count_cols.iter_mut().zip(COUNT_COLUMNS) {
        *slot = column_index(&headers, name, source_name)?;
    }

    let mut depths = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let pos_field = field(&record, pos_col);
        let pos = pos_field.parse().map_err(|_| {
            PipelineError::malformed(source_name, format!("column POS: invalid position '{}'", pos_field))
        })?;

        let mut counts = [0u64; 5];
        for (count, (&col, name)) in counts.iter_mut().zip(count_cols.iter().zip(COUNT_COLUMNS)) {
            let value = field(&record, col);
            *count = value.parse().map_err(|_| {
                PipelineError::malformed(
                    source_name,
                    format!("column {}: invalid count '{}' at position {}", name, value, pos),
                )
            })?;
        }

        depths.push(BaseDepth {
            reference: field(&record, ref_col).to_string(),
            pos,
            counts,
        });
    }

    Ok(depths)
}

/// `sambamba depth base -L <regions> <bam>`, parsed
pub fn run_base_depth<R: ToolRunner + ?Sized>(
    runner: &R,
    regions: &Path,
    bam: &Path,
) -> Result<Vec<BaseDepth>> {
    let command = ToolCommand::new("sambamba")
        .arg("depth")
        .arg("base")
        .arg("-L")
        .path(regions)
        .path(bam);
    let output = runner.run(&command)?;
    let tool = output.tool.clone();
    let table = output.into_table()?;
    parse_base_depth(table.as_bytes(), &tool)
}

/// One-hot `A, C, G, T` rows with deletion-majority positions removed.
///
/// Returns the rows and the number of positions dropped.
pub fn one_hot_rows(depths: &[BaseDepth]) -> (Vec<[u8; 4]>, usize) {
    let mut rows = Vec::with_capacity(depths.len());
    let mut dropped = 0;
    for depth in depths {
        match depth.majority() {
            MajorityBase::Del => dropped += 1,
            base => {
                let mut row = [0u8; 4];
                row[base.index()] = 1;
                rows.push(row);
            }
        }
    }
    (rows, dropped)
}

pub fn write_one_hot_csv<W: Write>(rows: &[[u8; 4]], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["A", "C", "G", "T"])?;
    for row in rows {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// `Chr,Pos,A,C,G,T,N` with 1-based positions and a 5-wide one-hot majority call
pub fn write_per_base_calls<W: Write>(depths: &[BaseDepth], mut writer: W) -> Result<()> {
    writeln!(writer, "Chr,Pos,A,C,G,T,N")?;
    for depth in depths {
        let mut bits = [0u8; 5];
        bits[depth.majority().index()] = 1;
        writeln!(
            writer,
            "{},{},{},{},{},{},{}",
            CHROMOSOME,
            depth.pos + 1,
            bits[0],
            bits[1],
            bits[2],
            bits[3],
            bits[4]
        )?;
    }
    Ok(())
}
