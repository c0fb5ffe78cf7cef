//! Target and called variant tables
//!
//! Both tables are keyed by `(POS, REF, ALT)`. Target variants form an ordered,
//! validated universe carrying population allele frequencies; called variants
//! come from the variant caller and carry a genotype code and a read depth.

use crate::error::{PipelineError, Result};
use crate::external::{ToolCommand, ToolRunner};
use crate::format_value;
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const POS_COLUMN: &str = "POS";
pub const REF_COLUMN: &str = "REF";
pub const ALT_COLUMN: &str = "ALT";
pub const AF_COLUMN: &str = "AF";
pub const GT_COLUMN: &str = "GT";
pub const DP_COLUMN: &str = "DP";

/// Composite `(POS, REF, ALT)` key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantKey {
    pub pos: u64,
    pub reference: String,
    pub alternate: String,
}

impl VariantKey {
    pub fn new(pos: u64, reference: impl Into<String>, alternate: impl Into<String>) -> Self {
        Self {
            pos,
            reference: reference.into(),
            alternate: alternate.into(),
        }
    }
}

/// `POS_REF_ALT`, the feature name the genotype models were fitted with
impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.pos, self.reference, self.alternate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetVariant {
    pub key: VariantKey,
    pub allele_frequency: f64,
}

impl TargetVariant {
    pub fn new(key: VariantKey, allele_frequency: f64) -> Self {
        Self {
            key,
            allele_frequency,
        }
    }
}

/// Ordered universe of target variants.
///
/// Construction enforces a non-empty set of unique keys with allele
/// frequencies in `[0, 1]`; iteration order is the declared order.
#[derive(Debug, Clone)]
pub struct TargetSet {
    variants: Vec<TargetVariant>,
    index: HashMap<VariantKey, usize>,
}

impl TargetSet {
    pub fn new(variants: Vec<TargetVariant>) -> Result<Self> {
        if variants.is_empty() {
            return Err(PipelineError::Validation(
                "target variant universe is empty".to_string(),
            ));
        }

        let mut index = HashMap::with_capacity(variants.len());
        for (i, target) in variants.iter().enumerate() {
            let af = target.allele_frequency;
            if !af.is_finite() || !(0.0..=1.0).contains(&af) {
                return Err(PipelineError::Validation(format!(
                    "allele frequency {} of target {} is outside [0, 1]",
                    af, target.key
                )));
            }
            if index.insert(target.key.clone(), i).is_some() {
                return Err(PipelineError::Validation(format!(
                    "duplicate target variant {}",
                    target.key
                )));
            }
        }

        Ok(Self { variants, index })
    }

    /// Read a `POS,REF,ALT,AF` table
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(file, &path.display().to_string())
    }

    pub fn from_reader<R: Read>(reader: R, source_name: &str) -> Result<Self> {
        let mut rdr = csv_reader(reader);
        let headers = rdr.headers()?.clone();
        let pos_col = column_index(&headers, POS_COLUMN, source_name)?;
        let ref_col = column_index(&headers, REF_COLUMN, source_name)?;
        let alt_col = column_index(&headers, ALT_COLUMN, source_name)?;
        let af_col = column_index(&headers, AF_COLUMN, source_name)?;

        let mut variants = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let key = parse_key(&record, pos_col, ref_col, alt_col, source_name)?;
            let af_field = field(&record, af_col);
            let allele_frequency: f64 = af_field.parse().map_err(|_| {
                PipelineError::malformed(
                    source_name,
                    format!("column {}: invalid allele frequency '{}'", AF_COLUMN, af_field),
                )
            })?;
            variants.push(TargetVariant::new(key, allele_frequency));
        }

        Self::new(variants)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetVariant> {
        self.variants.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &VariantKey> {
        self.variants.iter().map(|t| &t.key)
    }

    pub fn get(&self, key: &VariantKey) -> Option<&TargetVariant> {
        self.index.get(key).map(|&i| &self.variants[i])
    }

    pub fn contains(&self, key: &VariantKey) -> bool {
        self.index.contains_key(key)
    }

    /// Write the universe back out as `POS,REF,ALT,AF`
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record([POS_COLUMN, REF_COLUMN, ALT_COLUMN, AF_COLUMN])?;
        for target in &self.variants {
            wtr.write_record([
                target.key.pos.to_string(),
                target.key.reference.clone(),
                target.key.alternate.clone(),
                format_value(target.allele_frequency),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Genotype code reduced to its first character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenotypeCall {
    Allele(u8),
    NoCall,
}

impl GenotypeCall {
    /// Decode a genotype code such as `1/1`, `0|1` or `./.`.
    ///
    /// Returns `None` when the first character is neither an allele index nor
    /// the `.` no-call symbol. An empty field counts as a no-call.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim().chars().next() {
            None | Some('.') => Some(Self::NoCall),
            Some(c) => c.to_digit(10).map(|d| Self::Allele(d as u8)),
        }
    }

    pub fn allele(&self) -> Option<u8> {
        match self {
            Self::Allele(a) => Some(*a),
            Self::NoCall => None,
        }
    }
}

/// Read depth; `.` (unavailable) maps to -1 so it falls below any threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Depth(pub i64);

impl Depth {
    pub const UNAVAILABLE: Depth = Depth(-1);

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value == "." {
            return Some(Self::UNAVAILABLE);
        }
        value.parse().ok().map(Depth)
    }

    pub fn meets(&self, threshold: u32) -> bool {
        self.0 >= i64::from(threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalledVariant {
    pub key: VariantKey,
    pub genotype: GenotypeCall,
    pub depth: Depth,
}

impl CalledVariant {
    pub fn new(key: VariantKey, genotype: GenotypeCall, depth: Depth) -> Self {
        Self {
            key,
            genotype,
            depth,
        }
    }

    /// The decoded allele if the call is concrete and deep enough
    pub fn confident_allele(&self, depth_threshold: u32) -> Option<u8> {
        if self.depth.meets(depth_threshold) {
            self.genotype.allele()
        } else {
            None
        }
    }
}

/// Read a calls table with at least `POS,REF,ALT,GT,DP`; other columns are ignored
pub fn read_calls<R: Read>(reader: R, source_name: &str) -> Result<Vec<CalledVariant>> {
    let mut rdr = csv_reader(reader);
    let headers = rdr.headers()?.clone();
    let pos_col = column_index(&headers, POS_COLUMN, source_name)?;
    let ref_col = column_index(&headers, REF_COLUMN, source_name)?;
    let alt_col = column_index(&headers, ALT_COLUMN, source_name)?;
    let gt_col = column_index(&headers, GT_COLUMN, source_name)?;
    let dp_col = column_index(&headers, DP_COLUMN, source_name)?;

    let mut calls = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let key = parse_key(&record, pos_col, ref_col, alt_col, source_name)?;

        let gt_field = field(&record, gt_col);
        let genotype = GenotypeCall::parse(gt_field).ok_or_else(|| {
            PipelineError::malformed(
                source_name,
                format!("column {}: cannot interpret genotype '{}' at {}", GT_COLUMN, gt_field, key),
            )
        })?;

        let dp_field = field(&record, dp_col);
        let depth = Depth::parse(dp_field).ok_or_else(|| {
            PipelineError::malformed(
                source_name,
                format!("column {}: invalid depth '{}' at {}", DP_COLUMN, dp_field, key),
            )
        })?;

        calls.push(CalledVariant::new(key, genotype, depth));
    }

    Ok(calls)
}

pub fn read_calls_path<P: AsRef<Path>>(path: P) -> Result<Vec<CalledVariant>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_calls(file, &path.display().to_string())
}

/// Genotype the target variants with the container's freebayes script.
///
/// The script prints a calls table on stdout; a blank stdout means it failed
/// and its stderr is surfaced.
pub fn call_genotypes<R: ToolRunner + ?Sized>(
    runner: &R,
    script: &Path,
    bam: &Path,
    target_vars: &Path,
) -> Result<Vec<CalledVariant>> {
    let command = ToolCommand::script(script).path(bam).path(target_vars);
    let output = runner.run(&command)?;
    let tool = output.tool.clone();
    let table = output.into_table()?;
    read_calls(table.as_bytes(), &tool)
}

/// Comma-separated reader with headers that skips `#` comment lines
pub(crate) fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader)
}

pub(crate) fn column_index(headers: &StringRecord, name: &str, source_name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| PipelineError::malformed(source_name, format!("missing column {}", name)))
}

pub(crate) fn field(record: &StringRecord, col: usize) -> &str {
    record.get(col).unwrap_or("")
}

pub(crate) fn parse_key(
    record: &StringRecord,
    pos_col: usize,
    ref_col: usize,
    alt_col: usize,
    source_name: &str,
) -> Result<VariantKey> {
    let pos_field = field(record, pos_col);
    let pos = pos_field.parse().map_err(|_| {
        PipelineError::malformed(
            source_name,
            format!("column {}: invalid position '{}'", POS_COLUMN, pos_field),
        )
    })?;
    Ok(VariantKey::new(
        pos,
        field(record, ref_col),
        field(record, alt_col),
    ))
}
