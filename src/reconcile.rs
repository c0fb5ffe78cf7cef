//! Genotype reconciliation
//!
//! Produces one genotype value for every variant of a target universe, in the
//! universe's order. Confident calls contribute their decoded allele; targets
//! that were not called, or whose call was a no-call or too shallow, fall back
//! to the target's population allele frequency.

use crate::error::Result;
use crate::format_value;
use crate::variants::{
    CalledVariant, Depth, GenotypeCall, TargetSet, VariantKey, ALT_COLUMN, GT_COLUMN, POS_COLUMN,
    REF_COLUMN,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;

pub const DEFAULT_DEPTH_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReconciledValue {
    Called(u8),
    AlleleFrequency(f64),
}

impl ReconciledValue {
    pub fn value(&self) -> f64 {
        match self {
            Self::Called(allele) => f64::from(*allele),
            Self::AlleleFrequency(af) => *af,
        }
    }

    pub fn is_substituted(&self) -> bool {
        matches!(self, Self::AlleleFrequency(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledGenotype {
    pub key: VariantKey,
    pub value: ReconciledValue,
}

/// Genotype vector ordered like the target universe it was reconciled against
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconciledGenotypes {
    rows: Vec<ReconciledGenotype>,
}

impl ReconciledGenotypes {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReconciledGenotype> {
        self.rows.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &VariantKey> {
        self.rows.iter().map(|r| &r.key)
    }

    pub fn values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.value.value()).collect()
    }

    /// Reinterpret the genotypes as a calls table.
    ///
    /// Called values become concrete calls at `depth`; substituted values
    /// become no-calls so that they resolve to the allele frequency again.
    /// Reconciling the result is stable only through this typed view: the
    /// written `GT` column loses the distinction, and `read_calls` would
    /// decode a substituted `0.3` as allele 0.
    pub fn as_calls(&self, depth: u32) -> Vec<CalledVariant> {
        self.rows
            .iter()
            .map(|r| {
                let genotype = match r.value {
                    ReconciledValue::Called(allele) => GenotypeCall::Allele(allele),
                    ReconciledValue::AlleleFrequency(_) => GenotypeCall::NoCall,
                };
                CalledVariant::new(r.key.clone(), genotype, Depth(i64::from(depth)))
            })
            .collect()
    }

    /// Write as `POS,REF,ALT,GT`
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record([POS_COLUMN, REF_COLUMN, ALT_COLUMN, GT_COLUMN])?;
        for row in &self.rows {
            wtr.write_record([
                row.key.pos.to_string(),
                row.key.reference.clone(),
                row.key.alternate.clone(),
                format_value(row.value.value()),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Summary counters of a reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub shared_variants: usize,
    pub dropped_variants: usize,
    pub missing_variants: usize,
    pub noncalls: usize,
    #[serde(rename = "variants_set_to_AF")]
    pub variants_set_to_af: usize,
}

impl ReconcileStats {
    pub fn entries(&self) -> [(&'static str, usize); 5] {
        [
            ("shared_variants", self.shared_variants),
            ("dropped_variants", self.dropped_variants),
            ("missing_variants", self.missing_variants),
            ("noncalls", self.noncalls),
            ("variants_set_to_AF", self.variants_set_to_af),
        ]
    }

    /// `#parameter,value` followed by one `#name,value` line per counter
    pub fn write_comment_header<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "#parameter,value")?;
        for (name, value) in self.entries() {
            writeln!(writer, "#{},{}", name, value)?;
        }
        Ok(())
    }

    /// One `name,value` line per counter
    pub fn write_key_values<W: Write>(&self, mut writer: W) -> Result<()> {
        for (name, value) in self.entries() {
            writeln!(writer, "{},{}", name, value)?;
        }
        Ok(())
    }
}

/// Reconcile `calls` against the `targets` universe.
///
/// Calls whose key appears more than once are resolved to their first
/// occurrence. Calls outside the universe are only counted.
pub fn reconcile(
    targets: &TargetSet,
    calls: &[CalledVariant],
    depth_threshold: u32,
) -> (ReconciledGenotypes, ReconcileStats) {
    let mut by_key: HashMap<&VariantKey, &CalledVariant> = HashMap::with_capacity(calls.len());
    for call in calls {
        by_key.entry(&call.key).or_insert(call);
    }

    let mut stats = ReconcileStats {
        dropped_variants: by_key.keys().filter(|k| !targets.contains(k)).count(),
        ..Default::default()
    };

    let rows = targets
        .iter()
        .map(|target| {
            let value = match by_key.get(&target.key) {
                Some(call) => {
                    stats.shared_variants += 1;
                    match call.confident_allele(depth_threshold) {
                        Some(allele) => ReconciledValue::Called(allele),
                        None => {
                            stats.noncalls += 1;
                            ReconciledValue::AlleleFrequency(target.allele_frequency)
                        }
                    }
                }
                None => {
                    stats.missing_variants += 1;
                    ReconciledValue::AlleleFrequency(target.allele_frequency)
                }
            };
            ReconciledGenotype {
                key: target.key.clone(),
                value,
            }
        })
        .collect();

    stats.variants_set_to_af = stats.noncalls + stats.missing_variants;

    (ReconciledGenotypes { rows }, stats)
}
