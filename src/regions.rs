//! Target regions given as `locus,start,end` (1-based, inclusive)

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub locus: String,
    pub start: u64,
    pub end: u64,
}

impl Region {
    /// samtools-style `chrom:start-end`
    pub fn to_region_string(&self, chrom: &str) -> String {
        format!("{}:{}-{}", chrom, self.start, self.end)
    }

    pub fn span(&self) -> u64 {
        self.end - self.start + 1
    }
}

pub fn read_regions<R: Read>(reader: R, source_name: &str) -> Result<Vec<Region>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut regions = Vec::new();
    for (i, record) in rdr.deserialize::<Region>().enumerate() {
        let region: Region = record.map_err(|e| {
            PipelineError::malformed(
                source_name,
                format!("expected header 'locus,start,end': {}", e),
            )
        })?;
        if region.start == 0 || region.end < region.start {
            return Err(PipelineError::Validation(format!(
                "region {} on line {} has invalid coordinates {}-{}",
                region.locus,
                i + 2,
                region.start,
                region.end
            )));
        }
        regions.push(region);
    }

    if regions.is_empty() {
        return Err(PipelineError::Validation(format!(
            "no regions found in {}",
            source_name
        )));
    }

    Ok(regions)
}

pub fn read_regions_path<P: AsRef<Path>>(path: P) -> Result<Vec<Region>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_regions(file, &path.display().to_string())
}

/// `chrom, start-1, end-1, locus`, the BED sambamba reads
pub fn write_bed4<W: Write>(regions: &[Region], chrom: &str, mut writer: W) -> Result<()> {
    for region in regions {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            chrom,
            region.start - 1,
            region.end - 1,
            region.locus
        )?;
    }
    Ok(())
}

/// `chrom, start-1, end-1`, the BED the variant-calling pipeline reads
pub fn write_bed3<W: Write>(regions: &[Region], chrom: &str, mut writer: W) -> Result<()> {
    for region in regions {
        writeln!(writer, "{}\t{}\t{}", chrom, region.start - 1, region.end - 1)?;
    }
    Ok(())
}
