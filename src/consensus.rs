//! Consensus sequences of target loci from raw reads
//!
//! The container's variant-calling script aligns the reads (bwa-mem2) and calls
//! variants (freebayes); a second script applies the variants to the reference
//! for each locus and prints the consensus sequence.

use crate::config::{ALIGNMENT_FILES_DIR, CHROMOSOME, TARGET_LOCI_BED, VARIANTS_VCF};
use crate::error::Result;
use crate::external::{ToolCommand, ToolRunner};
use crate::regions::{write_bed3, Region};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusSequence {
    pub locus: String,
    pub sequence: String,
}

pub struct ConsensusExtractor<'a, R: ToolRunner + ?Sized> {
    pub runner: &'a R,
    pub reference: PathBuf,
    pub variant_calling_script: PathBuf,
    pub consensus_script: PathBuf,
    pub workdir: PathBuf,
    pub threads: usize,
}

impl<'a, R: ToolRunner + ?Sized> ConsensusExtractor<'a, R> {
    /// Align + call variants once, then extract every locus in `regions` order.
    ///
    /// Both scripts run inside `workdir`, where the pipeline leaves
    /// `variants.vcf.gz` and `alignment-files/`.
    pub fn extract(
        &self,
        forward_reads: &Path,
        reverse_reads: &Path,
        regions: &[Region],
    ) -> Result<Vec<ConsensusSequence>> {
        let mut writer = BufWriter::new(File::create(self.workdir.join(TARGET_LOCI_BED))?);
        write_bed3(regions, CHROMOSOME, &mut writer)?;
        writer.flush()?;
        drop(writer);

        let reference = absolute(&self.reference)?;
        let pipeline = ToolCommand::script(absolute(&self.variant_calling_script)?)
            .path(absolute(forward_reads)?)
            .path(absolute(reverse_reads)?)
            .path(&reference)
            .arg(TARGET_LOCI_BED)
            .arg(self.threads.to_string())
            .in_dir(&self.workdir);
        self.runner.run(&pipeline)?.check()?;

        let consensus_script = absolute(&self.consensus_script)?;
        let alignment_dir = Path::new(ALIGNMENT_FILES_DIR);
        regions
            .iter()
            .map(|region| {
                log::info!("extracting consensus for {} ({} bp)", region.locus, region.span());
                let command = ToolCommand::script(&consensus_script)
                    .path(&reference)
                    .arg(VARIANTS_VCF)
                    .arg(region.to_region_string(CHROMOSOME))
                    .path(alignment_dir.join(format!("{}.fasta", region.locus)))
                    .in_dir(&self.workdir);
                let table = self.runner.run(&command)?.into_table()?;
                Ok(ConsensusSequence {
                    locus: region.locus.clone(),
                    sequence: table.split_whitespace().collect(),
                })
            })
            .collect()
    }
}

/// Anchor a relative path at the current directory
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

pub fn write_fasta<W: Write>(sequences: &[ConsensusSequence], mut writer: W) -> Result<()> {
    for record in sequences {
        writeln!(writer, ">{}", record.locus)?;
        writeln!(writer, "{}", record.sequence)?;
    }
    Ok(())
}
