//! samtools preparation of aligned reads

use crate::config::{READS_BAM, READS_SORTED_BAM};
use crate::error::{PipelineError, Result};
use crate::external::{ToolCommand, ToolRunner};
use std::path::{Path, PathBuf};

pub fn is_bam(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("bam")
}

/// Convert to BAM if needed, then sort and index into `workdir`.
///
/// A reference FASTA is passed to `samtools view` for CRAM input.
pub fn prepare_sorted_bam<R: ToolRunner + ?Sized>(
    runner: &R,
    input: &Path,
    reference: Option<&Path>,
    workdir: &Path,
) -> Result<PathBuf> {
    let bam = if is_bam(input) {
        input.to_path_buf()
    } else {
        let bam = workdir.join(READS_BAM);
        let mut view = ToolCommand::new("samtools").arg("view").arg("-b").arg("-h");
        if let Some(reference) = reference {
            view = view.arg("-T").path(reference);
        }
        runner.run(&view.arg("-o").path(&bam).path(input))?.check()?;
        bam
    };

    let sorted = workdir.join(READS_SORTED_BAM);
    let sort = ToolCommand::new("samtools")
        .arg("sort")
        .path(&bam)
        .arg("-o")
        .path(&sorted);
    runner.run(&sort)?.check()?;
    index_bam(runner, &sorted)?;

    Ok(sorted)
}

pub fn index_bam<R: ToolRunner + ?Sized>(runner: &R, bam: &Path) -> Result<()> {
    let index = ToolCommand::new("samtools").arg("index").path(bam);
    runner.run(&index)?.check()?;
    Ok(())
}

/// Name of the reference sequence the reads were aligned against
pub fn reference_name<R: ToolRunner + ?Sized>(runner: &R, bam: &Path) -> Result<String> {
    let idxstats = ToolCommand::new("samtools").arg("idxstats").path(bam);
    let output = runner.run(&idxstats)?;
    let tool = output.tool.clone();
    let table = output.into_table()?;
    table
        .split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| PipelineError::UpstreamToolFailure {
            tool,
            stderr: "empty idxstats output".to_string(),
        })
}
