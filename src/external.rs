//! External tool invocation
//!
//! Every samtools / sambamba / pipeline-script call goes through
//! [`ToolRunner`], so parsing code only ever sees captured text and a failure
//! carries the tool's own diagnostics.

use crate::config::SHELL;
use crate::error::{PipelineError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    dir: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
        }
    }

    /// A bash script run through the container shell
    pub fn script(script: impl AsRef<Path>) -> Self {
        Self::new(SHELL).path(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push(path.as_ref().display().to_string());
        self
    }

    /// Run the command from `dir` instead of the current directory
    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Short name for diagnostics: the script for shell invocations, the
    /// program plus its subcommand otherwise
    pub fn name(&self) -> String {
        let base = |s: &str| {
            Path::new(s)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(s)
                .to_string()
        };
        match (self.program.as_str(), self.args.first()) {
            (SHELL, Some(script)) => base(script),
            (program, Some(sub)) if !sub.starts_with('-') && !sub.contains('/') => {
                format!("{} {}", base(program), sub)
            }
            (program, _) => base(program),
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolOutput {
    pub tool: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Fail with the captured stderr unless the tool exited successfully
    pub fn check(self) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(PipelineError::UpstreamToolFailure {
                tool: self.tool,
                stderr: self.stderr,
            })
        }
    }

    /// Stdout as a table; a blank stdout means the tool failed upstream
    pub fn into_table(self) -> Result<String> {
        if self.stdout.trim().is_empty() {
            Err(PipelineError::UpstreamToolFailure {
                tool: self.tool,
                stderr: self.stderr,
            })
        } else {
            Ok(self.stdout)
        }
    }
}

pub trait ToolRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput>;
}

/// Runs commands as blocking child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        let mut process = Command::new(command.program());
        process.args(command.args());
        match command.dir() {
            Some(dir) => {
                log::info!("running command in {} -> {}", dir.display(), command);
                process.current_dir(dir);
            }
            None => log::info!("running command -> {}", command),
        }
        let output = process
            .output()
            .map_err(|e| PipelineError::UpstreamToolFailure {
                tool: command.name(),
                stderr: format!("could not run command -> {} -> {}", command, e),
            })?;

        let result = ToolOutput {
            tool: command.name(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !result.success {
            log::warn!("{} exited with {}", result.tool, output.status);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_display_and_name() {
        let cmd = ToolCommand::new("samtools")
            .arg("sort")
            .path("reads.bam")
            .arg("-o")
            .arg("reads.sorted.bam");
        assert_eq!(cmd.to_string(), "samtools sort reads.bam -o reads.sorted.bam");
        assert_eq!(cmd.name(), "samtools sort");

        let script = ToolCommand::script("/get_genotypes.sh").path("x.bam");
        assert_eq!(script.program(), SHELL);
        assert_eq!(script.name(), "get_genotypes.sh");
    }

    #[test]
    fn test_blank_stdout_is_upstream_failure() {
        let output = ToolOutput {
            tool: "get_genotypes.sh".to_string(),
            success: true,
            stdout: "\n".to_string(),
            stderr: "freebayes: could not open BAM".to_string(),
        };
        let err = output.into_table().unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamToolFailure { .. }));
        assert!(err.to_string().contains("could not open BAM"));
    }

    #[test]
    fn test_check_failed_status() {
        let output = ToolOutput {
            tool: "samtools index".to_string(),
            success: false,
            ..Default::default()
        };
        assert!(output.check().is_err());
    }

    #[test]
    fn test_system_runner_captures_output() {
        let cmd = ToolCommand::new("sh").arg("-c").arg("printf 'a,b\\n1,2\\n'; printf oops >&2");
        let output = SystemRunner.run(&cmd).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout, "a,b\n1,2\n");
        assert_eq!(output.stderr, "oops");
    }

    #[test]
    fn test_system_runner_uses_command_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = ToolCommand::new("sh")
            .arg("-c")
            .arg("touch marker && pwd")
            .in_dir(dir.path());
        let output = SystemRunner.run(&cmd).unwrap();
        assert!(output.success);
        assert!(dir.path().join("marker").exists());
    }

    #[test]
    fn test_system_runner_missing_program() {
        let cmd = ToolCommand::new("definitely-not-a-real-tool-xyz");
        assert!(matches!(
            SystemRunner.run(&cmd),
            Err(PipelineError::UpstreamToolFailure { .. })
        ));
    }
}
