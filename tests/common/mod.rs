#![allow(dead_code)]

use mtb_amr_tools::external::{ToolCommand, ToolOutput, ToolRunner};
use mtb_amr_tools::variants::{CalledVariant, Depth, GenotypeCall, TargetSet, TargetVariant, VariantKey};
use mtb_amr_tools::Result;
use std::cell::RefCell;

/// Runner answering every command with a canned reply and recording the
/// command lines it saw
pub struct ScriptedRunner<F: Fn(&ToolCommand) -> ToolOutput> {
    reply: F,
    pub commands: RefCell<Vec<ToolCommand>>,
}

impl<F: Fn(&ToolCommand) -> ToolOutput> ScriptedRunner<F> {
    pub fn new(reply: F) -> Self {
        Self {
            reply,
            commands: RefCell::new(Vec::new()),
        }
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.commands.borrow().iter().map(|c| c.to_string()).collect()
    }
}

impl<F: Fn(&ToolCommand) -> ToolOutput> ToolRunner for ScriptedRunner<F> {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput> {
        self.commands.borrow_mut().push(command.clone());
        Ok((self.reply)(command))
    }
}

pub fn ok(command: &ToolCommand, stdout: &str) -> ToolOutput {
    ToolOutput {
        tool: command.name(),
        success: true,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn failed(command: &ToolCommand, stderr: &str) -> ToolOutput {
    ToolOutput {
        tool: command.name(),
        success: false,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

pub fn key(pos: u64, reference: &str, alternate: &str) -> VariantKey {
    VariantKey::new(pos, reference, alternate)
}

pub fn targets(rows: &[(u64, &str, &str, f64)]) -> TargetSet {
    TargetSet::new(
        rows.iter()
            .map(|&(pos, r, a, af)| TargetVariant::new(key(pos, r, a), af))
            .collect(),
    )
    .expect("valid target set")
}

pub fn call(pos: u64, reference: &str, alternate: &str, gt: &str, dp: i64) -> CalledVariant {
    CalledVariant::new(
        key(pos, reference, alternate),
        GenotypeCall::parse(gt).expect("valid genotype code"),
        Depth(dp),
    )
}
