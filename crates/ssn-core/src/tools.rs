//! External tool invocation abstraction
//!
//! Generalizes the "invoke an external program, capture its output,
//! classify known failure text" shape used for CD-HIT and BLAST/DIAMOND
//! into a single typed wrapper with captured stdout/stderr and structured
//! error parsing, instead of embedded shell-command generation.

use std::process::Command;
use tracing::{debug, error};

use crate::error::PipelineError;

/// A named external executable (`cd-hit`, `blastp`, `diamond`, ...).
pub struct ExternalTool {
    name: String,
    binary: String,
}

/// Captured result of one invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExternalTool {
    pub fn new(name: impl Into<String>, binary: impl Into<String>) -> Self {
        Self { name: name.into(), binary: binary.into() }
    }

    /// Run the tool with the given arguments, returning a typed error if
    /// the process fails to spawn or exits non-zero.
    pub fn run(&self, args: &[String]) -> Result<ToolOutput, PipelineError> {
        debug!(tool = %self.name, args = ?args, "invoking external tool");
        let output = Command::new(&self.binary).args(args).output().map_err(|e| PipelineError::ExternalTool {
            tool: self.name.clone(),
            detail: format!("failed to spawn: {e}"),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            error!(tool = %self.name, exit_code, stderr = %stderr, "external tool failed");
            return Err(PipelineError::ExternalTool { tool: self.name.clone(), detail: stderr });
        }

        Ok(ToolOutput { stdout, stderr, exit_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_reports_spawn_failure_as_typed_error() {
        let tool = ExternalTool::new("nonexistent", "definitely-not-a-real-binary-xyz");
        let result = tool.run(&[]);
        assert!(result.is_err());
    }
}
