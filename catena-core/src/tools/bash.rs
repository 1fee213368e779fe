//! Shell execution through `bash -c`

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use super::tool::Tool;
use crate::context::RunContext;
use crate::error::{CatenaError, Result};

/// Runs command lists in a fresh `bash` process.
///
/// Commands are joined with `;` and executed as one script. Standard error
/// is folded into standard output so the caller sees both in order.
#[derive(Debug, Clone)]
pub struct BashProcess {
    program: String,
}

impl Default for BashProcess {
    fn default() -> Self {
        Self {
            program: "bash".to_string(),
        }
    }
}

impl BashProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different shell binary (must accept `-c <script>`)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run `commands` and return the combined output.
    ///
    /// # Errors
    ///
    /// Returns a tool error if the shell cannot be started or exits with a
    /// non-zero status, and `Cancelled` if the run is cancelled first; the
    /// child is killed in that case.
    pub async fn run(&self, commands: &[String], ctx: &RunContext) -> Result<String> {
        let script = format!("exec 2>&1\n{}", commands.join(";"));
        tracing::debug!(program = %self.program, commands = commands.len(), "Running shell commands");

        let child = Command::new(&self.program)
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CatenaError::Tool {
                tool: self.program.clone(),
                message: format!("failed to start: {}", e),
            })?;

        let output = ctx
            .guard(async move {
                child
                    .wait_with_output()
                    .await
                    .map_err(CatenaError::from)
            })
            .await?;

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(CatenaError::Tool {
                tool: self.program.clone(),
                message: format!("{}: {}", output.status, text.trim_end()),
            });
        }
        Ok(text)
    }
}

/// Agent tool that runs its input as a bash script
#[derive(Debug, Clone, Default)]
pub struct BashTool {
    process: BashProcess,
}

impl BashTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(mut self, process: BashProcess) -> Self {
        self.process = process;
        self
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Runs a bash command and returns its combined stdout and stderr. Input should be a valid bash command."
    }

    async fn invoke(&self, input: &str, ctx: &RunContext) -> Result<String> {
        self.process.run(&[input.to_string()], ctx).await
    }
}
