//! Helpers intended for [`std::process::Command`] and related structures.

use std::io::Write as _;
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

/// Helpers intended for [`std::process::Command`].
pub trait CommandRunExt {
    /// Log (at debug level) the full child commandline.
    fn log_debug(&mut self) -> &mut Self;

    /// Execute the child process, capturing stderr; stdout is inherited.
    /// On failure the error message includes the captured stderr.
    fn run_capture_stderr(&mut self) -> Result<()>;

    /// Execute the child process and return its stdout as a UTF-8 string.
    fn run_get_string(&mut self) -> Result<String>;

    /// Execute the child process, writing `input` to its stdin, and
    /// return its stdout as a UTF-8 string.
    fn run_with_input(&mut self, input: &[u8]) -> Result<String>;

    /// Execute the child process with all standard streams inherited; on
    /// failure the error names the command that was run.
    fn run_inherited_with_cmd_context(&mut self) -> Result<()>;

    /// Render the command line in a form suitable for pasting into a shell.
    fn to_string_pretty(&self) -> String;
}

/// Turn a finished child into an error if it did not exit successfully.
fn check_output(cmd: &Command, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let pretty = cmd.to_string_pretty();
    if stderr.is_empty() {
        anyhow::bail!("{pretty}: {}", output.status)
    } else {
        anyhow::bail!("{pretty}: {}: {stderr}", output.status)
    }
}

fn stdout_string(output: Output) -> Result<String> {
    String::from_utf8(output.stdout).context("Parsing command output as UTF-8")
}

impl CommandRunExt for Command {
    fn log_debug(&mut self) -> &mut Self {
        tracing::debug!("exec: {}", self.to_string_pretty());
        self
    }

    fn run_capture_stderr(&mut self) -> Result<()> {
        let output = self
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Spawning {}", self.to_string_pretty()))?;
        check_output(self, &output)
    }

    fn run_get_string(&mut self) -> Result<String> {
        let output = self
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Spawning {}", self.to_string_pretty()))?;
        check_output(self, &output)?;
        stdout_string(output)
    }

    fn run_with_input(&mut self, input: &[u8]) -> Result<String> {
        let mut child = self
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Spawning {}", self.to_string_pretty()))?;
        // Dropping stdin after the write closes the pipe so the child sees EOF.
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input).context("Writing to child stdin")?;
        }
        let output = child
            .wait_with_output()
            .with_context(|| format!("Waiting for {}", self.to_string_pretty()))?;
        check_output(self, &output)?;
        stdout_string(output)
    }

    fn run_inherited_with_cmd_context(&mut self) -> Result<()> {
        let status = self
            .status()
            .with_context(|| format!("Spawning {}", self.to_string_pretty()))?;
        if !status.success() {
            anyhow::bail!("{}: {status}", self.to_string_pretty());
        }
        Ok(())
    }

    fn to_string_pretty(&self) -> String {
        std::iter::once(self.get_program())
            .chain(self.get_args())
            .map(|arg| {
                let arg = arg.to_string_lossy();
                shlex::try_quote(&arg)
                    .map(|q| q.into_owned())
                    .unwrap_or_else(|_| format!("{arg:?}"))
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
