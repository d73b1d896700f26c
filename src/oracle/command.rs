//! Local LM command backend.
//!
//! The command is split with shell-words, receives the system prompt and the
//! input block on stdin, and must print its answer on stdout. Tools like
//! `llm`, `ollama run`, or a wrapper script all fit.
use super::ReasoningOracle;
use anyhow::{anyhow, Context, Result};
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CommandOracle {
    command: String,
}

impl CommandOracle {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl ReasoningOracle for CommandOracle {
    fn generate(&self, system_prompt: &str, input: &str) -> Result<String> {
        let prompt = format!("{}\n\n{}", system_prompt.trim_end(), input);
        invoke_lm_command(&self.command, &prompt)
    }
}

fn invoke_lm_command(command: &str, prompt: &str) -> Result<String> {
    let args =
        shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
    let Some((program, rest)) = args.split_first() else {
        return Err(anyhow!("LM command is empty"));
    };

    let start = Instant::now();
    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawn LM command: {program}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        // A command that answers without reading its input closes the pipe early.
        match stdin.write_all(prompt.as_bytes()) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::BrokenPipe => {}
            Err(err) => return Err(err).context("write prompt to LM stdin"),
        }
    }

    let output = child.wait_with_output().context("wait for LM command")?;
    let elapsed_ms = start.elapsed().as_millis();

    tracing::info!(
        elapsed_ms,
        prompt_bytes = prompt.len(),
        response_bytes = output.stdout.len(),
        "lm invoke complete"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "LM command failed with status {}: {}",
            output.status,
            stderr.trim()
        ));
    }

    String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_is_rejected() {
        let oracle = CommandOracle::new("   ");
        let err = oracle.generate("system", "input").expect_err("empty command");
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        let oracle = CommandOracle::new("llm 'unterminated");
        assert!(oracle.generate("system", "input").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn echoes_stdin_through_cat() {
        let oracle = CommandOracle::new("cat");
        let response = oracle
            .generate("You are an auditor.", "Tracking: 1Z")
            .expect("cat response");
        assert_eq!(response, "You are an auditor.\n\nTracking: 1Z");
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_reports_status() {
        let oracle = CommandOracle::new("sh -c 'echo nope >&2; exit 3'");
        let err = oracle.generate("system", "input").expect_err("failure");
        assert!(err.to_string().contains("nope"));
    }
}
