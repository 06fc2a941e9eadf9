//! External tool execution.
//!
//! Every tool the packer drives (compiler, binutils, flashers) goes through
//! [`Cmd`], so failures always carry the program name and whatever the tool
//! printed.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// Captured outcome of a finished command.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: ExitStatus,
    /// Raw stdout; compiler output is binary.
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// Stdout decoded lossily as text.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Combined diagnostic text: stderr, else stdout.
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout_text().trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Builder for one tool invocation.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    input: Option<Vec<u8>>,
    allow_fail: bool,
    error_prefix: Option<String>,
}

impl Cmd {
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            current_dir: None,
            input: None,
            allow_fail: false,
            error_prefix: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_string()));
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Bytes written to the child's stdin, which is then closed.
    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Return non-zero exits as results instead of errors.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    pub fn error_msg(mut self, msg: impl AsRef<str>) -> Self {
        self.error_prefix = Some(msg.as_ref().to_string());
        self
    }

    /// Program followed by its arguments, for logs and dry runs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn failure_prefix(&self) -> String {
        self.error_prefix
            .clone()
            .unwrap_or_else(|| format!("'{}' failed", self.program))
    }

    /// Run to completion, capturing stdout and stderr.
    pub fn run(self) -> Result<CommandResult> {
        debug!(command = %self.command_line(), "running");

        let mut cmd = self.command();
        cmd.stdin(if self.input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program))?;

        // Feed stdin from a separate thread; a tool that writes a lot before
        // reading all its input would otherwise block on a full pipe.
        let writer = match self.input.clone() {
            Some(input) => {
                let mut stdin = child
                    .stdin
                    .take()
                    .context("child stdin was not captured")?;
                Some(std::thread::spawn(move || stdin.write_all(&input)))
            }
            None => None,
        };

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for '{}'", self.program))?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(written) => {
                    // A tool may legitimately exit without draining stdin.
                    if let Err(e) = written {
                        debug!(program = %self.program, error = %e, "stdin not fully consumed");
                    }
                }
                Err(_) => bail!("stdin writer for '{}' panicked", self.program),
            }
        }

        let result = CommandResult {
            status: output.status,
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !self.allow_fail && !result.success() {
            let details = result.diagnostics();
            if details.is_empty() {
                bail!("{} (exit code {})", self.failure_prefix(), result.code());
            }
            bail!(
                "{} (exit code {}):\n{}",
                self.failure_prefix(),
                result.code(),
                details
            );
        }

        Ok(result)
    }

    /// Run with inherited stdio so the user sees the tool's progress.
    pub fn run_interactive(self) -> Result<ExitStatus> {
        debug!(command = %self.command_line(), "running interactively");

        let mut cmd = self.command();
        cmd.stdin(Stdio::inherit());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());

        let status = cmd
            .status()
            .with_context(|| format!("Failed to execute '{}'. Is it installed?", self.program))?;

        if !self.allow_fail && !status.success() {
            bail!(
                "{} (exit code {})",
                self.failure_prefix(),
                status.code().unwrap_or(-1)
            );
        }

        Ok(status)
    }
}

/// Locate a program on `PATH`.
pub fn which(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let result = Cmd::new("echo").args(["one", "two"]).run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout, b"one two\n");
    }

    #[test]
    fn test_stdin_is_forwarded() {
        let result = Cmd::new("cat").stdin("wrapped source").run().unwrap();
        assert_eq!(result.stdout_text(), "wrapped source");
    }

    #[test]
    fn test_failure_includes_stderr() {
        let err = Cmd::new("ls")
            .arg("/nonexistent_path_12345")
            .run()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'ls' failed"));
        assert!(msg.contains("No such file") || msg.contains("cannot access"));
    }

    #[test]
    fn test_failure_falls_back_to_stdout() {
        let err = Cmd::new("sh")
            .args(["-c", "echo 'SyntaxError: line 3'; exit 2"])
            .error_msg("compile failed")
            .run()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("compile failed (exit code 2)"));
        assert!(msg.contains("SyntaxError: line 3"));
    }

    #[test]
    fn test_allow_fail() {
        let result = Cmd::new("false").allow_fail().run().unwrap();
        assert!(!result.success());
        assert_eq!(result.code(), 1);
    }

    #[test]
    fn test_missing_program() {
        let err = Cmd::new("nonexistent_program_12345").run().unwrap_err();
        assert!(err.to_string().contains("Is it installed?"));
    }

    #[test]
    fn test_run_in_directory() {
        let result = Cmd::new("pwd").dir(Path::new("/tmp")).run().unwrap();
        assert!(result.stdout_text().contains("tmp"));
    }

    #[test]
    fn test_command_line() {
        let cmd = Cmd::new("arm-none-eabi-nm").arg_path(Path::new("/w/dht11.lib"));
        assert_eq!(cmd.command_line(), "arm-none-eabi-nm /w/dht11.lib");
    }

    #[test]
    fn test_which() {
        assert!(which("sh").is_some());
        assert!(which("nonexistent_program_12345").is_none());
    }
}
