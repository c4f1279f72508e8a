// This module is the narrow process-execution capability the orchestration code depends on.
// A BuildCommand names a program and its arguments; a CommandRunner executes it in a given
// working directory and hands back a CommandOutput with the exit code and the captured
// stdout/stderr. SystemRunner is the real implementation on top of std::process::Command.
// Keeping execution behind a trait lets the continue-on-failure policy of the build runner be
// tested with scripted fakes instead of real multi-hour builds.

//! External command execution.

use std::env;
use std::fmt;
use std::io;
use std::path::Path;
use std::process::Command;

/// A program invocation, e.g. `./do_all`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl BuildCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for BuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Everything the command printed plus its exit status, for reports.
    pub fn diagnostic(&self) -> String {
        let mut text = String::new();
        match self.exit_code {
            Some(code) => text.push_str(&format!("exit status {}", code)),
            None => text.push_str("terminated by signal"),
        }
        for stream in [&self.stdout, &self.stderr] {
            let stream = stream.trim_end();
            if !stream.is_empty() {
                text.push('\n');
                text.push_str(stream);
            }
        }
        text
    }
}

/// Runs external commands synchronously.
pub trait CommandRunner {
    /// Run `command` with `cwd` as working directory and wait for it to exit.
    ///
    /// An `Err` means the command could not be started at all; a command that
    /// ran and failed is an `Ok` with a non-zero exit code.
    fn run(&mut self, command: &BuildCommand, cwd: &Path) -> io::Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, command: &BuildCommand, cwd: &Path) -> io::Result<CommandOutput> {
        log::debug!("running `{}` in {}", command, cwd.display());

        // The child changes into cwd before exec, so a relative cwd must not be
        // joined onto the script path a second time.
        let cwd = if cwd.is_absolute() {
            cwd.to_path_buf()
        } else {
            env::current_dir()?.join(cwd)
        };

        // Scripts named relative to the build directory are resolved against it
        let program = if command.program.starts_with("./") {
            cwd.join(&command.program).into_os_string()
        } else {
            command.program.clone().into()
        };

        let output = Command::new(program)
            .args(&command.args)
            .current_dir(&cwd)
            .output()?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
