//! External command seam.
//!
//! Every interaction with the host (smartctl, lsblk, journalctl, systemctl,
//! which, pkexec) is a text-over-stdio invocation described by a
//! `CommandSpec` and executed through a `CommandRunner`. The agent provides
//! the process-backed implementation; tests use the devkit's scripted one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::Result;

/// Program plus arguments, as configured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Same command with one more trailing argument
    pub fn with_arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Same command run through an elevation wrapper (`pkexec systemctl ...`)
    pub fn elevated(&self, wrapper: &str) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program.clone());
        args.extend(self.args.iter().cloned());
        Self {
            program: wrapper.to_string(),
            args,
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn ok<S: Into<String>>(stdout: S) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed<S: Into<String>>(exit_code: i32, stdout: S) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Runs one external command to completion
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Execute `spec`, waiting at most `timeout` when given.
    ///
    /// A non-zero exit status is not an error: it is reported through
    /// `CommandOutput::exit_code`. Errors mean the command could not be
    /// started or did not finish in time.
    async fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> Result<CommandOutput>;
}
