/*!
Scripted command runner for tests without smartmontools or systemd

Lets tests describe what each command line "prints" and records every
invocation for assertions. Unscripted commands behave like a missing binary.
*/

use async_trait::async_trait;
use smartmon_core::{CommandOutput, CommandRunner, CommandSpec, MonitorError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scripted behaviour for one command line
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Finishes immediately with this output
    Output(CommandOutput),
    /// Finishes with this output after a delay (subject to the caller's timeout)
    Delayed(Duration, CommandOutput),
    /// Spawn fails as if the binary were not on PATH
    Missing,
}

/// Mock runner that stands in for `SystemRunner`
#[derive(Clone, Default)]
pub struct MockRunner {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    invocations: Arc<Mutex<Vec<CommandSpec>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for an exact command line (`"smartctl -a -d sat /dev/sda"`)
    pub fn on<S: Into<String>>(&self, command_line: S, response: MockResponse) -> &Self {
        self.responses.lock().unwrap().insert(command_line.into(), response);
        self
    }

    /// Successful run printing `stdout`
    pub fn on_output<S: Into<String>, O: Into<String>>(&self, command_line: S, stdout: O) -> &Self {
        self.on(command_line, MockResponse::Output(CommandOutput::ok(stdout)))
    }

    /// Run ending with a non-zero exit code
    pub fn on_exit<S: Into<String>>(&self, command_line: S, exit_code: i32) -> &Self {
        self.on(command_line, MockResponse::Output(CommandOutput::failed(exit_code, "")))
    }

    pub fn on_missing<S: Into<String>>(&self, command_line: S) -> &Self {
        self.on(command_line, MockResponse::Missing)
    }

    pub fn on_delay<S: Into<String>, O: Into<String>>(&self, command_line: S, delay: Duration, stdout: O) -> &Self {
        self.on(command_line, MockResponse::Delayed(delay, CommandOutput::ok(stdout)))
    }

    /// Every command run so far, in call order
    pub fn invocations(&self) -> Vec<CommandSpec> {
        self.invocations.lock().unwrap().clone()
    }

    /// Command lines run so far, rendered as strings
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations().iter().map(ToString::to_string).collect()
    }

    pub fn was_invoked(&self, command_line: &str) -> bool {
        self.command_lines().iter().any(|line| line == command_line)
    }

    pub fn clear(&self) {
        self.responses.lock().unwrap().clear();
        self.invocations.lock().unwrap().clear();
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> smartmon_core::Result<CommandOutput> {
        self.invocations.lock().unwrap().push(spec.clone());
        let key = spec.to_string();
        let response = self.responses.lock().unwrap().get(&key).cloned();

        log::debug!("[MOCK] run {}", key);

        match response {
            Some(MockResponse::Output(output)) => Ok(output),
            Some(MockResponse::Delayed(delay, output)) => match timeout {
                Some(limit) if limit < delay => {
                    tokio::time::sleep(limit).await;
                    Err(MonitorError::Timeout {
                        program: spec.program.clone(),
                        timeout: limit,
                    })
                }
                _ => {
                    tokio::time::sleep(delay).await;
                    Ok(output)
                }
            },
            Some(MockResponse::Missing) | None => Err(MonitorError::Spawn {
                program: spec.program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }),
        }
    }
}
