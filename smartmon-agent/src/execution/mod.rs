//! Command execution for the smartmon agent
//!
//! Handles every external invocation on the real host:
//! - Captured runs with timeout (`SystemRunner`, the `CommandRunner` impl)
//! - Privileged actions (start/stop smartd, install smartmontools)

use async_trait::async_trait;
use serde::Serialize;
use smartmon_core::{CommandOutput, CommandRunner, CommandSpec, MonitorConfig, MonitorError, PrivilegedAction};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command as AsyncCommand;
use tracing::{debug, error, info, warn};

/// Outcome of a privileged action, logged and returned to the CLI
#[derive(Debug, Serialize)]
pub struct ExecutionResult {
    pub action: PrivilegedAction,
    pub command: String,
    pub success: bool,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u128,
}

/// Runs commands as child processes of the agent
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Option<Duration>) -> smartmon_core::Result<CommandOutput> {
        debug!("Executing: {} (timeout: {:?})", spec, timeout);

        let mut command = AsyncCommand::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let spawn_error = |source: std::io::Error| MonitorError::Spawn {
            program: spec.program.clone(),
            source,
        };

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| MonitorError::Timeout {
                    program: spec.program.clone(),
                    timeout: limit,
                })?
                .map_err(spawn_error)?,
            None => command.output().await.map_err(spawn_error)?,
        };

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Privileged action dispatcher
pub struct CommandExecutor;

impl CommandExecutor {
    /// Run a privileged action through the configured elevation wrapper.
    ///
    /// Never fails: the outcome is logged and reported in the result. The
    /// monitor picks up the new environment state on its next check.
    pub async fn execute_action(
        runner: &dyn CommandRunner,
        config: &MonitorConfig,
        action: PrivilegedAction,
    ) -> ExecutionResult {
        let spec = config.action_command(action);
        let start_time = Instant::now();
        info!("Executing privileged action {:?}: {}", action, spec);

        let result = runner.run(&spec, None).await;
        let execution_time = start_time.elapsed().as_millis();

        match result {
            Ok(output) => {
                let success = output.success();
                if success {
                    info!("Action {:?} completed in {} ms", action, execution_time);
                } else {
                    warn!(
                        "Action {:?} exited with {:?}: {}",
                        action,
                        output.exit_code,
                        output.stderr.trim()
                    );
                }
                ExecutionResult {
                    action,
                    command: spec.to_string(),
                    success,
                    error: (!success).then(|| output.stderr.trim().to_string()).filter(|e| !e.is_empty()),
                    exit_code: output.exit_code,
                    execution_time_ms: execution_time,
                }
            }
            Err(e) => {
                error!("Action {:?} could not run: {}", action, e);
                ExecutionResult {
                    action,
                    command: spec.to_string(),
                    success: false,
                    error: Some(e.to_string()),
                    exit_code: None,
                    execution_time_ms: execution_time,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartmon_devkit::MockRunner;

    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let runner = SystemRunner::new();
        let output = runner
            .run(&CommandSpec::new("echo", ["Hello World"]), Some(Duration::from_secs(5)))
            .await
            .unwrap();

        assert!(output.success());
        assert_eq!(output.stdout.trim(), "Hello World");
    }

    #[tokio::test]
    async fn test_system_runner_reports_exit_code() {
        let runner = SystemRunner::new();
        let output = runner
            .run(&CommandSpec::new("sh", ["-c", "exit 3"]), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert_eq!(output.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_command_timeout() {
        let runner = SystemRunner::new();
        let err = runner
            .run(&CommandSpec::new("sleep", ["10"]), Some(Duration::from_millis(200)))
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = SystemRunner::new();
        let err = runner
            .run(&CommandSpec::new("smartmon-no-such-binary", Vec::<String>::new()), None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_privileged_action_is_elevated_and_logged() {
        let runner = MockRunner::new();
        let config = MonitorConfig::default();
        runner.on_output("pkexec systemctl start smartd", "");
        runner.on_exit("pkexec systemctl stop smartd", 126);

        let started = CommandExecutor::execute_action(&runner, &config, PrivilegedAction::StartService).await;
        assert!(started.success);
        assert_eq!(started.command, "pkexec systemctl start smartd");

        let stopped = CommandExecutor::execute_action(&runner, &config, PrivilegedAction::StopService).await;
        assert!(!stopped.success);
        assert_eq!(stopped.exit_code, Some(126));

        let installed = CommandExecutor::execute_action(&runner, &config, PrivilegedAction::InstallPackage).await;
        assert!(!installed.success);
        assert!(installed.error.is_some());
        assert!(runner.was_invoked("pkexec apt install -y smartmontools"));
    }
}
