/*!
Test harness for smartmon components

Bundles a scripted runner, a default configuration and a shared status so a
test can script the host, drive a component, then assert on the status.
*/

use crate::runner_stub::MockRunner;
use smartmon_core::{new_state, read_snapshot, HealthSnapshot, MonitorConfig, SharedStatus, StatusAggregator};
use std::sync::Arc;
use anyhow::Result;

pub struct TestHarness {
    pub runner: MockRunner,
    pub config: MonitorConfig,
    pub status: SharedStatus,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::builder().is_test(true).try_init().ok();

        let config = MonitorConfig::default();
        let status = new_state(StatusAggregator::from_config(&config));
        Self {
            runner: MockRunner::new(),
            config,
            status,
        }
    }

    /// The runner as the trait object components take
    pub fn runner_handle(&self) -> Arc<MockRunner> {
        Arc::new(self.runner.clone())
    }

    /// Script `lsblk` to list these bare device names
    pub fn script_device_list(&self, names: &[&str]) -> &Self {
        let listing = names.iter().map(|n| format!("{}\n", n)).collect::<String>();
        self.runner.on_output(self.config.devices.list_command.to_string(), listing);
        self
    }

    /// Script a successful smartctl report for a device path
    pub fn script_report(&self, device: &str, report: &str) -> &Self {
        self.runner.on_output(self.config.smartctl_command(device).to_string(), report);
        self
    }

    /// Script a smartctl exit status for a device path
    pub fn script_report_exit(&self, device: &str, exit_code: i32) -> &Self {
        self.runner.on_exit(self.config.smartctl_command(device).to_string(), exit_code);
        self
    }

    /// Script the text returned by the backlog read
    pub fn script_backlog(&self, text: &str) -> &Self {
        self.runner.on_output(self.config.backlog_command().to_string(), text);
        self
    }

    /// Script both environment queries
    pub fn script_environment(&self, tool_installed: bool, service_running: bool) -> &Self {
        let which = self.config.tool_check_command().to_string();
        if tool_installed {
            self.runner.on_output(which, "/usr/sbin/smartctl\n");
        } else {
            self.runner.on_exit(which, 1);
        }

        let is_active = self.config.service_check_command().to_string();
        let state = if service_running { "active\n" } else { "inactive\n" };
        self.runner.on(
            is_active,
            crate::runner_stub::MockResponse::Output(smartmon_core::CommandOutput {
                exit_code: Some(if service_running { 0 } else { 3 }),
                stdout: state.to_string(),
                stderr: String::new(),
            }),
        );
        self
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        read_snapshot(&self.status)
    }

    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }

    /// Assert the exact, sorted problem set
    pub fn assert_problems(&self, expected: &[&str]) -> Result<()> {
        let snapshot = self.snapshot();
        if snapshot.problems != expected {
            anyhow::bail!("problem set mismatch: expected {:?}, got {:?}", expected, snapshot.problems);
        }
        log::info!("✅ problems = {:?}", expected);
        Ok(())
    }

    pub fn assert_headline(&self, expected: &str) -> Result<()> {
        let snapshot = self.snapshot();
        if snapshot.headline != expected {
            anyhow::bail!("headline mismatch: expected {:?}, got {:?}", expected, snapshot.headline);
        }
        Ok(())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
