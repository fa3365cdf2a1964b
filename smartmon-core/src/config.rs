//! Monitor configuration
//!
//! Every external program and argument the monitor uses is configurable;
//! the defaults reproduce the classic smartmontools setup on a systemd host:
//! - `smartctl -a -d sat <device>` for attribute snapshots
//! - `lsblk -dn -o NAME` for device enumeration
//! - `journalctl -u smartd` for the failure log (backlog and follow)
//! - `which` / `systemctl is-active` for environment checks
//! - `pkexec` for privileged actions

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MonitorError, Result};
use crate::runner::CommandSpec;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub smartctl: SmartctlConfig,
    pub devices: DevicesConfig,
    pub journal: JournalConfig,
    pub environment: EnvironmentConfig,
    pub actions: ActionsConfig,
    pub schedule: ScheduleConfig,
}

/// Per-device diagnostic read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmartctlConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Prepended to every line of the listing (`sda` -> `/dev/sda`)
    pub prefix: String,
    pub timeout_secs: u64,
    pub list_command: CommandSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub program: String,
    pub unit: String,
    pub backlog_lines: u32,
    pub backlog_timeout_secs: u64,
    /// Restart attempts for an ended follow, one per scheduler tick
    pub max_follow_restarts: u32,
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Tool whose presence on PATH is checked
    pub tool: String,
    pub which_program: String,
    /// Service whose activity is checked
    pub service: String,
    pub systemctl_program: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    pub elevate_with: String,
    pub start_service: CommandSpec,
    pub stop_service: CommandSpec,
    pub install_package: CommandSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

/// Opaque privileged actions, invoked by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegedAction {
    StartService,
    StopService,
    InstallPackage,
}

impl Default for SmartctlConfig {
    fn default() -> Self {
        Self {
            program: "smartctl".to_string(),
            args: vec!["-a".to_string(), "-d".to_string(), "sat".to_string()],
            timeout_secs: 10,
        }
    }
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            prefix: "/dev/".to_string(),
            timeout_secs: 10,
            list_command: CommandSpec::new("lsblk", ["-dn", "-o", "NAME"]),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            program: "journalctl".to_string(),
            unit: "smartd".to_string(),
            backlog_lines: 100,
            backlog_timeout_secs: 30,
            max_follow_restarts: 5,
            shutdown_grace_secs: 3,
        }
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            tool: "smartctl".to_string(),
            which_program: "which".to_string(),
            service: "smartd".to_string(),
            systemctl_program: "systemctl".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            elevate_with: "pkexec".to_string(),
            start_service: CommandSpec::new("systemctl", ["start", "smartd"]),
            stop_service: CommandSpec::new("systemctl", ["stop", "smartd"]),
            install_package: CommandSpec::new("apt", ["install", "-y", "smartmontools"]),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_secs: 5 * 60 }
    }
}

impl MonitorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values that would stall or spin the monitor
    pub fn validate(&self) -> Result<()> {
        let programs = [
            ("smartctl.program", &self.smartctl.program),
            ("devices.list_command.program", &self.devices.list_command.program),
            ("journal.program", &self.journal.program),
            ("journal.unit", &self.journal.unit),
            ("environment.which_program", &self.environment.which_program),
            ("environment.systemctl_program", &self.environment.systemctl_program),
        ];
        for (name, value) in programs {
            if value.trim().is_empty() {
                return Err(MonitorError::InvalidConfig(format!("{} must not be empty", name)));
            }
        }

        if self.schedule.interval_secs == 0 {
            return Err(MonitorError::InvalidConfig(
                "schedule.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.journal.backlog_lines == 0 {
            return Err(MonitorError::InvalidConfig(
                "journal.backlog_lines must be greater than zero".to_string(),
            ));
        }
        if self.smartctl.timeout_secs == 0 {
            return Err(MonitorError::InvalidConfig(
                "smartctl.timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn smartctl_command(&self, device: &str) -> CommandSpec {
        CommandSpec::new(&self.smartctl.program, &self.smartctl.args).with_arg(device)
    }

    pub fn backlog_command(&self) -> CommandSpec {
        CommandSpec::new(
            &self.journal.program,
            ["-u".to_string(), self.journal.unit.clone(), "-n".to_string(), self.journal.backlog_lines.to_string()],
        )
    }

    pub fn follow_command(&self) -> CommandSpec {
        CommandSpec::new(&self.journal.program, ["-u", self.journal.unit.as_str(), "-f"])
    }

    pub fn tool_check_command(&self) -> CommandSpec {
        CommandSpec::new(&self.environment.which_program, [self.environment.tool.as_str()])
    }

    pub fn service_check_command(&self) -> CommandSpec {
        CommandSpec::new(
            &self.environment.systemctl_program,
            ["is-active", self.environment.service.as_str()],
        )
    }

    /// Elevated command line for a privileged action
    pub fn action_command(&self, action: PrivilegedAction) -> CommandSpec {
        let base = match action {
            PrivilegedAction::StartService => &self.actions.start_service,
            PrivilegedAction::StopService => &self.actions.stop_service,
            PrivilegedAction::InstallPackage => &self.actions.install_package,
        };
        if self.actions.elevate_with.is_empty() {
            base.clone()
        } else {
            base.elevated(&self.actions.elevate_with)
        }
    }

    pub fn smartctl_timeout(&self) -> Duration {
        Duration::from_secs(self.smartctl.timeout_secs)
    }

    pub fn devices_timeout(&self) -> Duration {
        Duration::from_secs(self.devices.timeout_secs)
    }

    pub fn backlog_timeout(&self) -> Duration {
        Duration::from_secs(self.journal.backlog_timeout_secs)
    }

    pub fn environment_timeout(&self) -> Duration {
        Duration::from_secs(self.environment.timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.journal.backlog_lines, 100);
        assert_eq!(config.schedule.interval_secs, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_command_lines() {
        let config = MonitorConfig::default();
        assert_eq!(config.smartctl_command("/dev/sda").to_string(), "smartctl -a -d sat /dev/sda");
        assert_eq!(config.backlog_command().to_string(), "journalctl -u smartd -n 100");
        assert_eq!(config.follow_command().to_string(), "journalctl -u smartd -f");
        assert_eq!(config.tool_check_command().to_string(), "which smartctl");
        assert_eq!(config.service_check_command().to_string(), "systemctl is-active smartd");
        assert_eq!(
            config.action_command(PrivilegedAction::InstallPackage).to_string(),
            "pkexec apt install -y smartmontools"
        );
        assert_eq!(
            config.action_command(PrivilegedAction::StopService).to_string(),
            "pkexec systemctl stop smartd"
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MonitorConfig::from_toml_str(
            r#"
            [journal]
            unit = "smartmontools"
            backlog_lines = 250

            [schedule]
            interval_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.journal.unit, "smartmontools");
        assert_eq!(config.journal.backlog_lines, 250);
        assert_eq!(config.journal.program, "journalctl");
        assert_eq!(config.schedule.interval_secs, 60);
        assert_eq!(config.smartctl, SmartctlConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = MonitorConfig::from_toml_str("[schedule]\ninterval_secs = 0\n").unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfig(_)));

        let err = MonitorConfig::from_toml_str("[journal]\nbacklog_lines = 0\n").unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfig(_)));

        let err = MonitorConfig::from_toml_str("[smartctl]\nprogram = \" \"\n").unwrap_err();
        assert!(matches!(err, MonitorError::InvalidConfig(_)));
    }

    #[test]
    fn test_toml_roundtrip_preserves_config() {
        let mut config = MonitorConfig::default();
        config.actions.elevate_with = String::new();
        let text = config.to_toml_string().unwrap();
        let parsed = MonitorConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(
            parsed.action_command(PrivilegedAction::StartService).to_string(),
            "systemctl start smartd"
        );
    }
}
