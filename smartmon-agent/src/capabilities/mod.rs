//! Environment capability detection
//!
//! Detects whether the host can be monitored at all:
//! - Diagnostic tool installed (`which smartctl`)
//! - Monitoring service active (`systemctl is-active smartd`)
//!
//! A probe that cannot run counts as "no": a missing `which` means the tool
//! cannot be located either, a missing `systemctl` means no active service.

use serde::Serialize;
use smartmon_core::{CommandRunner, MonitorConfig};
use tracing::{debug, warn};

/// Result of one environment check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnvironmentReport {
    pub tool_installed: bool,
    pub service_running: bool,
}

/// Environment probe over the configured queries
pub struct CapabilityDetector;

impl CapabilityDetector {
    /// Run both environment queries concurrently
    pub async fn detect_all(runner: &dyn CommandRunner, config: &MonitorConfig) -> EnvironmentReport {
        debug!("Detecting environment capabilities...");

        let (tool_installed, service_running) =
            tokio::join!(Self::tool_installed(runner, config), Self::service_running(runner, config));

        let report = EnvironmentReport {
            tool_installed,
            service_running,
        };
        debug!("Environment: {:?}", report);
        report
    }

    /// Check if the diagnostic tool exists in PATH
    pub async fn tool_installed(runner: &dyn CommandRunner, config: &MonitorConfig) -> bool {
        let spec = config.tool_check_command();
        match runner.run(&spec, Some(config.environment_timeout())).await {
            Ok(output) => output.success(),
            Err(e) => {
                warn!("Tool check `{}` failed: {}", spec, e);
                false
            }
        }
    }

    pub async fn service_running(runner: &dyn CommandRunner, config: &MonitorConfig) -> bool {
        let spec = config.service_check_command();
        match runner.run(&spec, Some(config.environment_timeout())).await {
            Ok(output) => output.stdout.trim() == "active",
            Err(e) => {
                warn!("Service check `{}` failed: {}", spec, e);
                false
            }
        }
    }
}
