//! Storage device polling for the smartmon agent
//!
//! On-demand attribute snapshots of every local block device:
//! - Enumeration through the configured listing (`lsblk -dn -o NAME`)
//! - One concurrent smartctl read per device, each with its own timeout
//! - Table rendering with the Device/Model/Serial/Firmware/Health/Temp/Error columns

use anyhow::{anyhow, Context, Result};
use futures::future::join_all;
use smartmon_core::{parse_device_list, parse_smartctl, CommandRunner, DeviceRecord, MonitorConfig};
use tracing::{debug, info, warn};

pub const TABLE_HEADERS: [&str; 7] = ["Device", "Model", "Serial", "Firmware", "Health", "Temp", "Error"];

/// Device poller over a command runner
pub struct DiskPoller<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a MonitorConfig,
}

impl<'a> DiskPoller<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a MonitorConfig) -> Self {
        Self { runner, config }
    }

    /// Device identifiers from the external listing
    pub async fn enumerate(&self) -> Result<Vec<String>> {
        let spec = &self.config.devices.list_command;
        let output = self
            .runner
            .run(spec, Some(self.config.devices_timeout()))
            .await
            .with_context(|| format!("Failed to list devices with `{}`", spec))?;

        if !output.success() {
            return Err(anyhow!(
                "`{}` exited with {:?}: {}",
                spec,
                output.exit_code,
                output.stderr.trim()
            ));
        }

        let devices = parse_device_list(&output.stdout, &self.config.devices.prefix);
        debug!("Enumerated {} devices", devices.len());
        Ok(devices)
    }

    /// Read one device; any failure degrades into an unreadable record
    pub async fn poll_device(&self, device: &str) -> DeviceRecord {
        let spec = self.config.smartctl_command(device);
        match self.runner.run(&spec, Some(self.config.smartctl_timeout())).await {
            Ok(output) => {
                if !output.success() {
                    warn!("{} exited with {:?} for {}", self.config.smartctl.program, output.exit_code, device);
                }
                parse_smartctl(device, &output)
            }
            Err(e) => {
                warn!("Diagnostic read of {} failed: {}", device, e);
                DeviceRecord::unreadable(device)
            }
        }
    }

    /// Read every device concurrently, keeping the listing order
    pub async fn poll_devices(&self, devices: &[String]) -> Vec<DeviceRecord> {
        join_all(devices.iter().map(|device| self.poll_device(device))).await
    }

    /// Enumerate then read every device
    pub async fn poll_all(&self) -> Result<Vec<DeviceRecord>> {
        let devices = self.enumerate().await?;
        let records = self.poll_devices(&devices).await;
        let unreadable = records.iter().filter(|r| !r.is_readable()).count();
        info!("Polled {} devices ({} unreadable)", records.len(), unreadable);
        Ok(records)
    }
}

/// Table cells for one record, empty where a field is absent
pub fn table_row(record: &DeviceRecord) -> [String; 7] {
    let text = |value: &Option<String>| value.clone().unwrap_or_default();
    [
        record.device.clone(),
        text(&record.model),
        text(&record.serial),
        text(&record.firmware),
        text(&record.health),
        record.temperature_label().unwrap_or_default(),
        text(&record.error),
    ]
}

/// Render records as an aligned plain-text table
pub fn render_table(records: &[DeviceRecord]) -> String {
    let rows: Vec<[String; 7]> = records.iter().map(table_row).collect();

    let mut widths = TABLE_HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_line = |cells: Vec<&str>| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!("{}{}", cell, " ".repeat(width - cell.chars().count())))
            .collect();
        padded.join("  ").trim_end().to_string()
    };

    let mut lines = vec![format_line(TABLE_HEADERS.to_vec())];
    for row in &rows {
        lines.push(format_line(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}
