//! smartctl attribute parsing
//!
//! Turns the text report of `smartctl -a` for one device into a
//! `DeviceRecord`. The parser is label driven and partial-tolerant:
//! - unknown lines are skipped
//! - a missing label leaves its field `None` (unsupported attribute)
//! - a malformed temperature row only loses the temperature
//! - a failed command yields a record carrying only an error reason

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::runner::CommandOutput;

/// Error reason attached to devices whose diagnostic read failed
pub const UNREADABLE_REASON: &str = "health data unreadable";

const MODEL_LABELS: &[&str] = &["Model Family:", "Device Model:", "Model Number:"];
const SERIAL_LABEL: &str = "Serial Number:";
const FIRMWARE_LABEL: &str = "Firmware Version:";
const HEALTH_LABEL: &str = "SMART overall-health self-assessment test result";
const TEMPERATURE_ATTRIBUTE: &str = "Temperature_Celsius";

/// Index of RAW_VALUE in an ATA attribute table row
const RAW_VALUE_COLUMN: usize = 9;

/// One device's attribute snapshot, immutable once built
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_celsius: Option<i32>,
    /// Raw value column of the temperature row, verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceRecord {
    /// Record for a device whose diagnostic data could not be read
    pub fn unreadable<S: Into<String>>(device: S) -> Self {
        Self {
            device: device.into(),
            error: Some(UNREADABLE_REASON.to_string()),
            ..Default::default()
        }
    }

    pub fn is_readable(&self) -> bool {
        self.error.is_none()
    }

    /// Temperature as displayed in the device table
    pub fn temperature_label(&self) -> Option<String> {
        match (&self.temperature_raw, self.temperature_celsius) {
            (Some(raw), _) => Some(format!("{} °C", raw)),
            (None, Some(t)) => Some(format!("{} °C", t)),
            (None, None) => None,
        }
    }
}

/// Build a record from a finished smartctl invocation
pub fn parse_smartctl(device: &str, output: &CommandOutput) -> DeviceRecord {
    if !output.success() {
        debug!("smartctl on {} exited with {:?}", device, output.exit_code);
        return DeviceRecord::unreadable(device);
    }
    parse_attributes(device, &output.stdout)
}

/// Scan a smartctl report for the labelled fields
pub fn parse_attributes(device: &str, text: &str) -> DeviceRecord {
    let mut record = DeviceRecord {
        device: device.to_string(),
        ..Default::default()
    };

    for line in text.lines() {
        if MODEL_LABELS.iter().any(|label| line.contains(label)) {
            set_once(&mut record.model, label_value(line));
        } else if line.contains(SERIAL_LABEL) {
            set_once(&mut record.serial, label_value(line));
        } else if line.contains(FIRMWARE_LABEL) {
            set_once(&mut record.firmware, label_value(line));
        } else if line.contains(HEALTH_LABEL) {
            set_once(&mut record.health, label_value(line));
        } else if line.contains(TEMPERATURE_ATTRIBUTE) && record.temperature_raw.is_none() {
            record.temperature_raw = temperature_token(line);
            record.temperature_celsius = record.temperature_raw.as_deref().and_then(|raw| raw.parse().ok());
        }
    }

    record
}

/// Device identifiers from a listing with one bare name per line
pub fn parse_device_list(text: &str, prefix: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| format!("{}{}", prefix, name))
        .collect()
}

fn set_once(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Text after the first `:`, trimmed; `None` when there is nothing there
fn label_value(line: &str) -> Option<String> {
    let (_, value) = line.split_once(':')?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn temperature_token(line: &str) -> Option<String> {
    line.split_whitespace().nth(RAW_VALUE_COLUMN).map(str::to_string)
}
