/*!
Realistic smartctl reports and smartd journal lines

- `SATA_HDD_REPORT`, `SATA_SSD_REPORT`, `NVME_REPORT` : `smartctl -a` outputs
- `JournalLines` : builder for `journalctl -u smartd` style text
*/

use chrono::{DateTime, TimeZone, Utc};

/// `smartctl -a -d sat` on a healthy SATA hard disk
pub const SATA_HDD_REPORT: &str = "\
smartctl 7.3 2022-02-28 r5338 [x86_64-linux-6.1.0-13-amd64] (local build)
Copyright (C) 2002-22, Bruce Allen, Christian Franke, www.smartmontools.org

=== START OF INFORMATION SECTION ===
Model Family:     Seagate IronWolf
Device Model:     ST4000VN008-2DR166
Serial Number:    ZGY5ABCD
LU WWN Device Id: 5 000c50 0c1234567
Firmware Version: SC60
User Capacity:    4,000,787,030,016 bytes [4.00 TB]
Sector Sizes:     512 bytes logical, 4096 bytes physical
Rotation Rate:    5980 rpm
SMART support is: Available - device has SMART capability.
SMART support is: Enabled

=== START OF READ SMART DATA SECTION ===
SMART overall-health self-assessment test result: PASSED

SMART Attributes Data Structure revision number: 10
Vendor Specific SMART Attributes with Thresholds:
ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE
  1 Raw_Read_Error_Rate     0x000f   083   064   044    Pre-fail  Always       -       204012345
  5 Reallocated_Sector_Ct   0x0033   100   100   010    Pre-fail  Always       -       0
  9 Power_On_Hours          0x0032   071   071   000    Old_age   Always       -       25871
194 Temperature_Celsius     0x0022   034   052   000    Old_age   Always       -       34 (0 16 0 0 0)
";

/// `smartctl -a -d sat` on a SATA SSD reporting a failing self-assessment
pub const SATA_SSD_REPORT: &str = "\
=== START OF INFORMATION SECTION ===
Device Model:     Samsung SSD 860 EVO 500GB
Serial Number:    S3Z1NB0K123456X
Firmware Version: RVT04B6Q

=== START OF READ SMART DATA SECTION ===
SMART overall-health self-assessment test result: FAILED!
Drive failure expected in less than 24 hours. SAVE ALL DATA.

ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE
  5 Reallocated_Sector_Ct   0x0033   001   001   010    Pre-fail  Always   FAILING_NOW 4013
190 Airflow_Temperature_Cel 0x0032   061   050   000    Old_age   Always       -       39
";

/// `smartctl -a` on an NVMe drive: no ATA attribute table, no Temperature_Celsius row
pub const NVME_REPORT: &str = "\
=== START OF INFORMATION SECTION ===
Model Number:                       Samsung SSD 970 EVO Plus 1TB
Serial Number:                      S4EWNX0R123456
Firmware Version:                   2B2QEXM7

=== START OF SMART DATA SECTION ===
SMART overall-health self-assessment test result: PASSED

SMART/Health Information (NVMe Log 0x02)
Critical Warning:                   0x00
Temperature:                        41 Celsius
Available Spare:                    100%
";

/// Builder for smartd journal text, one syslog-style line per call
pub struct JournalLines {
    host: String,
    pid: u32,
    at: DateTime<Utc>,
    lines: Vec<String>,
}

impl JournalLines {
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host: host.into(),
            pid: 812,
            at: Utc.with_ymd_and_hms(2025, 10, 17, 8, 0, 0).unwrap(),
            lines: Vec::new(),
        }
    }

    /// smartd failure report for `device`
    pub fn failed(self, device: &str) -> Self {
        self.raw_message(&format!(
            "Device: {} [SAT], FAILED SMART self-check. BACK UP DATA NOW!",
            device
        ))
    }

    /// Non-failure smartd chatter about `device`
    pub fn attribute_change(self, device: &str) -> Self {
        self.raw_message(&format!(
            "Device: {} [SAT], SMART Usage Attribute: 194 Temperature_Celsius changed from 66 to 65",
            device
        ))
    }

    pub fn raw_message(mut self, message: &str) -> Self {
        let stamp = self.at.format("%b %d %H:%M:%S");
        self.lines.push(format!("{} {} smartd[{}]: {}", stamp, self.host, self.pid, message));
        self.at += chrono::Duration::seconds(1);
        self
    }

    pub fn build(self) -> String {
        let mut text = self.lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }
}
