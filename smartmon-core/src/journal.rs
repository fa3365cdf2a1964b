//! Failure extraction from smartd journal text.
//!
//! smartd reports a failing drive with lines such as
//! `Device: /dev/sda [SAT], FAILED SMART self-check. BACK UP DATA NOW!`.
//! Any line naming a device and later containing `FAILED` counts; everything
//! else in the text is ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Headline when no device reports a failure
pub const ALL_CLEAR_HEADLINE: &str = "✅ All drives OK";

/// Prefix of the headline listing failing devices
pub const FAILURE_HEADLINE_PREFIX: &str = "⚠️ Failures on ";

static FAILURE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Device: (\S+).*FAILED").expect("failure pattern is valid"));

/// Devices found in one block of journal text, with the matching headline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub devices: BTreeSet<String>,
    pub headline: String,
}

impl Extraction {
    pub fn is_clear(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Extract failing devices and the headline describing them
pub fn extract_failures(text: &str) -> Extraction {
    let devices = failed_devices(text);
    let headline = headline_for(&devices);
    Extraction { devices, headline }
}

/// Sorted, deduplicated identifiers from failure lines
pub fn failed_devices(text: &str) -> BTreeSet<String> {
    text.lines()
        .filter_map(|line| FAILURE_LINE.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Headline for a problem set: all-clear iff empty
pub fn headline_for(devices: &BTreeSet<String>) -> String {
    if devices.is_empty() {
        ALL_CLEAR_HEADLINE.to_string()
    } else {
        let names: Vec<&str> = devices.iter().map(String::as_str).collect();
        format!("{}{}", FAILURE_HEADLINE_PREFIX, names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_failures_is_all_clear() {
        let text = "\
Oct 17 10:00:01 host smartd[812]: Device: /dev/sda [SAT], opened
Oct 17 10:00:01 host smartd[812]: Device: /dev/sda [SAT], SMART Usage Attribute: 194 Temperature_Celsius changed from 114 to 113
Oct 17 10:00:02 host smartd[812]: Monitoring 2 ATA/SATA, 0 SCSI/SAS and 0 NVMe devices
";
        let extraction = extract_failures(text);
        assert!(extraction.is_clear());
        assert_eq!(extraction.headline, ALL_CLEAR_HEADLINE);
    }

    #[test]
    fn test_empty_text() {
        let extraction = extract_failures("");
        assert!(extraction.devices.is_empty());
        assert_eq!(extraction.headline, ALL_CLEAR_HEADLINE);
    }

    #[test]
    fn test_duplicates_and_order() {
        let text = "\
smartd[1]: Device: /dev/sdb [SAT], FAILED SMART self-check. BACK UP DATA NOW!
smartd[1]: Device: /dev/sda [SAT], FAILED SMART self-check. BACK UP DATA NOW!
smartd[1]: Device: /dev/sdb [SAT], FAILED SMART self-check. BACK UP DATA NOW!
";
        let extraction = extract_failures(text);
        let devices: Vec<&str> = extraction.devices.iter().map(String::as_str).collect();
        assert_eq!(devices, vec!["/dev/sda", "/dev/sdb"]);
        assert_eq!(extraction.headline, "⚠️ Failures on /dev/sda, /dev/sdb");
    }

    #[test]
    fn test_failed_must_follow_device() {
        let text = "FAILED before Device: /dev/sdc [SAT], still fine\nDevice: without failure\n";
        assert!(failed_devices(text).is_empty());
    }

    #[test]
    fn test_exactly_one_space_after_label() {
        let text = "Device:\t/dev/sda FAILED\nDevice:  /dev/sdb FAILED\nDevice: /dev/sdc FAILED\n";
        let devices = failed_devices(text);
        assert_eq!(devices.into_iter().collect::<Vec<_>>(), vec!["/dev/sdc"]);
    }

    #[test]
    fn test_identifier_is_first_token() {
        let text = "Device: /dev/nvme0, FAILED to read NVMe SMART/Health Information\n";
        let devices = failed_devices(text);
        assert!(devices.contains("/dev/nvme0,"));
        assert_eq!(devices.len(), 1);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let text = "Device: /dev/sdd FAILED\nDevice: /dev/sdc FAILED\n";
        assert_eq!(extract_failures(text), extract_failures(text));
    }
}
