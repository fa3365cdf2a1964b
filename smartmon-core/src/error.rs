//! Error type shared by the smartmon crates.
//!
//! Per-device and per-line problems never surface here: they degrade into
//! record fields or are skipped. `MonitorError` covers the failures a caller
//! has to decide about (a command that could not run, a broken config).

use std::time::Duration;

/// Errors raised by command execution and configuration handling
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MonitorError {
    /// True when the program itself is missing (ENOENT on spawn)
    pub fn is_not_found(&self) -> bool {
        matches!(self, MonitorError::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = MonitorError::Spawn {
            program: "smartctl".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("smartctl"));

        let timeout = MonitorError::Timeout {
            program: "smartctl".to_string(),
            timeout: Duration::from_secs(3),
        };
        assert!(!timeout.is_not_found());
    }
}
