//! Status aggregation
//!
//! The `StatusAggregator` owns the authoritative problem set and everything
//! derived from it. Two transitions change the problem set:
//! - full check: the set is replaced by the extraction of a fresh backlog
//! - tail chunk: newly extracted devices are added, nothing is removed
//!
//! Environment flags and log-source health are tracked next to the problem
//! set but never feed into the headline, so a missing tool, an inactive
//! service and a failing drive can all be reported at once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::MonitorConfig;
use crate::journal::{extract_failures, headline_for};

/// Coarse health level for alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallLevel {
    Ok,
    Failing,
    /// No failure known, but the log has not been read successfully
    Unknown,
}

/// State of the continuous journal follow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FollowState {
    NotStarted,
    Following,
    Ended { reason: String },
}

/// Readability of both journal read modes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogHealth {
    pub backlog_error: Option<String>,
    pub follow: FollowState,
    pub follow_restarts: u32,
}

impl Default for LogHealth {
    fn default() -> Self {
        Self {
            backlog_error: None,
            follow: FollowState::NotStarted,
            follow_restarts: 0,
        }
    }
}

impl LogHealth {
    /// Why the log cannot be trusted right now, if it cannot
    pub fn unreadable_reason(&self) -> Option<&str> {
        if let Some(reason) = &self.backlog_error {
            return Some(reason.as_str());
        }
        match &self.follow {
            FollowState::Ended { reason } => Some(reason.as_str()),
            _ => None,
        }
    }

    pub fn is_readable(&self) -> bool {
        self.unreadable_reason().is_none()
    }
}

/// Results of the last environment re-check; `None` until checked
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnvironmentStatus {
    pub tool_installed: Option<bool>,
    pub service_running: Option<bool>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl EnvironmentStatus {
    pub fn can_install(&self) -> bool {
        self.tool_installed == Some(false)
    }

    pub fn can_start_service(&self) -> bool {
        self.service_running == Some(false)
    }

    pub fn can_stop_service(&self) -> bool {
        self.service_running == Some(true)
    }
}

/// Headline plus the problem set it was derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub headline: String,
    pub problems: Vec<String>,
}

/// Owned, fully applied view of the aggregator for readers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub headline: String,
    pub problems: Vec<String>,
    pub overall: OverallLevel,
    pub environment: EnvironmentStatus,
    pub warnings: Vec<String>,
    pub log: LogHealth,
    pub last_full_check: Option<DateTime<Utc>>,
    pub last_tail_event: Option<DateTime<Utc>>,
    /// Incremented on every applied transition
    pub generation: u64,
}

impl HealthSnapshot {
    /// Warnings followed by the headline, one per line (tooltip text)
    pub fn summary(&self) -> String {
        let mut lines = self.warnings.clone();
        lines.push(self.headline.clone());
        lines.join("\n")
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            headline: self.headline.clone(),
            problems: self.problems.clone(),
        }
    }
}

/// What a transition changed in the problem set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl TransitionOutcome {
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Single owner of the problem set and its derived status
#[derive(Debug, Clone)]
pub struct StatusAggregator {
    problems: BTreeSet<String>,
    headline: String,
    tool: String,
    service: String,
    unit: String,
    environment: EnvironmentStatus,
    log: LogHealth,
    last_full_check: Option<DateTime<Utc>>,
    last_tail_event: Option<DateTime<Utc>>,
    generation: u64,
}

impl Default for StatusAggregator {
    fn default() -> Self {
        Self::new("smartctl", "smartd", "smartd")
    }
}

impl StatusAggregator {
    /// `tool` and `service` name the environment warnings, `unit` the journal
    pub fn new<T, S, U>(tool: T, service: S, unit: U) -> Self
    where
        T: Into<String>,
        S: Into<String>,
        U: Into<String>,
    {
        let problems = BTreeSet::new();
        let headline = headline_for(&problems);
        Self {
            problems,
            headline,
            tool: tool.into(),
            service: service.into(),
            unit: unit.into(),
            environment: EnvironmentStatus::default(),
            log: LogHealth::default(),
            last_full_check: None,
            last_tail_event: None,
            generation: 0,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.environment.tool.clone(),
            config.environment.service.clone(),
            config.journal.unit.clone(),
        )
    }

    /// Full resync: the problem set becomes exactly what the backlog reports
    pub fn apply_full_check(&mut self, backlog: &str) -> TransitionOutcome {
        let extraction = extract_failures(backlog);

        let removed = self.problems.difference(&extraction.devices).cloned().collect();
        let added = extraction.devices.difference(&self.problems).cloned().collect();

        self.problems = extraction.devices;
        self.headline = extraction.headline;
        self.log.backlog_error = None;
        self.last_full_check = Some(Utc::now());
        self.generation += 1;
        debug!("Full check: {} failing, generation {}", self.problems.len(), self.generation);

        TransitionOutcome { added, removed }
    }

    /// Incremental tail event: union only
    pub fn apply_tail_chunk(&mut self, chunk: &str) -> TransitionOutcome {
        let extraction = extract_failures(chunk);

        let mut added = Vec::new();
        for device in extraction.devices {
            if self.problems.insert(device.clone()) {
                added.push(device);
            }
        }

        self.headline = headline_for(&self.problems);
        self.last_tail_event = Some(Utc::now());
        self.generation += 1;
        if !added.is_empty() {
            debug!("Tail chunk added {:?}", added);
        }

        TransitionOutcome {
            added,
            removed: Vec::new(),
        }
    }

    /// The backlog could not be fetched; the problem set is left untouched
    pub fn record_backlog_error<S: Into<String>>(&mut self, reason: S) {
        self.log.backlog_error = Some(reason.into());
        self.generation += 1;
    }

    pub fn mark_follow_started(&mut self) {
        self.log.follow = FollowState::Following;
        self.generation += 1;
    }

    pub fn mark_follow_ended<S: Into<String>>(&mut self, reason: S) {
        self.log.follow = FollowState::Ended { reason: reason.into() };
        self.generation += 1;
    }

    pub fn record_follow_restart(&mut self) {
        self.log.follow_restarts += 1;
        self.generation += 1;
    }

    pub fn update_environment(&mut self, tool_installed: bool, service_running: bool) {
        self.environment = EnvironmentStatus {
            tool_installed: Some(tool_installed),
            service_running: Some(service_running),
            checked_at: Some(Utc::now()),
        };
        self.generation += 1;
    }

    pub fn headline(&self) -> &str {
        &self.headline
    }

    pub fn problems(&self) -> &BTreeSet<String> {
        &self.problems
    }

    pub fn environment(&self) -> &EnvironmentStatus {
        &self.environment
    }

    pub fn log_health(&self) -> &LogHealth {
        &self.log
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            headline: self.headline.clone(),
            problems: self.problems.iter().cloned().collect(),
        }
    }

    pub fn overall(&self) -> OverallLevel {
        if !self.problems.is_empty() {
            OverallLevel::Failing
        } else if !self.log.is_readable() || self.last_full_check.is_none() {
            OverallLevel::Unknown
        } else {
            OverallLevel::Ok
        }
    }

    /// Standing warnings, independent of the headline
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.environment.tool_installed == Some(false) {
            warnings.push(format!("⚠️ {} is not installed", self.tool));
        }
        if self.environment.service_running == Some(false) {
            warnings.push(format!("⚠️ {} service is not running", self.service));
        }
        if let Some(reason) = self.log.unreadable_reason() {
            warnings.push(format!("❔ {} journal unreadable: {}", self.unit, reason));
        }
        warnings
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            headline: self.headline.clone(),
            problems: self.problems.iter().cloned().collect(),
            overall: self.overall(),
            environment: self.environment.clone(),
            warnings: self.warnings(),
            log: self.log.clone(),
            last_full_check: self.last_full_check,
            last_tail_event: self.last_tail_event,
            generation: self.generation,
        }
    }
}
