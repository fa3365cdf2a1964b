//! Monitor loop: the single writer of the health status
//!
//! Tail chunks, tail closure and scheduler ticks arrive as `MonitorEvent`s
//! on one bounded channel and are applied in order. Each transition takes
//! the status lock once, then a fresh snapshot is published on a `watch`
//! channel for the CLI and any notifier. `log_summary_changes` is the
//! subscriber the agent runs by default.

use anyhow::Result;
use smartmon_core::{
    read_snapshot, new_state, CommandRunner, FollowState, HealthSnapshot, MonitorConfig, SharedStatus,
    StatusAggregator, TransitionOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::capabilities::CapabilityDetector;
use crate::journal::{LogTailSource, TailEvent};
use crate::scheduler::{spawn_scheduler, Tick};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Everything the monitor loop reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    Tail(TailEvent),
    Tick(Tick),
}

impl From<TailEvent> for MonitorEvent {
    fn from(event: TailEvent) -> Self {
        MonitorEvent::Tail(event)
    }
}

impl From<Tick> for MonitorEvent {
    fn from(tick: Tick) -> Self {
        MonitorEvent::Tick(tick)
    }
}

pub struct Monitor {
    runner: Arc<dyn CommandRunner>,
    config: Arc<MonitorConfig>,
    status: SharedStatus,
    tail: LogTailSource,
    snapshots: watch::Sender<HealthSnapshot>,
    events_tx: mpsc::Sender<MonitorEvent>,
    events_rx: mpsc::Receiver<MonitorEvent>,
    shutdown: watch::Receiver<bool>,
    follow: Option<JoinHandle<()>>,
    last_headline: String,
    restart_limit_logged: bool,
}

impl Monitor {
    pub fn new(runner: Arc<dyn CommandRunner>, config: Arc<MonitorConfig>, shutdown: watch::Receiver<bool>) -> Self {
        let status = new_state(StatusAggregator::from_config(&config));
        let initial = read_snapshot(&status);
        let last_headline = initial.headline.clone();
        let (snapshots, _) = watch::channel(initial);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let tail = LogTailSource::new(runner.clone(), config.clone());

        Self {
            runner,
            config,
            status,
            tail,
            snapshots,
            events_tx,
            events_rx,
            shutdown,
            follow: None,
            last_headline,
            restart_limit_logged: false,
        }
    }

    /// Receiver of every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<HealthSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        read_snapshot(&self.status)
    }

    /// Re-check tool presence and service activity
    pub async fn check_environment(&mut self) {
        let report = CapabilityDetector::detect_all(self.runner.as_ref(), &self.config).await;
        self.status
            .lock()
            .update_environment(report.tool_installed, report.service_running);
        if !report.tool_installed {
            warn!("{} is not installed", self.config.environment.tool);
        }
        if !report.service_running {
            warn!("{} service is not running", self.config.environment.service);
        }
        self.publish();
    }

    /// Fetch the backlog and resync the problem set from it
    pub async fn full_check(&mut self) {
        match self.tail.fetch_backlog().await {
            Ok(backlog) => {
                let outcome = self.status.lock().apply_full_check(&backlog);
                log_outcome("full check", &outcome);
            }
            Err(e) => {
                warn!("Journal backlog unreadable: {}", e);
                self.status.lock().record_backlog_error(e.to_string());
            }
        }
        self.publish();
    }

    /// Apply one event
    pub async fn handle_event(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::Tail(TailEvent::Chunk(text)) => {
                let outcome = self.status.lock().apply_tail_chunk(&text);
                log_outcome("journal", &outcome);
                self.publish();
            }
            MonitorEvent::Tail(TailEvent::Closed { reason }) => {
                self.status.lock().mark_follow_ended(reason);
                self.publish();
            }
            MonitorEvent::Tick(tick) => {
                debug!("Periodic check #{}", tick.sequence);
                self.check_environment().await;
                self.full_check().await;
                self.restart_follow_if_ended();
            }
        }
    }

    /// Start the journal follow task
    pub fn start_follow(&mut self) {
        self.status.lock().mark_follow_started();
        self.publish();
        self.follow = Some(self.tail.spawn_follow(self.events_tx.clone(), self.shutdown.clone()));
    }

    fn restart_follow_if_ended(&mut self) {
        let log = self.status.lock().log_health().clone();
        if !matches!(log.follow, FollowState::Ended { .. }) {
            return;
        }

        if log.follow_restarts >= self.config.journal.max_follow_restarts {
            if !self.restart_limit_logged {
                error!(
                    "Journal follow ended {} times, giving up until the agent is restarted",
                    log.follow_restarts + 1
                );
                self.restart_limit_logged = true;
            }
            return;
        }

        info!(
            "Restarting journal follow (attempt {}/{})",
            log.follow_restarts + 1,
            self.config.journal.max_follow_restarts
        );
        self.status.lock().record_follow_restart();
        self.start_follow();
    }

    /// Initial checks, then apply events until shutdown
    pub async fn run(mut self) -> Result<()> {
        info!("Monitoring {} journal", self.config.journal.unit);

        self.check_environment().await;
        self.full_check().await;
        self.start_follow();

        let scheduler = spawn_scheduler(
            self.config.check_interval(),
            self.events_tx.clone(),
            self.shutdown.clone(),
        );

        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Shutting down monitor");
        drop(self.events_rx);
        let grace = Duration::from_secs(self.config.journal.shutdown_grace_secs + 1);
        if let Some(follow) = self.follow.take() {
            if tokio::time::timeout(grace, follow).await.is_err() {
                warn!("Journal follow did not stop within {:?}", grace);
            }
        }
        if let Err(e) = scheduler.await {
            warn!("Scheduler task failed: {}", e);
        }
        Ok(())
    }

    fn publish(&mut self) {
        let snapshot = read_snapshot(&self.status);
        if snapshot.headline != self.last_headline {
            if snapshot.problems.is_empty() {
                info!("Status: {}", snapshot.headline);
            } else {
                warn!("Status: {}", snapshot.headline);
            }
            self.last_headline = snapshot.headline.clone();
        }
        self.snapshots.send_replace(snapshot);
    }
}

/// Log the status summary each time it changes, until shutdown or until the
/// monitor stops publishing. Returns how many changes were logged.
pub async fn log_summary_changes(
    mut snapshots: watch::Receiver<HealthSnapshot>,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    let mut last = snapshots.borrow_and_update().summary();
    let mut logged = 0;

    if *shutdown.borrow() {
        return logged;
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let summary = snapshots.borrow_and_update().summary();
                if summary != last {
                    info!("Summary: {}", summary.replace('\n', " | "));
                    last = summary;
                    logged += 1;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    logged
}

fn log_outcome(source: &str, outcome: &TransitionOutcome) {
    if !outcome.added.is_empty() {
        warn!("{}: new failures on {}", source, outcome.added.join(", "));
    }
    if !outcome.removed.is_empty() {
        info!("{}: no longer failing: {}", source, outcome.removed.join(", "));
    }
}
