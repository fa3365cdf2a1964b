//! Shared ownership of the aggregator between the monitor loop and readers.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::status::{HealthSnapshot, StatusAggregator};

pub type Shared<T> = Arc<Mutex<T>>;

/// The single authoritative status, written only by the monitor loop
pub type SharedStatus = Shared<StatusAggregator>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

/// Owned copy of the current status; the lock is held only while cloning
pub fn read_snapshot(status: &SharedStatus) -> HealthSnapshot {
    status.lock().snapshot()
}
