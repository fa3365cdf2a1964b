//! Fixed-interval trigger for periodic re-checks

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Emitted once per elapsed interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub sequence: u64,
}

/// Spawn the timer task.
///
/// The first tick fires one full `period` after start: the monitor runs its
/// initial checks itself. Late ticks are delayed rather than bunched.
pub fn spawn_scheduler<E>(period: Duration, events: mpsc::Sender<E>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()>
where
    E: From<Tick> + Send + 'static,
{
    tokio::spawn(async move {
        info!("Scheduler started (every {:?})", period);
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut sequence = 0u64;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    sequence += 1;
                    debug!("Scheduler tick #{}", sequence);
                    if events.send(Tick { sequence }.into()).await.is_err() {
                        break;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Scheduler stopped after {} ticks", sequence);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ticks_at_fixed_interval() {
        let period = Duration::from_millis(50);
        let (tx, mut rx) = mpsc::channel::<Tick>(8);
        let (shutdown_tx, shutdown) = watch::channel(false);
        let handle = spawn_scheduler(period, tx, shutdown);

        let started = Instant::now();
        assert_eq!(rx.recv().await, Some(Tick { sequence: 1 }));
        assert!(started.elapsed() >= period);
        assert_eq!(rx.recv().await, Some(Tick { sequence: 2 }));
        assert!(started.elapsed() >= period * 2);

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_stops_when_consumer_is_gone() {
        let (tx, rx) = mpsc::channel::<Tick>(1);
        let (_shutdown_tx, shutdown) = watch::channel(false);
        let handle = spawn_scheduler(Duration::from_millis(10), tx, shutdown);

        drop(rx);
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }
}
