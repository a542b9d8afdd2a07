//! Repeating "time remaining" ticks for the active turn.
//!
//! The scheduler does not own a clock or the lobby state. Its background task
//! only posts [`CountdownTick`]s into the event loop's queue; the loop then
//! calls [`CountdownScheduler::on_tick`] with the current time and offset.
//! Every [`start`](CountdownScheduler::start) opens a new epoch, and ticks
//! carrying an older epoch are ignored, so a tick that was already queued
//! when the turn changed can never display stale data.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::clock::{seconds_remaining, ClockOffset};
use crate::protocol::Millis;

/// Wake-up posted by the tick task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTick {
    pub epoch: u64,
}

#[derive(Debug)]
struct ActiveCountdown {
    epoch: u64,
    deadline: Millis,
    last_emitted: Option<i64>,
    task: JoinHandle<()>,
}

/// Drives the countdown for at most one turn at a time.
#[derive(Debug)]
pub struct CountdownScheduler {
    period: Duration,
    epoch: u64,
    active: Option<ActiveCountdown>,
}

impl CountdownScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            epoch: 0,
            active: None,
        }
    }

    /// Start counting down towards `deadline` (server clock), cancelling any
    /// previous countdown. `sink` is called on every tick, the first one
    /// immediately; returning `false` stops the task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, deadline: Millis, sink: F) -> u64
    where
        F: Fn(CountdownTick) -> bool + Send + 'static,
    {
        self.cancel();
        self.epoch += 1;
        let epoch = self.epoch;
        let period = self.period;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !sink(CountdownTick { epoch }) {
                    break;
                }
            }
        });

        debug!(epoch, deadline, "countdown started");
        self.active = Some(ActiveCountdown {
            epoch,
            deadline,
            last_emitted: None,
            task,
        });
        epoch
    }

    /// Stop the running countdown. Returns `false` if nothing was running.
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                active.task.abort();
                debug!(epoch = active.epoch, "countdown cancelled");
                true
            }
            None => false,
        }
    }

    /// Value to display for `tick`, or `None` if the tick is stale, nothing is
    /// running, or the value has not changed since the last emission.
    pub fn on_tick(&mut self, tick: CountdownTick, now: Millis, offset: ClockOffset) -> Option<i64> {
        let active = self.active.as_mut()?;
        if active.epoch != tick.epoch {
            debug!(stale = tick.epoch, current = active.epoch, "stale countdown tick");
            return None;
        }
        let seconds = seconds_remaining(active.deadline, now, offset);
        if active.last_emitted == Some(seconds) {
            return None;
        }
        active.last_emitted = Some(seconds);
        Some(seconds)
    }

    /// Whether the running countdown targets `deadline`. `false` when idle.
    pub fn is_for(&self, deadline: Option<Millis>) -> bool {
        matches!((&self.active, deadline), (Some(active), Some(d)) if active.deadline == d)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.active.as_ref().map(|active| active.deadline)
    }

    /// Epoch of the last started countdown (`0` if none was ever started).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for CountdownScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn channel_sink() -> (
        impl Fn(CountdownTick) -> bool + Send + 'static,
        mpsc::UnboundedReceiver<CountdownTick>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (move |tick| tx.send(tick).is_ok(), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_immediate_then_periodic() {
        let mut scheduler = CountdownScheduler::new(Duration::from_millis(250));
        let (sink, mut rx) = channel_sink();
        let epoch = scheduler.start(10_000, sink);

        assert_eq!(rx.recv().await, Some(CountdownTick { epoch }));
        let before = tokio::time::Instant::now();
        assert_eq!(rx.recv().await, Some(CountdownTick { epoch }));
        assert_eq!(before.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn restart_invalidates_queued_ticks() {
        let mut scheduler = CountdownScheduler::new(Duration::from_millis(100));
        let (sink, mut rx) = channel_sink();
        let old = scheduler.start(10_000, sink);
        let queued = rx.recv().await.unwrap();
        assert_eq!(queued.epoch, old);

        let (sink, _rx2) = channel_sink();
        let new = scheduler.start(20_000, sink);
        assert_ne!(old, new);

        assert_eq!(scheduler.on_tick(queued, 0, ClockOffset::ZERO), None);
        assert_eq!(
            scheduler.on_tick(CountdownTick { epoch: new }, 0, ClockOffset::ZERO),
            Some(20)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn emits_only_when_value_changes() {
        let mut scheduler = CountdownScheduler::new(Duration::from_millis(100));
        let (sink, _rx) = channel_sink();
        let epoch = scheduler.start(10_000, sink);
        let tick = CountdownTick { epoch };

        assert_eq!(scheduler.on_tick(tick, 0, ClockOffset::ZERO), Some(10));
        assert_eq!(scheduler.on_tick(tick, 100, ClockOffset::ZERO), None);
        assert_eq!(scheduler.on_tick(tick, 1_000, ClockOffset::ZERO), Some(9));
        assert_eq!(scheduler.on_tick(tick, 50_000, ClockOffset::ZERO), Some(0));
        assert_eq!(scheduler.on_tick(tick, 60_000, ClockOffset::ZERO), None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_happens_once_and_stops_the_task() {
        let mut scheduler = CountdownScheduler::new(Duration::from_millis(100));
        let (sink, mut rx) = channel_sink();
        let epoch = scheduler.start(10_000, sink);
        rx.recv().await.unwrap();

        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());
        assert!(!scheduler.is_active());
        assert_eq!(scheduler.on_tick(CountdownTick { epoch }, 0, ClockOffset::ZERO), None);

        // The aborted task dropped its sender, so the channel closes.
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn is_for_matches_only_the_scheduled_deadline() {
        let mut scheduler = CountdownScheduler::new(Duration::from_millis(100));
        assert!(!scheduler.is_for(Some(5)));

        let (sink, _rx) = channel_sink();
        scheduler.start(5_000, sink);
        assert!(scheduler.is_for(Some(5_000)));
        assert!(!scheduler.is_for(Some(6_000)));
        assert!(!scheduler.is_for(None));
        assert_eq!(scheduler.deadline(), Some(5_000));
    }
}
