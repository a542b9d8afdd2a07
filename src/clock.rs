//! Clock-skew correction for turn deadlines.
//!
//! The server sends turn deadlines as absolute timestamps on its own clock.
//! To show "seconds remaining" the client estimates the offset between the
//! server clock and its local clock with a single NTP-style round-trip
//! probe:
//!
//! ```text
//! t0 = local time before the request
//! S  = server time in the response
//! t1 = local time after the response
//! offset = S + (t1 - t0) / 2 - t1
//! ```
//!
//! The estimate assumes both legs of the round trip took equally long. It is
//! accurate to within half the round-trip jitter, which is fine for a
//! countdown shown to humans; it is an approximation, not synchronization.
//!
//! Offsets are per connection. A fresh probe runs on every (re)connect and
//! [`ClockSync`] rejects samples belonging to an older connection
//! [`Generation`].

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::protocol::Millis;
use crate::reconnect::Generation;

/// Source of local wall-clock time in Unix milliseconds.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> Millis;
}

/// [`Clock`] backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Millis {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => Millis::try_from(since.as_millis()).unwrap_or(Millis::MAX),
            Err(before) => Millis::try_from(before.duration().as_millis())
                .map(|ms| -ms)
                .unwrap_or(Millis::MIN),
        }
    }
}

/// Estimated `server time - local time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClockOffset {
    pub offset_millis: i64,
}

impl ClockOffset {
    pub const ZERO: Self = Self { offset_millis: 0 };

    /// Convert a local timestamp to the server's clock.
    pub fn to_server(self, local: Millis) -> Millis {
        local.saturating_add(self.offset_millis)
    }
}

/// Offset estimate for a single probe (see the module docs).
pub fn estimate_offset(t0: Millis, server: Millis, t1: Millis) -> ClockOffset {
    let half_rtt = t1.saturating_sub(t0) / 2;
    ClockOffset {
        offset_millis: server.saturating_add(half_rtt).saturating_sub(t1),
    }
}

/// Whole seconds left until `deadline` (server clock) as seen from local time
/// `now`, rounded to the nearest second. Never negative: any deadline in the
/// past yields `0`.
pub fn seconds_remaining(deadline: Millis, now: Millis, offset: ClockOffset) -> i64 {
    let left = deadline.saturating_sub(offset.to_server(now));
    if left <= 0 {
        return 0;
    }
    left.saturating_add(500) / 1000
}

/// The endpoint that reports the server's current time.
#[async_trait]
pub trait TimeSource: Send + Sync + 'static {
    /// Current server time in Unix milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`WordcraftError::TimeSync`](crate::WordcraftError::TimeSync)
    /// (or a transport-level error) if the time could not be obtained.
    async fn server_time(&self) -> Result<Millis>;
}

/// One round-trip measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSample {
    /// Local time when the request was sent.
    pub t0: Millis,
    /// Server time reported in the response.
    pub server: Millis,
    /// Local time when the response arrived.
    pub t1: Millis,
}

impl ProbeSample {
    pub fn offset(&self) -> ClockOffset {
        estimate_offset(self.t0, self.server, self.t1)
    }

    pub fn round_trip(&self) -> Millis {
        self.t1.saturating_sub(self.t0)
    }
}

/// Take one round-trip sample against `source`.
///
/// # Errors
///
/// Propagates any error from [`TimeSource::server_time`].
pub async fn probe(clock: &dyn Clock, source: &dyn TimeSource) -> Result<ProbeSample> {
    let t0 = clock.now_millis();
    let server = source.server_time().await?;
    let t1 = clock.now_millis();
    let sample = ProbeSample { t0, server, t1 };
    debug!(
        rtt_ms = sample.round_trip(),
        offset_ms = sample.offset().offset_millis,
        "clock probe completed"
    );
    Ok(sample)
}

/// Clock offset for one connection.
///
/// Starts at [`ClockOffset::ZERO`] (trust the local clock) until a probe for
/// the same generation is accepted.
#[derive(Debug, Clone)]
pub struct ClockSync {
    generation: Generation,
    offset: ClockOffset,
    synchronized: bool,
}

impl ClockSync {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            offset: ClockOffset::ZERO,
            synchronized: false,
        }
    }

    /// Record the result of a probe. Returns `false` (and changes nothing) if
    /// the probe was started for a different connection generation.
    pub fn accept(&mut self, generation: Generation, sample: &ProbeSample) -> bool {
        if generation != self.generation {
            debug!(
                stale = %generation,
                current = %self.generation,
                "discarding clock probe from another connection"
            );
            return false;
        }
        self.offset = sample.offset();
        self.synchronized = true;
        true
    }

    pub fn offset(&self) -> ClockOffset {
        self.offset
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether a probe has been accepted for this connection.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    pub fn seconds_remaining(&self, deadline: Millis, now: Millis) -> i64 {
        seconds_remaining(deadline, now, self.offset)
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
    use crate::error::WordcraftError;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    #[test]
    fn offset_assumes_symmetric_legs() {
        let offset = estimate_offset(1000, 1500, 1100);
        assert_eq!(offset.offset_millis, 450);
    }

    #[test]
    fn deadline_already_passed_after_correction() {
        let offset = estimate_offset(1000, 1500, 1100);
        assert_eq!(seconds_remaining(2000, 1600, offset), 0);
    }

    #[test]
    fn remaining_seconds_round_to_nearest() {
        let zero = ClockOffset::ZERO;
        assert_eq!(seconds_remaining(10_000, 0, zero), 10);
        assert_eq!(seconds_remaining(10_499, 0, zero), 10);
        assert_eq!(seconds_remaining(10_500, 0, zero), 11);
        assert_eq!(seconds_remaining(499, 0, zero), 0);
    }

    #[test]
    fn remaining_seconds_never_negative() {
        let offsets = [-1_000_000, -450, 0, 450, 1_000_000, i64::MAX, i64::MIN];
        let deadlines = [i64::MIN, -5_000, 0, 1_000, 20_000, i64::MAX];
        for offset_millis in offsets {
            for deadline in deadlines {
                let left = seconds_remaining(deadline, 5_000, ClockOffset { offset_millis });
                assert!(left >= 0, "deadline={deadline} offset={offset_millis} -> {left}");
            }
        }
    }

    #[test]
    fn positive_offset_means_server_ahead() {
        // Server is 2s ahead: a deadline 10s out on the server clock is 8s out locally.
        let offset = ClockOffset {
            offset_millis: 2_000,
        };
        assert_eq!(seconds_remaining(12_000, 2_000, offset), 8);
    }

    #[test]
    fn clock_sync_rejects_stale_generation() {
        let current = Generation::new(3);
        let mut sync = ClockSync::new(current);
        let sample = ProbeSample {
            t0: 0,
            server: 900,
            t1: 200,
        };

        assert!(!sync.accept(Generation::new(2), &sample));
        assert_eq!(sync.offset(), ClockOffset::ZERO);
        assert!(!sync.is_synchronized());

        assert!(sync.accept(current, &sample));
        assert_eq!(sync.offset().offset_millis, 800);
        assert!(sync.is_synchronized());
    }

    struct SteppingClock(AtomicI64);

    impl Clock for SteppingClock {
        fn now_millis(&self) -> Millis {
            // Every read advances the clock by 100ms.
            self.0.fetch_add(100, Ordering::SeqCst)
        }
    }

    struct FixedServer(Millis);

    #[async_trait]
    impl TimeSource for FixedServer {
        async fn server_time(&self) -> Result<Millis> {
            Ok(self.0)
        }
    }

    struct BrokenServer;

    #[async_trait]
    impl TimeSource for BrokenServer {
        async fn server_time(&self) -> Result<Millis> {
            Err(WordcraftError::TimeSync("503".into()))
        }
    }

    #[tokio::test]
    async fn probe_records_both_local_readings() {
        let clock = Arc::new(SteppingClock(AtomicI64::new(1000)));
        let sample = probe(clock.as_ref(), &FixedServer(1500)).await.unwrap();
        assert_eq!(
            sample,
            ProbeSample {
                t0: 1000,
                server: 1500,
                t1: 1100
            }
        );
        assert_eq!(sample.round_trip(), 100);
        assert_eq!(sample.offset().offset_millis, 450);
    }

    #[tokio::test]
    async fn probe_propagates_source_errors() {
        let clock = SteppingClock(AtomicI64::new(0));
        let err = probe(&clock, &BrokenServer).await.unwrap_err();
        assert!(matches!(err, WordcraftError::TimeSync(_)));
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
