use std::time::Duration;
use time::OffsetDateTime;
use tracing::debug;

/// Refresh cycle: `Idle -> Polling -> (Merged | Failed) -> Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Merged,
    Failed,
}

/// Keeps refreshes phase-locked to the OTP period boundary.
#[derive(Debug)]
pub struct Scheduler {
    period: u64,
    phase: Phase,
}

impl Scheduler {
    pub fn new(period: u64) -> Self {
        Scheduler {
            period: period.max(1),
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Wait before the very first poll.
    pub fn first_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Enter `Polling`. False if a poll is already in flight.
    pub fn begin_poll(&mut self) -> bool {
        if self.phase == Phase::Polling {
            return false;
        }
        self.phase = Phase::Polling;
        true
    }

    /// Back to `Idle`; returns how long to wait for the next poll.
    pub fn finish(&mut self, outcome: Outcome, now: OffsetDateTime) -> Duration {
        self.phase = Phase::Idle;
        let wait = delay_until_boundary(now, self.period);
        debug!(?outcome, ?wait, "refresh finished");
        wait
    }
}

/// `period - (now mod period)`, in `(0, period]`.
pub fn delay_until_boundary(now: OffsetDateTime, period: u64) -> Duration {
    let period_ms = i128::from(period.max(1)) * 1_000;
    let now_ms = now.unix_timestamp_nanos() / 1_000_000;
    let left = period_ms - now_ms.rem_euclid(period_ms);
    Duration::from_millis(left as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64, millis: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap() + time::Duration::milliseconds(millis)
    }

    #[test]
    fn first_wait_is_zero() {
        assert_eq!(Scheduler::new(30).first_delay(), Duration::ZERO);
    }

    #[test]
    fn waits_until_next_boundary() {
        assert_eq!(delay_until_boundary(at(1_700_000_000, 0), 30), Duration::from_secs(10));
        assert_eq!(
            delay_until_boundary(at(1_700_000_009, 250), 30),
            Duration::from_millis(750)
        );
    }

    #[test]
    fn on_boundary_waits_full_period() {
        assert_eq!(delay_until_boundary(at(1_699_999_980, 0), 30), Duration::from_secs(30));
    }

    #[test]
    fn wait_always_within_period() {
        let period = Duration::from_secs(30);
        for step in 0..200 {
            let wait = delay_until_boundary(at(1_700_000_000, step * 377), 30);
            assert!(wait > Duration::ZERO && wait <= period, "{wait:?}");
        }
    }

    #[test]
    fn phase_cycle() {
        let mut scheduler = Scheduler::new(30);
        assert_eq!(scheduler.phase(), Phase::Idle);

        assert!(scheduler.begin_poll());
        assert_eq!(scheduler.phase(), Phase::Polling);
        assert!(!scheduler.begin_poll());

        let wait = scheduler.finish(Outcome::Failed, at(1_700_000_000, 0));
        assert_eq!(wait, Duration::from_secs(10));
        assert_eq!(scheduler.phase(), Phase::Idle);
        assert!(scheduler.begin_poll());
    }
}
