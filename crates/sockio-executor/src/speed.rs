//! Transfer rate accounting
//!
//! One counter per direction. The rate is total bytes over time since the
//! connection finished; a socket is failed once its rate has stayed below
//! the configured minimum for longer than the configured duration.

use std::time::{Duration, Instant};

use sockio_core::{Direction, SockError, SockResult, SpeedLimit};

/// Below this window the rate is not meaningful
const MIN_SAMPLE_WINDOW: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub(crate) struct SpeedRateCounter {
    direction: Direction,
    bytes: u64,
    below_since: Option<Instant>,
}

impl SpeedRateCounter {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            bytes: 0,
            below_since: None,
        }
    }

    pub fn reset(&mut self) {
        self.bytes = 0;
        self.below_since = None;
    }

    /// Account `bytes` moved since `since`; returns the current rate
    pub fn record(
        &mut self,
        bytes: usize,
        since: Instant,
        limit: Option<SpeedLimit>,
    ) -> SockResult<Option<f64>> {
        self.record_at(bytes, since, Instant::now(), limit)
    }

    pub fn record_at(
        &mut self,
        bytes: usize,
        since: Instant,
        now: Instant,
        limit: Option<SpeedLimit>,
    ) -> SockResult<Option<f64>> {
        self.bytes += bytes as u64;

        let elapsed = now.saturating_duration_since(since);
        if elapsed < MIN_SAMPLE_WINDOW {
            return Ok(None);
        }
        let speed = self.bytes as f64 / elapsed.as_secs_f64();

        let Some(limit) = limit else {
            return Ok(Some(speed));
        };
        if speed >= limit.bytes_per_sec as f64 {
            self.below_since = None;
            return Ok(Some(speed));
        }

        let below_since = *self.below_since.get_or_insert(now);
        if now.saturating_duration_since(below_since) > limit.duration {
            return Err(SockError::SlowTransfer {
                direction: self.direction,
                speed,
                min_speed: limit.bytes_per_sec,
                duration: limit.duration,
            });
        }
        Ok(Some(speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_without_limit() {
        let start = Instant::now();
        let mut c = SpeedRateCounter::new(Direction::Receive);
        let speed = c
            .record_at(1000, start, start + Duration::from_secs(2), None)
            .unwrap();
        assert_eq!(speed, Some(500.0));
    }

    #[test]
    fn test_too_early_to_measure() {
        let start = Instant::now();
        let mut c = SpeedRateCounter::new(Direction::Send);
        assert_eq!(c.record_at(10, start, start, None).unwrap(), None);
    }

    #[test]
    fn test_slow_transfer_after_grace() {
        let start = Instant::now();
        let limit = Some(SpeedLimit::new(1000, Duration::from_secs(1)));
        let mut c = SpeedRateCounter::new(Direction::Receive);

        // below the limit, grace period starts
        let t1 = start + Duration::from_secs(1);
        assert!(c.record_at(10, start, t1, limit).is_ok());

        // still inside grace
        let t2 = t1 + Duration::from_millis(500);
        assert!(c.record_at(10, start, t2, limit).is_ok());

        let t3 = t1 + Duration::from_millis(1500);
        match c.record_at(10, start, t3, limit) {
            Err(SockError::SlowTransfer {
                direction,
                min_speed,
                ..
            }) => {
                assert_eq!(direction, Direction::Receive);
                assert_eq!(min_speed, 1000);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_recovery_resets_grace() {
        let start = Instant::now();
        let limit = Some(SpeedLimit::new(100, Duration::from_secs(1)));
        let mut c = SpeedRateCounter::new(Direction::Send);

        let t1 = start + Duration::from_secs(1);
        c.record_at(50, start, t1, limit).unwrap();
        assert!(c.below_since.is_some());

        c.record_at(500, start, t1 + Duration::from_millis(10), limit).unwrap();
        assert!(c.below_since.is_none());
    }
}
