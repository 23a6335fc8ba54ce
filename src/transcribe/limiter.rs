use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Request pacing for transcription submissions.
///
/// At most one request may be in flight, and a new request may not begin
/// until `min_interval` has elapsed since the last one started. Requests
/// that cannot begin are dropped by the caller, not queued: under load the
/// pipeline favors freshness over completeness.
#[derive(Debug)]
pub struct RequestLimiter {
    min_interval: Duration,
    state: Mutex<LimiterState>,
}

#[derive(Debug, Default)]
struct LimiterState {
    in_flight: bool,
    last_started: Option<Instant>,
}

impl RequestLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Try to begin a request. `None` means the caller must drop its
    /// segment. The returned permit frees the limiter when dropped, which
    /// happens when the request returns for any reason, timeout included.
    pub fn try_begin(&self) -> Option<RequestPermit<'_>> {
        let mut state = self.state.lock().unwrap();

        if state.in_flight {
            return None;
        }
        if let Some(last) = state.last_started {
            if last.elapsed() < self.min_interval {
                return None;
            }
        }

        state.in_flight = true;
        state.last_started = Some(Instant::now());
        Some(RequestPermit { limiter: self })
    }

    fn release(&self) {
        self.state.lock().unwrap().in_flight = false;
    }
}

/// In-flight marker handed out by [`RequestLimiter::try_begin`].
#[derive(Debug)]
pub struct RequestPermit<'a> {
    limiter: &'a RequestLimiter,
}

impl Drop for RequestPermit<'_> {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_request_within_interval_is_refused() {
        let limiter = RequestLimiter::new(Duration::from_secs(60));

        let permit = limiter.try_begin();
        assert!(permit.is_some());
        drop(permit);

        // In-flight released, but the cooldown still applies.
        assert!(limiter.try_begin().is_none());
    }

    #[test]
    fn test_in_flight_blocks_even_after_interval() {
        let limiter = RequestLimiter::new(Duration::ZERO);

        let _permit = limiter.try_begin().expect("first request should begin");
        assert!(
            limiter.try_begin().is_none(),
            "one in-flight request at a time"
        );
    }

    #[test]
    fn test_dropping_permit_frees_the_limiter() {
        let limiter = RequestLimiter::new(Duration::ZERO);

        drop(limiter.try_begin().expect("first request"));
        assert!(
            limiter.try_begin().is_some(),
            "released permit must allow the next request"
        );
    }
}
