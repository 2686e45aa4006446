use std::time::{Duration, Instant};

/// Tracks request timing for one host
///
/// The fetch layer keeps one of these per host key and consults it before
/// every request to enforce the minimum delay between requests.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of requests made to this host in the current run
    pub request_count: u32,

    /// Timestamp of the last request to this host
    pub last_request_time: Option<Instant>,

    /// Crawl-delay announced by the host's robots.txt
    pub crawl_delay: Option<Duration>,
}

impl HostState {
    /// Creates a new HostState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the delay to apply: the larger of the configured delay and
    /// the robots.txt crawl-delay
    pub fn effective_delay(&self, configured: Duration) -> Duration {
        self.crawl_delay
            .map_or(configured, |robots| std::cmp::max(configured, robots))
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, configured: Duration, now: Instant) -> Option<Duration> {
        // The last request may be a reservation in the future
        let next_allowed = self.last_request_time? + self.effective_delay(configured);
        let wait = next_allowed.saturating_duration_since(now);
        if wait.is_zero() {
            None
        } else {
            Some(wait)
        }
    }

    /// Records that a request was made to this host
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(1000);

    #[test]
    fn test_new_host_state() {
        let state = HostState::new();
        assert_eq!(state.request_count, 0);
        assert!(state.last_request_time.is_none());
        assert!(state.crawl_delay.is_none());
    }

    #[test]
    fn test_no_wait_initially() {
        let state = HostState::new();
        assert!(state
            .time_until_next_request(DELAY, Instant::now())
            .is_none());
    }

    #[test]
    fn test_wait_when_too_soon() {
        let mut state = HostState::new();
        let now = Instant::now();
        state.record_request(now);

        assert!(state.time_until_next_request(DELAY, now).is_some());
        assert!(state
            .time_until_next_request(DELAY, now + Duration::from_millis(500))
            .is_some());
        assert!(state
            .time_until_next_request(DELAY, now + Duration::from_millis(1100))
            .is_none());
    }

    #[test]
    fn test_record_request() {
        let mut state = HostState::new();
        let now = Instant::now();

        state.record_request(now);
        assert_eq!(state.request_count, 1);
        assert_eq!(state.last_request_time, Some(now));

        state.record_request(now);
        assert_eq!(state.request_count, 2);
    }

    #[test]
    fn test_time_until_next_request() {
        let mut state = HostState::new();
        let now = Instant::now();

        assert!(state.time_until_next_request(DELAY, now).is_none());

        state.last_request_time = Some(now);
        assert_eq!(state.time_until_next_request(DELAY, now), Some(DELAY));

        let soon = now + Duration::from_millis(500);
        assert_eq!(
            state.time_until_next_request(DELAY, soon),
            Some(Duration::from_millis(500))
        );

        let later = now + Duration::from_millis(1100);
        assert!(state.time_until_next_request(DELAY, later).is_none());
    }

    #[test]
    fn test_reserved_slot_in_future() {
        let mut state = HostState::new();
        let now = Instant::now();
        state.record_request(now + DELAY);
        assert_eq!(state.time_until_next_request(DELAY, now), Some(DELAY * 2));
    }

    #[test]
    fn test_effective_delay_uses_config() {
        let state = HostState::new();
        assert_eq!(state.effective_delay(DELAY), DELAY);
    }

    #[test]
    fn test_effective_delay_with_robots_delay() {
        let mut state = HostState::new();
        state.crawl_delay = Some(Duration::from_secs(5));
        assert_eq!(state.effective_delay(DELAY), Duration::from_secs(5));
    }

    #[test]
    fn test_effective_delay_robots_smaller_than_config() {
        let mut state = HostState::new();
        state.crawl_delay = Some(Duration::from_millis(500));
        assert_eq!(state.effective_delay(DELAY), DELAY);
    }

    #[test]
    fn test_zero_delay_never_waits() {
        let mut state = HostState::new();
        let now = Instant::now();
        state.record_request(now);
        assert!(state.time_until_next_request(Duration::ZERO, now).is_none());
    }
}
