use std::time::{Duration, Instant};

use regex::Regex;

/// Single process-global deadline. While `now < block_until`, outbound PVP
/// dials fail locally rather than touching the network (§3, §4.3).
///
/// Private to the dispatcher thread, same as `Cache`.
pub struct RateLimitGate {
    block_until: Instant,
    extra_wait: Duration,
    peer_flood: Duration,
    too_many_requests_re: Regex,
}

impl RateLimitGate {
    pub fn new(extra_wait: Duration, peer_flood: Duration) -> Self {
        Self {
            block_until: Instant::now(),
            extra_wait,
            peer_flood,
            too_many_requests_re: Regex::new(r"Too Many Requests: retry after (\d+)").unwrap(),
        }
    }

    /// Seconds remaining until the gate opens, or `None` if it is already open.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        if now < self.block_until {
            Some(self.block_until - now)
        } else {
            None
        }
    }

    pub fn is_blocked(&self, now: Instant) -> bool {
        now < self.block_until
    }

    /// Parses a PVP server error message and updates `block_until` as a side
    /// effect. Any message that matches neither pattern leaves the gate
    /// untouched.
    pub fn observe_error(&mut self, now: Instant, message: &str) {
        if let Some(caps) = self.too_many_requests_re.captures(message) {
            let secs: u64 = caps[1].parse().unwrap_or(0);
            self.block_until = now + Duration::from_secs(secs) + self.extra_wait;
        } else if message.contains("PEER_FLOOD") {
            self.block_until = now + self.peer_flood;
        }
    }
}
