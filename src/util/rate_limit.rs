//! Inbound message rate limiting

use std::num::NonZeroU32;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Max inbound messages per second per connection.
/// A held key replicates every 20ms (50/s), so this leaves headroom.
pub const INPUT_RATE_LIMIT: u32 = 60;

/// Rate limiter owned by one connection's reader loop
pub struct ConnectionRateLimiter {
    limiter: DirectLimiter,
    dropped: u64,
}

impl ConnectionRateLimiter {
    pub fn new() -> Self {
        Self::per_second(INPUT_RATE_LIMIT)
    }

    pub fn per_second(messages: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(messages).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::direct(quota),
            dropped: 0,
        }
    }

    /// True if the message may be processed; counts the ones that may not
    pub fn admit(&mut self) -> bool {
        let ok = self.limiter.check().is_ok();
        if !ok {
            self.dropped += 1;
        }
        ok
    }

    /// Messages rejected so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Default for ConnectionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_counted() {
        let mut limiter = ConnectionRateLimiter::per_second(10);
        let admitted = (0..30).filter(|_| limiter.admit()).count();
        assert!(admitted >= 1 && admitted <= 11);
        assert_eq!(limiter.dropped(), 30 - admitted as u64);
    }
}
