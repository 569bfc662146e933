//! Overall-timeout bookkeeping for a single read/write call

use std::time::{Duration, Instant};

use crate::errors::{Result, SprotError};
use crate::INFINITE_WAIT;

/// Point in time after which a call must give up with [`SprotError::Timeout`]
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// Deadline `timeout_ms` from now; [`INFINITE_WAIT`] never expires
    pub fn after_ms(timeout_ms: u64) -> Self {
        if timeout_ms == INFINITE_WAIT {
            return Self::never();
        }
        Self {
            expires_at: Instant::now().checked_add(Duration::from_millis(timeout_ms)),
        }
    }

    pub fn never() -> Self {
        Self { expires_at: None }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map_or(false, |expires_at| Instant::now() >= expires_at)
    }

    /// Fail with `Timeout` once the deadline has passed
    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(SprotError::Timeout)
        } else {
            Ok(())
        }
    }

    /// Milliseconds left, rounded up so a live deadline never reports zero
    pub fn remaining_ms(&self) -> u64 {
        match self.expires_at {
            None => INFINITE_WAIT,
            Some(expires_at) => {
                let left = expires_at.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    0
                } else {
                    (left.as_millis() as u64).max(1)
                }
            }
        }
    }

    /// Bound a per-attempt timeout by what is left of the overall one
    pub fn clamp_ms(&self, timeout_ms: u64) -> u64 {
        timeout_ms.min(self.remaining_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_deadline() {
        let deadline = Deadline::after_ms(INFINITE_WAIT);
        assert!(!deadline.is_expired());
        assert!(deadline.check().is_ok());
        assert_eq!(deadline.remaining_ms(), INFINITE_WAIT);
        assert_eq!(deadline.clamp_ms(200), 200);
    }

    #[test]
    fn test_zero_timeout_expires_immediately() {
        let deadline = Deadline::after_ms(0);
        assert!(deadline.is_expired());
        assert!(matches!(deadline.check(), Err(SprotError::Timeout)));
        assert_eq!(deadline.remaining_ms(), 0);
    }

    #[test]
    fn test_clamp_to_remaining() {
        let deadline = Deadline::after_ms(50);
        assert!(deadline.clamp_ms(200) <= 50);
        assert!(deadline.clamp_ms(200) >= 1);
        assert_eq!(deadline.clamp_ms(5), 5);
    }

    #[test]
    fn test_expiry() {
        let deadline = Deadline::after_ms(10);
        std::thread::sleep(Duration::from_millis(20));
        assert!(deadline.is_expired());
        assert_eq!(deadline.clamp_ms(200), 0);
    }
}
