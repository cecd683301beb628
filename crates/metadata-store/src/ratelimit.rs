// SECTION: Rate-limited warnings

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Bounds how often a warning fires from a single call site.
///
/// Guards the non-monotonic-payload-version and unparseable-value
/// warnings: allows at most one log line per window, which is enough to
/// keep a hot loop of stale writes from flooding the log without needing
/// a full token-bucket implementation.
pub struct RateLimiter {
    /// Minimum spacing between two fired warnings.
    window: Duration,
    /// When the limiter last allowed a warning through.
    last_fired: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter that allows at most one log line per `window`.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fired: Mutex::new(None),
        }
    }

    /// Returns true if the caller should log now, and records that it did.
    #[must_use]
    pub fn should_fire(&self) -> bool {
        let mut last_fired = self.last_fired.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();
        let should_fire = match *last_fired {
            Some(last) => now.duration_since(last) >= self.window,
            None => true,
        };
        if should_fire {
            *last_fired = Some(now);
        }
        should_fire
    }
}

impl Default for RateLimiter {
    /// A ten-second window, suitable for the payload-version and
    /// value-parse warnings that use this limiter.
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}
