//! Nonce generation for signed requests.
//!
//! Nonces are wall-clock microseconds since the Unix epoch. In strict mode a
//! monotonic guard is layered on top so two calls within the same clock tick,
//! or across a clock regression, still produce strictly increasing values.

use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for obtaining current time, enabling testability.
pub trait Clock: Send + Sync {
    /// Returns current time in microseconds since Unix epoch.
    fn now_us(&self) -> u64;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_us(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0)
    }
}

/// Issues request nonces.
///
/// # Guarantees
/// - Strict mode: `next()` returns `max(last + 1, now_us)`, so nonces never
///   repeat or decrease for the lifetime of the manager.
/// - Non-strict mode: `next()` returns `now_us` verbatim; duplicates are
///   possible when calls outpace the clock resolution.
/// - Thread-safe for concurrent access.
pub struct NonceManager<C: Clock> {
    /// Last issued nonce.
    last: AtomicU64,
    strict: bool,
    clock: C,
}

impl<C: Clock> NonceManager<C> {
    #[must_use]
    pub fn new(clock: C, strict: bool) -> Self {
        Self {
            last: AtomicU64::new(0),
            strict,
            clock,
        }
    }

    /// Generates the next nonce value.
    ///
    /// Thread-safe via CAS loop.
    pub fn next(&self) -> u64 {
        let now = self.clock.now_us();

        if !self.strict {
            self.last.fetch_max(now, Ordering::AcqRel);
            return now;
        }

        loop {
            let current = self.last.load(Ordering::Acquire);
            let next_val = current.saturating_add(1).max(now);

            match self.last.compare_exchange_weak(
                current,
                next_val,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if next_val != now {
                        tracing::trace!(
                            clock_us = now,
                            nonce = next_val,
                            "nonce bumped past clock"
                        );
                    }
                    return next_val;
                }
                Err(_) => continue,
            }
        }
    }

    /// Returns the last issued nonce (0 before the first call).
    #[must_use]
    pub fn last(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

impl NonceManager<SystemClock> {
    /// Creates a new `NonceManager` with the system clock.
    #[must_use]
    pub fn with_system_clock(strict: bool) -> Self {
        Self::new(SystemClock, strict)
    }
}
