//! Thread-safe counter for frame sequence numbers and command tokens.
//!
//! # Why tokens? (for beginners)
//!
//! Every command the engine sends carries a 32-bit *token*.  The module echoes
//! the token back in its `Ack` or `Nak`, which is how a response is matched to
//! the caller waiting for it, even when many callers have commands in flight
//! at the same time.  Tokens therefore must never repeat while a request is
//! still pending.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU32` internally.  `fetch_add` reads, increments and
//! writes the value as one indivisible step, so two callers can never obtain
//! the same value, and no lock is needed.

use std::sync::atomic::{AtomicU32, Ordering};

/// A thread-safe, monotonically increasing 32-bit counter.
///
/// The counter wraps around at `u32::MAX` back to 0 without panicking.
///
/// # Examples
///
/// ```rust
/// use wasim_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::starting_at(1);
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
#[derive(Debug)]
pub struct SequenceCounter {
    inner: AtomicU32,
}

impl SequenceCounter {
    /// Creates a new counter starting at 0.
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Creates a counter whose first value is `first`.
    pub fn starting_at(first: u32) -> Self {
        Self {
            inner: AtomicU32::new(first),
        }
    }

    /// Returns the next value and atomically increments the counter.
    ///
    /// `Ordering::Relaxed` is enough: the value identifies a message, it does
    /// not publish any other memory.
    pub fn next(&self) -> u32 {
        self.inner.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the value the next call to [`next`](Self::next) will produce.
    pub fn current(&self) -> u32 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
