//! Wall-clock budgets for the anytime searches.
//!
//! Budget expiry is not an error: expired searches return their best result
//! so far and report it through a `finished_in_time` flag.

use std::time::{Duration, Instant};

/// A monotonic-clock deadline polled once per search node.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    end: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            end: Instant::now() + budget,
        }
    }

    #[inline]
    pub fn expired(&self) -> bool {
        Instant::now() >= self.end
    }

    pub fn remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

/// Expiry check for optional deadlines; no deadline never expires.
#[inline]
pub fn expired(deadline: &Option<Deadline>) -> bool {
    deadline.as_ref().is_some_and(Deadline::expired)
}
