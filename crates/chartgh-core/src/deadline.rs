use std::time::{Duration, Instant};

use crate::error::ChartError;

/// Longest budget one invocation may ask for.
pub const MAX_BUDGET: Duration = Duration::from_secs(24 * 60 * 60);

/// Wall-clock bound for one invocation, passed into every remote call.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `budget` from now, clamped to [`MAX_BUDGET`].
    #[must_use]
    pub fn after(budget: Duration) -> Self {
        let now = Instant::now();
        Self {
            at: now.checked_add(budget.min(MAX_BUDGET)).unwrap_or(now),
        }
    }

    #[must_use]
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    /// Time left, or `None` once the deadline has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.remaining().is_none()
    }

    pub fn check(&self, context: &str) -> Result<Duration, ChartError> {
        self.remaining()
            .ok_or_else(|| ChartError::DeadlineExceeded {
                context: context.to_string(),
            })
    }
}
