//! Cooperative time limits for long-running blocking work.
//!
//! A timed-out async wrapper does not stop the blocking task it raced, so
//! loops inside that task check a [`Deadline`] between units of work and bail
//! out on their own.

use std::time::{Duration, Instant};

use crate::error::{CairnError, Result};

/// A point in time after which work should stop.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self {
            started: Instant::now(),
            at: None,
        }
    }

    /// A deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        let started = Instant::now();
        Self {
            started,
            at: started.checked_add(budget),
        }
    }

    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Time left, or `None` for an unbounded deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Fails with [`CairnError::Timeout`] once the deadline has passed.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.expired() {
            Err(CairnError::Timeout {
                operation: operation.to_string(),
                elapsed_ms: self.started.elapsed().as_millis() as u64,
            })
        } else {
            Ok(())
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_deadline_never_expires() {
        let deadline = Deadline::none();
        assert!(!deadline.expired());
        assert!(deadline.remaining().is_none());
        assert!(deadline.check("anything").is_ok());
    }

    #[test]
    fn test_zero_budget_expires_immediately() {
        let deadline = Deadline::after(Duration::ZERO);
        assert!(deadline.expired());
        let err = deadline.check("graph index").unwrap_err();
        assert!(matches!(err, CairnError::Timeout { .. }));
        assert!(err.to_string().starts_with("graph index timed out"));
    }
}
