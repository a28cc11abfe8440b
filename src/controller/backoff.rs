//! # Fibonacci Backoff
//!
//! Progressive retry delays for failed bucket reconciliations.
//!
//! The sequence is computed in minutes and handed out in seconds:
//! 1m, 1m, 2m, 3m, 5m, 8m, 10m (max) with the default bounds.
//!
//! ```rust
//! use backup_bucket_controller::controller::backoff::FibonacciBackoff;
//!
//! let mut backoff = FibonacciBackoff::new(1, 10);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 60);
//! assert_eq!(backoff.next_backoff_seconds(), 120);
//! ```

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each value is the sum of the previous two, capped at `max_minutes`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min_minutes: u64,
    prev_minutes: u64,
    current_minutes: u64,
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a backoff bounded by `min_minutes` and `max_minutes`
    ///
    /// A maximum below the minimum is raised to the minimum.
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        let min_minutes = min_minutes.max(1);
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes: max_minutes.max(min_minutes),
        }
    }

    /// Get the next backoff in seconds and advance the sequence
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result_seconds = self.current_minutes * 60;

        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = std::cmp::min(next_minutes, self.max_minutes);

        result_seconds
    }

    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Restart the sequence after a successful reconciliation
    ///
    /// ```
    /// use backup_bucket_controller::controller::backoff::FibonacciBackoff;
    ///
    /// let mut backoff = FibonacciBackoff::new(1, 10);
    /// backoff.next_backoff_seconds();
    /// backoff.next_backoff_seconds();
    /// backoff.reset();
    /// assert_eq!(backoff.next_backoff_seconds(), 60);
    /// ```
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fibonacci_backoff_sequence_is_capped() {
        let mut backoff = FibonacciBackoff::new(1, 10);

        let sequence: Vec<u64> = (0..9).map(|_| backoff.next_backoff_seconds()).collect();
        assert_eq!(sequence, vec![60, 60, 120, 180, 300, 480, 600, 600, 600]);
    }

    #[test]
    fn test_fibonacci_backoff_reset() {
        let mut backoff = FibonacciBackoff::new(1, 10);

        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.next_backoff_seconds();
        backoff.reset();

        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(60));
        assert_eq!(backoff.next_backoff(), Duration::from_secs(120));
    }

    #[test]
    fn test_fibonacci_backoff_independent_per_bucket() {
        let mut first = FibonacciBackoff::new(1, 10);
        let mut second = FibonacciBackoff::new(1, 10);

        for _ in 0..4 {
            first.next_backoff_seconds();
        }
        assert_eq!(second.next_backoff_seconds(), 60);
        assert_eq!(first.next_backoff_seconds(), 300);
    }

    #[test]
    fn test_fibonacci_backoff_bounds_are_sanitized() {
        let mut backoff = FibonacciBackoff::new(0, 0);
        assert_eq!(backoff.next_backoff_seconds(), 60);
        assert_eq!(backoff.next_backoff_seconds(), 60);
        assert_eq!(backoff.next_backoff_seconds(), 60);
    }
}
