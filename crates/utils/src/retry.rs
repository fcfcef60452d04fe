//! Retry/backoff policy shared by the Source and Sink clients.
//!
//! Exponential backoff with a cap, and a classification of errors into
//! Transient (retry), Permanent (terminal), and NotFound. This module is
//! the shared policy; each client crate supplies its own `is_retryable`
//! classification of its wire errors.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier_seconds: f64,
    pub max_backoff_seconds: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, multiplier_seconds: f64) -> Self {
        Self { max_attempts, multiplier_seconds, max_backoff_seconds: 10.0 }
    }

    /// Backoff delay before the given retry attempt (1-indexed: the delay
    /// before the *second* attempt is `backoff_for(1)`).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.multiplier_seconds * 2f64.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(exp.min(self.max_backoff_seconds).max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1.0)
    }
}

/// Classification of an outbound HTTP call's outcome, per's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network failure, 5xx, or 429: retried with backoff at the client layer.
    Transient,
    /// 4xx other than 429: terminal, surfaced as a record-level error.
    Permanent,
    /// Resource disappeared mid-operation.
    NotFound,
}

/// Classify an HTTP status code per the retry/error taxonomy.
pub fn classify_status(status: u16) -> ErrorClass {
    match status {
        404 => ErrorClass::NotFound,
        429 => ErrorClass::Transient,
        500..=599 => ErrorClass::Transient,
        400..=499 => ErrorClass::Permanent,
        _ => ErrorClass::Transient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let policy = RetryPolicy::new(5, 1.0);
        assert_eq!(policy.backoff_for(1), Duration::from_secs_f64(1.0));
        assert_eq!(policy.backoff_for(2), Duration::from_secs_f64(2.0));
        assert_eq!(policy.backoff_for(3), Duration::from_secs_f64(4.0));
        // Caps at max_backoff_seconds regardless of how large the attempt is.
        assert_eq!(policy.backoff_for(10), Duration::from_secs_f64(10.0));
    }

    #[test]
    fn status_classification_matches_taxonomy() {
        assert_eq!(classify_status(503), ErrorClass::Transient);
        assert_eq!(classify_status(429), ErrorClass::Transient);
        assert_eq!(classify_status(404), ErrorClass::NotFound);
        assert_eq!(classify_status(400), ErrorClass::Permanent);
        assert_eq!(classify_status(422), ErrorClass::Permanent);
    }
}
