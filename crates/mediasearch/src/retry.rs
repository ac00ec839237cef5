//! Retry backoff computation.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with ±25% jitter:
/// `min(base * 2^attempt, max) * uniform(0.75, 1.25)`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exp = base
        .checked_mul(2u32.saturating_pow(attempt.min(31)))
        .unwrap_or(max)
        .min(max);
    let jitter = rand::thread_rng().gen_range(0.75..=1.25_f64);
    Duration::from_millis((exp.as_millis() as f64 * jitter) as u64)
}

/// Whether another retry attempt is within budget.
///
/// `attempt` is the attempt that just failed (0-based); the follow-up job
/// would run as `attempt + 1`.
pub fn within_budget(attempt: u32, max_attempts: u32) -> bool {
    attempt + 1 < max_attempts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_stays_within_jitter_bounds() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(300);
        for attempt in 0..6 {
            let nominal = (base * 2u32.pow(attempt)).min(max);
            for _ in 0..50 {
                let d = backoff_delay(attempt, base, max);
                let lo = nominal.as_millis() as f64 * 0.75;
                let hi = nominal.as_millis() as f64 * 1.25;
                assert!(
                    (d.as_millis() as f64) >= lo - 1.0 && (d.as_millis() as f64) <= hi + 1.0,
                    "attempt {attempt}: {d:?} outside [{lo}, {hi}]"
                );
            }
        }
    }

    #[test]
    fn delay_caps_at_max() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(300);
        let d = backoff_delay(30, base, max);
        assert!(d <= Duration::from_millis((300_000.0 * 1.25) as u64 + 1));
    }

    #[test]
    fn budget_boundary() {
        // attempt = MAX - 1 failing retryably goes to the DLQ, not retry.
        assert!(within_budget(3, 5));
        assert!(!within_budget(4, 5));
    }
}
