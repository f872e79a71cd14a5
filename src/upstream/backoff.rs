//! Reconnect backoff

use std::time::Duration;

use rand::Rng;

/// Exponential backoff with jitter.
///
/// `initial * 2^(attempt-1)` capped at `max`, with +/- 25% jitter so many
/// restreams of the same provider do not reconnect in lockstep.
pub fn backoff_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let initial_ms = initial.as_millis() as u64;
    let max_ms = max.as_millis() as u64;

    let base = initial_ms.saturating_mul(1u64 << attempt.clamp(1, 17).saturating_sub(1));
    let capped = base.min(max_ms);

    let jitter_range = capped / 4;
    let offset = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..=jitter_range * 2)
    } else {
        0
    };

    Duration::from_millis((capped - jitter_range + offset).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grows_exponentially_within_jitter() {
        let initial = Duration::from_millis(400);
        let max = Duration::from_secs(60);

        for (attempt, base) in [(1u32, 400u64), (2, 800), (3, 1600), (4, 3200)] {
            let delay = backoff_delay(attempt, initial, max).as_millis() as u64;
            assert!(delay >= base - base / 4, "attempt {attempt}: {delay}");
            assert!(delay <= base + base / 4, "attempt {attempt}: {delay}");
        }
    }

    #[test]
    fn test_capped_at_max() {
        let max = Duration::from_secs(5);
        for attempt in [10, 20, u32::MAX] {
            assert!(backoff_delay(attempt, Duration::from_millis(500), max) <= max);
        }
    }

    #[test]
    fn test_zero_initial() {
        assert_eq!(
            backoff_delay(3, Duration::ZERO, Duration::from_secs(1)),
            Duration::ZERO
        );
    }
}
