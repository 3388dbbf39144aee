//! Exponential backoff with jitter for connection reconnect attempts (§4.6).
//!
//! Formula: `min(base * 2^attempt, cap)` with +/-25% uniform jitter.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base_ms: u64,
    pub cap_ms: u64,
    pub jitter_fraction: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 500,
            cap_ms: 30_000,
            jitter_fraction: 0.25,
        }
    }
}

/// Deterministic pseudo-random jitter source, avoids pulling in a `rand`
/// dependency for a single use site. Not cryptographic; seeded by the
/// attempt number so repeated calls with the same attempt are reproducible
/// in tests.
fn pseudo_rand(seed: u64) -> f64 {
    // Numerical-recipes LCG constants.
    let x = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    ((x >> 11) as f64) / ((1u64 << 53) as f64)
}

/// Compute the backoff delay for the given attempt (0-indexed).
pub fn next_backoff(attempt: u32, config: &BackoffConfig) -> Duration {
    let exp = 2f64.powi(attempt as i32);
    let base = (config.base_ms as f64 * exp).min(config.cap_ms as f64);

    let jitter_span = base * config.jitter_fraction;
    // rand in [0,1) -> offset in [-jitter_span, +jitter_span)
    let rand = pseudo_rand(attempt as u64);
    let offset = (rand * 2.0 - 1.0) * jitter_span;

    let delay_ms = (base + offset).max(0.0) as u64;
    Duration::from_millis(delay_ms)
}

pub async fn backoff_sleep(attempt: u32, config: &BackoffConfig) {
    tokio::time::sleep(next_backoff(attempt, config)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_within_jitter_bounds() {
        let config = BackoffConfig::default();
        for attempt in 0..10 {
            let delay = next_backoff(attempt, &config).as_millis() as f64;
            let base = (config.base_ms as f64 * 2f64.powi(attempt as i32)).min(config.cap_ms as f64);
            assert!(delay >= base * 0.75 - 1.0, "attempt {attempt}: {delay} below lower bound");
            assert!(delay <= base * 1.25 + 1.0, "attempt {attempt}: {delay} above upper bound");
        }
    }

    #[test]
    fn respects_cap() {
        let config = BackoffConfig::default();
        let delay = next_backoff(20, &config).as_millis() as u64;
        assert!(delay <= (config.cap_ms as f64 * 1.25) as u64);
    }

    #[test]
    fn is_nondecreasing_in_expectation() {
        let config = BackoffConfig {
            jitter_fraction: 0.0,
            ..BackoffConfig::default()
        };
        let d0 = next_backoff(0, &config);
        let d3 = next_backoff(3, &config);
        assert!(d3 > d0);
    }

    proptest::proptest! {
        /// For any attempt/base/cap/jitter combination, the delay always
        /// lands within the jittered envelope around `min(base*2^attempt, cap)`.
        #[test]
        fn delay_always_within_jitter_envelope(
            attempt in 0_u32..32,
            base_ms in 1_u64..5_000,
            cap_ms in 1_u64..120_000,
            jitter_fraction in 0.0_f64..0.9,
        ) {
            let config = BackoffConfig { base_ms, cap_ms, jitter_fraction };
            let delay = next_backoff(attempt, &config).as_millis() as f64;
            let base = (base_ms as f64 * 2f64.powi(attempt as i32)).min(cap_ms as f64);
            let lower = (base * (1.0 - jitter_fraction) - 1.0).max(0.0);
            let upper = base * (1.0 + jitter_fraction) + 1.0;
            proptest::prop_assert!(delay >= lower, "{delay} below {lower}");
            proptest::prop_assert!(delay <= upper, "{delay} above {upper}");
        }

        /// The delay never exceeds the cap by more than the jitter span,
        /// regardless of how large `attempt` grows.
        #[test]
        fn delay_never_exceeds_jittered_cap(
            attempt in 0_u32..10_000,
            cap_ms in 1_u64..60_000,
        ) {
            let config = BackoffConfig { base_ms: 500, cap_ms, jitter_fraction: 0.25 };
            let delay = next_backoff(attempt, &config).as_millis() as u64;
            proptest::prop_assert!(delay <= (cap_ms as f64 * 1.25) as u64 + 1);
        }
    }
}
