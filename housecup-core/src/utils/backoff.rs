use std::time::Duration;

const BASE_DELAY_MS: u64 = 500;
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Wait before retrying after `failures` consecutive storage failures.
///
/// Doubles from 500ms and is capped at 30s. Zero failures means no wait.
pub fn storage_backoff(failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let factor = 2u64.saturating_pow(failures - 1);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(factor)).min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backoff() {
        assert_eq!(storage_backoff(0), Duration::ZERO);
        assert_eq!(storage_backoff(1), Duration::from_millis(500));
        assert_eq!(storage_backoff(2), Duration::from_secs(1));
        assert_eq!(storage_backoff(3), Duration::from_secs(2));
        assert_eq!(storage_backoff(6), Duration::from_secs(16));
        // Capped from here on
        assert_eq!(storage_backoff(7), Duration::from_secs(30));
        assert_eq!(storage_backoff(64), Duration::from_secs(30));
        assert_eq!(storage_backoff(u32::MAX), Duration::from_secs(30));
    }
}
