//! Retry budgets for the polling loops.

/// Bounded iteration counts standing in for timeouts, one per operation
/// class so tests can inject small bounds. Retry counts are a proxy for a
/// deadline and must be treated as approximate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdConfig {
    /// Filler bytes clocked while polling for an R1 response.
    pub command_attempts: u32,
    /// Iterations of the CMD55 + ACMD41 loop during bring-up.
    pub init_attempts: u32,
    /// Filler bytes clocked while waiting for the start-of-block token.
    pub read_token_attempts: u32,
    /// Filler bytes clocked while the card reports busy after a write.
    pub write_busy_attempts: u32,
    /// Wait between v2 bring-up attempts, in milliseconds.
    pub v2_retry_wait_ms: u32,
}

impl Default for SdConfig {
    fn default() -> Self {
        SdConfig {
            command_attempts: 5000,
            init_attempts: 5000,
            read_token_attempts: 100_000,
            write_busy_attempts: 500_000,
            v2_retry_wait_ms: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_budgets_are_nonzero() {
        let cfg = SdConfig::default();
        assert!(cfg.command_attempts > 0);
        assert!(cfg.init_attempts > 0);
        assert!(cfg.read_token_attempts > 0);
        assert!(cfg.write_busy_attempts > 0);
    }
}
