//! Reader configuration
//!
//! Every timeout, retry count and backoff base used by the session lives in
//! one explicit struct passed into each component at construction, so tests
//! can override them per case instead of relying on ambient constants.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Per-command transmit timeout.
    pub read_timeout: Duration,
    /// Debounce between the card-present transition and the read cycle.
    pub insert_delay: Duration,
    /// Hard timeout for a single connection attempt.
    pub connect_timeout: Duration,
    /// Connection attempts per share mode.
    pub max_connect_retries: u32,
    /// Linear delay base between connection attempts.
    pub retry_delay_base: Duration,
    /// Floor applied to `read_timeout` so slow hardware is never starved.
    pub command_min_timeout: Duration,
    /// Transmit retries after the first attempt.
    pub command_retries: u32,
    /// Delay before retrying a transient transmit failure.
    pub command_retry_delay: Duration,
    /// Longer delay before retrying after a protocol mismatch, giving the
    /// card time to settle.
    pub mismatch_retry_delay: Duration,
    /// Full mode-preference loops allowed after protocol-mismatch recovery.
    pub mismatch_recovery_attempts: u32,
    /// Cool-down after the recovery disconnect.
    pub mismatch_cooldown: Duration,
    /// Backoff retry budget dedicated to the citizen-ID read.
    pub citizen_id_retries: u32,
    /// Backoff base delay for lost-transaction retries.
    pub transaction_retry_delay: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(15),
            insert_delay: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(5),
            max_connect_retries: 3,
            retry_delay_base: Duration::from_secs(1),
            command_min_timeout: Duration::from_secs(3),
            command_retries: 2,
            command_retry_delay: Duration::from_millis(500),
            mismatch_retry_delay: Duration::from_secs(2),
            mismatch_recovery_attempts: 2,
            mismatch_cooldown: Duration::from_secs(1),
            citizen_id_retries: 3,
            transaction_retry_delay: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
impl ReaderConfig {
    /// Defaults with all artificial delays zeroed, for tests that count
    /// attempts rather than exercise timing.
    pub(crate) fn fast() -> Self {
        Self {
            insert_delay: Duration::ZERO,
            retry_delay_base: Duration::ZERO,
            command_retry_delay: Duration::ZERO,
            mismatch_retry_delay: Duration::ZERO,
            mismatch_cooldown: Duration::ZERO,
            transaction_retry_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}
