//! Command transport
//!
//! Sends one command unit to a connected card with a per-attempt timeout and
//! bounded retries. Protocol-mismatch failures get a longer settle delay
//! before retry than other transient failures. Exhausting the retries
//! surfaces the last error unmodified; retryability policy beyond the
//! mismatch special case belongs to the classifier and higher layers.

use std::time::Duration;

use tracing::warn;

use crate::apdu::expected_response_len;
use crate::classify::is_protocol_mismatch;
use crate::config::ReaderConfig;
use crate::port::{CardChannel, ChannelError, ProtocolToken};

#[derive(Debug, Clone)]
pub struct CommandTransport {
    attempt_timeout: Duration,
    retries: u32,
    retry_delay: Duration,
    mismatch_delay: Duration,
}

impl CommandTransport {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            // Timeout floor keeps a small caller-set read timeout from
            // starving slow hardware.
            attempt_timeout: config.read_timeout.max(config.command_min_timeout),
            retries: config.command_retries,
            retry_delay: config.command_retry_delay,
            mismatch_delay: config.mismatch_retry_delay,
        }
    }

    /// Send one command and return the raw response bytes, status included.
    pub async fn send(
        &self,
        channel: &dyn CardChannel,
        protocol: ProtocolToken,
        command: &[u8],
    ) -> Result<Vec<u8>, ChannelError> {
        let expected = expected_response_len(command);
        let mut last_err = ChannelError::CommandTimeout;

        for attempt in 0..=self.retries {
            let outcome =
                tokio::time::timeout(self.attempt_timeout, channel.transmit(command, expected, protocol))
                    .await;

            let err = match outcome {
                Ok(Ok(response)) if response.is_empty() => ChannelError::EmptyResponse,
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(err)) => err,
                Err(_) => ChannelError::CommandTimeout,
            };

            if is_protocol_mismatch(&err.to_string()) {
                warn!(
                    attempt = attempt + 1,
                    total = self.retries + 1,
                    error = %err,
                    "protocol mismatch during command"
                );
                if attempt < self.retries {
                    tokio::time::sleep(self.mismatch_delay).await;
                }
            } else {
                warn!(
                    attempt = attempt + 1,
                    total = self.retries + 1,
                    error = %err,
                    "command failed"
                );
                if attempt < self.retries {
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
            last_err = err;
        }

        Err(last_err)
    }
}
