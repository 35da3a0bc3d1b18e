//! Connection negotiation
//!
//! Establishes a card connection by walking the share-mode preference order
//! with bounded, linearly-delayed retries per mode. A protocol mismatch
//! triggers a reset-and-cool-down recovery before the whole preference loop
//! runs again, a bounded number of times.

use std::time::Duration;

use tracing::{info, warn};

use crate::classify::is_protocol_mismatch;
use crate::config::ReaderConfig;
use crate::port::{CardChannel, ChannelError, LeavePolicy, ProtocolToken, ShareMode};

/// Outcome of negotiation; consumed immediately by the field reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionResult {
    pub connected: bool,
    pub protocol: Option<ProtocolToken>,
}

impl ConnectionResult {
    fn failed() -> Self {
        Self {
            connected: false,
            protocol: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionNegotiator {
    max_retries: u32,
    retry_delay_base: Duration,
    connect_timeout: Duration,
    recovery_attempts: u32,
    recovery_cooldown: Duration,
}

impl ConnectionNegotiator {
    pub fn new(config: &ReaderConfig) -> Self {
        Self {
            max_retries: config.max_connect_retries,
            retry_delay_base: config.retry_delay_base,
            connect_timeout: config.connect_timeout,
            recovery_attempts: config.mismatch_recovery_attempts,
            recovery_cooldown: config.mismatch_cooldown,
        }
    }

    /// Try every share mode with retries; on exhaustion caused by a protocol
    /// mismatch, reset the card, cool down and run the loop again. Returns a
    /// failed result only after every path is spent.
    pub async fn connect(&self, channel: &dyn CardChannel) -> ConnectionResult {
        let mut recovery = 0;
        loop {
            match self.try_all_modes(channel).await {
                Ok(protocol) => {
                    return ConnectionResult {
                        connected: true,
                        protocol: Some(protocol),
                    }
                }
                Err(last) => {
                    let mismatch = last
                        .as_ref()
                        .is_some_and(|err| is_protocol_mismatch(&err.to_string()));
                    if mismatch && recovery < self.recovery_attempts {
                        recovery += 1;
                        warn!(
                            recovery,
                            max = self.recovery_attempts,
                            "protocol mismatch exhausted all modes, resetting card"
                        );
                        let _ = channel.disconnect(LeavePolicy::Reset).await;
                        tokio::time::sleep(self.recovery_cooldown).await;
                        continue;
                    }
                    warn!("all connection modes and retries exhausted");
                    return ConnectionResult::failed();
                }
            }
        }
    }

    async fn try_all_modes(
        &self,
        channel: &dyn CardChannel,
    ) -> Result<ProtocolToken, Option<ChannelError>> {
        let mut last = None;
        for mode in ShareMode::PREFERENCE_ORDER {
            match self.try_mode(channel, mode).await {
                Ok(protocol) => return Ok(protocol),
                Err(err) => last = err.or(last),
            }
        }
        Err(last)
    }

    async fn try_mode(
        &self,
        channel: &dyn CardChannel,
        mode: ShareMode,
    ) -> Result<ProtocolToken, Option<ChannelError>> {
        let mut last = None;
        for retry in 0..self.max_retries {
            if retry > 0 {
                tokio::time::sleep(self.retry_delay_base * retry).await;
            }
            info!(
                ?mode,
                attempt = retry + 1,
                max = self.max_retries,
                "attempting card connection"
            );
            match tokio::time::timeout(self.connect_timeout, channel.connect(mode)).await {
                Ok(Ok(protocol)) => {
                    info!(?mode, "connected successfully");
                    return Ok(protocol);
                }
                Ok(Err(err)) => {
                    warn!(?mode, attempt = retry + 1, error = %err, "connection attempt failed");
                    last = Some(err);
                }
                Err(_) => {
                    warn!(?mode, attempt = retry + 1, "connection attempt timed out");
                    last = Some(ChannelError::ConnectTimeout);
                }
            }
        }
        Err(last)
    }
}
