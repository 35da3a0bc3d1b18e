//! Hardware port abstraction
//!
//! The protocol core talks to the reader driver exclusively through
//! [`CardChannel`] plus a stream of [`ReaderEvent`]s, so the whole session
//! logic can run against a deterministic scripted fake in tests. The PC/SC
//! implementation lives in [`crate::hardware`].

use async_trait::async_trait;
use thiserror::Error;

/// Exclusivity level requested when connecting to a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    Shared,
    Exclusive,
    Direct,
}

impl ShareMode {
    /// Negotiation preference order, most permissive first.
    pub const PREFERENCE_ORDER: [ShareMode; 3] =
        [ShareMode::Shared, ShareMode::Exclusive, ShareMode::Direct];
}

/// What to do with the card when releasing the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeavePolicy {
    /// Leave the card powered as-is.
    Leave,
    /// Reset the card, forcing a fresh protocol negotiation on reconnect.
    Reset,
}

/// Opaque token identifying the protocol negotiated at connect time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolToken(pub(crate) u8);

impl ProtocolToken {
    pub const T0: ProtocolToken = ProtocolToken(0);
    pub const T1: ProtocolToken = ProtocolToken(1);
    pub const RAW: ProtocolToken = ProtocolToken(2);
    /// Direct-mode connections carry no negotiated protocol.
    pub const UNDEFINED: ProtocolToken = ProtocolToken(0xFF);
}

/// A presence transition on one physical reader slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderEvent {
    pub reader: String,
    pub present: bool,
}

/// Failures surfaced by a channel operation.
///
/// Driver errors keep their raw text (including the SCARD hex code when
/// known) so the error classifier can work on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("{0}")]
    Hardware(String),
    #[error("Connection timeout")]
    ConnectTimeout,
    #[error("Command timeout")]
    CommandTimeout,
    #[error("Transmission successful but no response data received")]
    EmptyResponse,
    #[error("Selector response too short to carry a length byte")]
    ShortResponse,
    #[error("Card answered with error status {0}")]
    ErrorStatus(String),
}

/// One connected card behind one reader slot.
///
/// All operations are suspension points; timeouts are enforced by the
/// callers ([`crate::negotiate`], [`crate::transport`]), not here.
#[async_trait]
pub trait CardChannel: Send + Sync {
    /// Establish a connection under the given share mode.
    async fn connect(&self, mode: ShareMode) -> Result<ProtocolToken, ChannelError>;

    /// Send one command unit and return the raw response bytes, status word
    /// included. `expected_len` sizes the response buffer.
    async fn transmit(
        &self,
        command: &[u8],
        expected_len: usize,
        protocol: ProtocolToken,
    ) -> Result<Vec<u8>, ChannelError>;

    /// Release the connection. Safe to call when not connected.
    async fn disconnect(&self, policy: LeavePolicy) -> Result<(), ChannelError>;
}
