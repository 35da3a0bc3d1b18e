//! Session error types and user-facing messages

use thiserror::Error;

use crate::port::ChannelError;
use thaiid_common::NormalizeError;

/// User-facing messages emitted over the session boundary.
pub mod messages {
    pub const CONNECTION_FAILED: &str =
        "Failed to connect to card after all attempts. Please remove and reinsert the card.";
    pub const TRANSACTION_FAILED: &str =
        "Card communication was lost. Please remove and reinsert the card.";
    pub const PROTOCOL_MISMATCH: &str =
        "Card protocol error. Please remove and reinsert the card.";
    pub const CARD_NOT_READY: &str = "Card is not ready yet. Please try again.";
    pub const INSERT_PROPERLY: &str = "Please insert the ID card properly";
    pub const UNSUPPORTED_CARD: &str = "Please use a valid Thai national ID card";
    pub const CARD_REMOVED: &str = "Card removed. Please reinsert and try again";
    pub const CITIZEN_ID_FAILED: &str = "Failed to read citizen ID";
}

/// Failure of one card-read session.
///
/// Never crosses the session boundary as-is; the session controller renders
/// it to a plain message string before emitting the error event.
#[derive(Debug, Error)]
pub enum CardError {
    /// Raw channel failure that escaped every retry layer.
    #[error("{0}")]
    Channel(#[from] ChannelError),

    /// Classification-confirmed fatal condition; carries the user message.
    #[error("{0}")]
    Classified(String),

    /// The citizen-ID read exhausted its dedicated retry budget.
    #[error("{}", messages::CITIZEN_ID_FAILED)]
    CitizenIdRead,

    /// A scalar field read failed; fatal to the session.
    #[error("failed to read {field}: {source}")]
    FieldRead {
        field: &'static str,
        source: ChannelError,
    },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Reader/driver layer failed to initialize; fatal, surfaced once.
    #[error("smart card service unavailable: {0}")]
    Hardware(String),
}
