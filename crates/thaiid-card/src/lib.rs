//! Thai ID Card - Smart card session protocol and field extraction
//!
//! This crate drives Thai national ID cards over PC/SC readers: it watches
//! readers for card insertion, negotiates a connection mode and protocol,
//! reads every card field over the APDU transport, and assembles the
//! normalized record from `thaiid-common`.

pub mod apdu;
pub mod classify;
pub mod config;
pub mod error;
pub mod fields;
pub mod hardware;
pub mod negotiate;
pub mod port;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::ReaderConfig;
pub use error::CardError;
pub use hardware::PcscHub;
pub use port::{CardChannel, ChannelError, LeavePolicy, ProtocolToken, ReaderEvent, ShareMode};
pub use session::{SessionOutcome, ThaiIdReader};

/// Re-export of the record types callers receive.
pub use thaiid_common::{CardRecord, Gender};
