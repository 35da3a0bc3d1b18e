//! Thai ID Common - Shared data structures and normalization utilities
//!
//! This crate holds the plain-data output types produced by a card read and
//! the pure normalization steps that turn raw card payloads into them:
//! legacy delimiter cleanup, packed-name splitting, Buddhist-to-Gregorian
//! date conversion and Thai address decomposition.

pub mod address;
pub mod dates;
pub mod normalize;
pub mod record;

pub use address::AddressComponents;
pub use normalize::{remove_junk, NormalizeError, RawCardFields};
pub use record::{CardRecord, Gender};
