//! Raw-field normalization and record assembly
//!
//! Card text fields arrive TIS-620-decoded but still carry the card's `#`
//! delimiter padding. Full names are packed as `title#first#middle#last`;
//! the middle token is unused on national ID cards.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::AddressComponents;
use crate::dates::{buddhist_to_gregorian, DateError};
use crate::record::{CardRecord, Gender};

/// Prefix for the assembled photo data URI.
pub const PHOTO_URI_PREFIX: &str = "data:image/jpeg;base64,";

const NAME_DELIMITER: char = '#';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("invalid {field} on card: {source}")]
    BadDate {
        field: &'static str,
        source: DateError,
    },
}

/// Decoded-but-unnormalized field values straight off the card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCardFields {
    pub citizen_id: String,
    pub full_name_th: String,
    pub full_name_en: String,
    pub gender: String,
    pub card_issuer: String,
    pub date_of_birth: String,
    pub issue_date: String,
    pub expire_date: String,
    pub address: String,
    pub photo: Vec<u8>,
}

/// Replace delimiter placeholders with spaces, collapse whitespace runs to a
/// single space and trim one trailing space.
pub fn remove_junk(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    for ch in raw.chars() {
        let ch = if ch == NAME_DELIMITER { ' ' } else { ch };
        if ch.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Split a packed full name on the card delimiter into (title, first, last).
///
/// Token layout on the card is `title#first#middle#last`; tokens 0, 1 and 3
/// feed the record. Missing tokens yield empty strings.
fn split_packed_name(full: &str) -> (String, String, String) {
    let parts: Vec<&str> = full.split(NAME_DELIMITER).collect();
    let token = |index: usize| remove_junk(parts.get(index).copied().unwrap_or(""));
    (token(0), token(1), token(3))
}

impl RawCardFields {
    /// Assemble the final record: name splitting, junk removal, gender and
    /// date mapping, address decomposition and photo encoding.
    pub fn into_record(self) -> Result<CardRecord, NormalizeError> {
        let (title_th, first_name_th, last_name_th) = split_packed_name(&self.full_name_th);
        let (title_en, first_name_en, last_name_en) = split_packed_name(&self.full_name_en);

        let date_of_birth = convert_date(&self.date_of_birth, "birth date")?;
        let issue_date = convert_date(&self.issue_date, "issue date")?;
        let expire_date = convert_date(&self.expire_date, "expiry date")?;

        let address = remove_junk(&self.address);
        let address_components = AddressComponents::parse(&address);

        Ok(CardRecord {
            citizen_id: self.citizen_id,
            full_name_th: remove_junk(&self.full_name_th),
            full_name_en: remove_junk(&self.full_name_en),
            title_th,
            first_name_th,
            last_name_th,
            title_en,
            first_name_en,
            last_name_en,
            gender: Gender::from_card_code(&self.gender),
            card_issuer: remove_junk(&self.card_issuer),
            date_of_birth,
            issue_date,
            expire_date,
            address,
            address_components,
            photo_as_base64_uri: format!("{}{}", PHOTO_URI_PREFIX, BASE64.encode(&self.photo)),
        })
    }
}

fn convert_date(raw: &str, field: &'static str) -> Result<String, NormalizeError> {
    buddhist_to_gregorian(raw).map_err(|source| NormalizeError::BadDate { field, source })
}
