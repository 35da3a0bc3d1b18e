//! Structured card data produced by a completed read

use serde::{Deserialize, Serialize};

use crate::address::AddressComponents;

/// Cardholder gender, derived from the card's raw gender code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Map the card's raw gender field ("1" = male, anything else = female).
    pub fn from_card_code(code: &str) -> Self {
        if code.trim() == "1" {
            Gender::Male
        } else {
            Gender::Female
        }
    }
}

/// The final structured output of one card read.
///
/// Plain data with no live resource references, safe to serialize across a
/// process or network boundary. All date fields are Gregorian `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub citizen_id: String,
    pub title_th: String,
    pub first_name_th: String,
    pub last_name_th: String,
    pub full_name_th: String,
    pub title_en: String,
    pub first_name_en: String,
    pub last_name_en: String,
    pub full_name_en: String,
    pub gender: Gender,
    pub card_issuer: String,
    pub date_of_birth: String,
    pub issue_date: String,
    pub expire_date: String,
    pub address: String,
    #[serde(flatten)]
    pub address_components: AddressComponents,
    /// Photo as a `data:image/jpeg;base64,` URI. Empty payload if every
    /// segment read failed.
    pub photo_as_base64_uri: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_from_card_code() {
        assert_eq!(Gender::from_card_code("1"), Gender::Male);
        assert_eq!(Gender::from_card_code("2"), Gender::Female);
        assert_eq!(Gender::from_card_code(""), Gender::Female);
    }

    #[test]
    fn gender_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Gender::Male).unwrap(), "\"male\"");
        assert_eq!(
            serde_json::to_string(&Gender::Female).unwrap(),
            "\"female\""
        );
    }
}
