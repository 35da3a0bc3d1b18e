//! Thai address decomposition
//!
//! Card addresses are a single line like
//! `123/45 หมู่ 8 ตำบลบางใหญ่ อำเภอบางใหญ่`. Four substructures are extracted
//! independently; any marker that is absent yields an empty string.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HOUSE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+/?\d*)").unwrap());
static VILLAGE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"หมู่\s*(\d+)").unwrap());
static TAMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"ตำบล([^\s]+)").unwrap());
static AMPHUR: Lazy<Regex> = Lazy::new(|| Regex::new(r"อำเภอ([^\s]+)").unwrap());

/// Address substructures extracted from the card's address line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressComponents {
    /// Leading house number, optionally with a `/sub-number` suffix.
    pub house_number: String,
    /// Village (หมู่) number, digits only.
    pub village_number: String,
    /// Sub-district, including the `ตำบล` marker.
    pub tambol: String,
    /// District, including the `อำเภอ` marker.
    pub amphur: String,
}

impl AddressComponents {
    pub fn parse(address: &str) -> Self {
        Self {
            house_number: capture(&HOUSE_NUMBER, address),
            village_number: capture(&VILLAGE_NUMBER, address),
            tambol: TAMBOL
                .captures(address)
                .map(|c| format!("ตำบล{}", &c[1]))
                .unwrap_or_default(),
            amphur: AMPHUR
                .captures(address)
                .map(|c| format!("อำเภอ{}", &c[1]))
                .unwrap_or_default(),
        }
    }
}

fn capture(re: &Regex, haystack: &str) -> String {
    re.captures(haystack)
        .map(|c| c[1].to_string())
        .unwrap_or_default()
}
