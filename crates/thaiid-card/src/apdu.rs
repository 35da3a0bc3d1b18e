//! APDU (Application Protocol Data Unit) command handling
//!
//! The Thai national ID applet exposes every field through the same
//! two-step pattern: a selector command (`80 B0 offset 02 00 len`) answered
//! with a length byte, then a GET RESPONSE carrying the payload.

/// APDU response split into payload and status word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response data (without status word)
    pub data: Vec<u8>,
    /// Status word SW1
    pub sw1: u8,
    /// Status word SW2
    pub sw2: u8,
}

impl ApduResponse {
    /// Split a raw response, stripping the trailing 2-byte status exactly
    /// once. `None` if the response is too short to carry a status word.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < 2 {
            return None;
        }
        Some(Self {
            data: raw[..raw.len() - 2].to_vec(),
            sw1: raw[raw.len() - 2],
            sw2: raw[raw.len() - 1],
        })
    }

    /// Check if the response indicates success (9000)
    pub fn is_success(&self) -> bool {
        self.sw1 == 0x90 && self.sw2 == 0x00
    }

    /// Get status word as hex string (e.g., "9000")
    pub fn status_string(&self) -> String {
        format!("{:02X}{:02X}", self.sw1, self.sw2)
    }
}

/// Expected raw response length for a command: the trailing length byte of
/// the command plus the 2-byte status word.
pub fn expected_response_len(command: &[u8]) -> usize {
    command.last().map(|le| *le as usize).unwrap_or(0) + 2
}

/// Static command table for the Thai national ID applet.
pub mod commands {
    /// SELECT the Thai ID application (AID A0 00 00 00 54 48 00 01).
    pub const SELECT: &[u8] = &[
        0x00, 0xA4, 0x04, 0x00, 0x08, 0xA0, 0x00, 0x00, 0x00, 0x54, 0x48, 0x00, 0x01,
    ];

    /// GET RESPONSE prefix; append the length byte returned by a selector.
    pub const GET_RESPONSE: &[u8] = &[0x00, 0xC0, 0x00, 0x00];

    pub const CITIZEN_ID: &[u8] = &[0x80, 0xB0, 0x00, 0x04, 0x02, 0x00, 0x0D];
    pub const FULL_NAME_TH: &[u8] = &[0x80, 0xB0, 0x00, 0x11, 0x02, 0x00, 0x64];
    pub const FULL_NAME_EN: &[u8] = &[0x80, 0xB0, 0x00, 0x75, 0x02, 0x00, 0x64];
    pub const DATE_OF_BIRTH: &[u8] = &[0x80, 0xB0, 0x00, 0xD9, 0x02, 0x00, 0x08];
    pub const GENDER: &[u8] = &[0x80, 0xB0, 0x00, 0xE1, 0x02, 0x00, 0x01];
    pub const CARD_ISSUER: &[u8] = &[0x80, 0xB0, 0x00, 0xF6, 0x02, 0x00, 0x64];
    pub const ISSUE_DATE: &[u8] = &[0x80, 0xB0, 0x01, 0x67, 0x02, 0x00, 0x08];
    pub const EXPIRE_DATE: &[u8] = &[0x80, 0xB0, 0x01, 0x6F, 0x02, 0x00, 0x08];
    pub const ADDRESS: &[u8] = &[0x80, 0xB0, 0x15, 0x79, 0x02, 0x00, 0x64];

    /// Number of fixed photo segments on the card.
    pub const PHOTO_SEGMENT_COUNT: usize = 20;

    /// Build the GET RESPONSE command for a selector-announced length.
    pub fn get_response(length: u8) -> Vec<u8> {
        let mut command = GET_RESPONSE.to_vec();
        command.push(length);
        command
    }

    /// Selector for photo segment `index` (0-based). Segments sit at
    /// consecutive 0xFF-sized offsets starting at 0x017B.
    pub fn photo_segment(index: usize) -> [u8; 7] {
        debug_assert!(index < PHOTO_SEGMENT_COUNT);
        let n = (index + 1) as u8;
        [0x80, 0xB0, n, 0x7C - n, 0x02, 0x00, 0xFF]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_status_word_exactly_once() {
        let response = ApduResponse::parse(&[0x01, 0x02, 0x90, 0x00]).unwrap();
        assert_eq!(response.data, vec![0x01, 0x02]);
        assert!(response.is_success());
        assert_eq!(response.status_string(), "9000");
    }

    #[test]
    fn parse_keeps_embedded_status_like_bytes_in_payload() {
        // 90 00 inside the payload must survive; only the trailing pair goes.
        let response = ApduResponse::parse(&[0x90, 0x00, 0xAA, 0x90, 0x00]).unwrap();
        assert_eq!(response.data, vec![0x90, 0x00, 0xAA]);
    }

    #[test]
    fn parse_rejects_short_responses() {
        assert!(ApduResponse::parse(&[0x90]).is_none());
        assert!(ApduResponse::parse(&[]).is_none());
    }

    #[test]
    fn status_only_response_has_empty_payload() {
        let response = ApduResponse::parse(&[0x61, 0x0D]).unwrap();
        assert!(response.data.is_empty());
        assert!(!response.is_success());
    }

    #[test]
    fn get_response_appends_length_byte() {
        assert_eq!(commands::get_response(0x0D), vec![0x00, 0xC0, 0x00, 0x00, 0x0D]);
    }

    #[test]
    fn expected_length_is_trailing_byte_plus_status() {
        assert_eq!(expected_response_len(commands::CITIZEN_ID), 0x0D + 2);
        assert_eq!(expected_response_len(&commands::get_response(0x64)), 0x64 + 2);
    }

    #[test]
    fn photo_segments_walk_consecutive_offsets() {
        assert_eq!(
            commands::photo_segment(0),
            [0x80, 0xB0, 0x01, 0x7B, 0x02, 0x00, 0xFF]
        );
        assert_eq!(
            commands::photo_segment(1),
            [0x80, 0xB0, 0x02, 0x7A, 0x02, 0x00, 0xFF]
        );
        assert_eq!(
            commands::photo_segment(commands::PHOTO_SEGMENT_COUNT - 1),
            [0x80, 0xB0, 0x14, 0x68, 0x02, 0x00, 0xFF]
        );
    }
}
