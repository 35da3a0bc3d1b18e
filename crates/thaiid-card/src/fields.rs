//! Field extraction pipeline
//!
//! Drives the command transport through the Thai ID applet's select and
//! per-field read sequence. Each scalar field is a selector command followed
//! by a GET RESPONSE sized by the selector's returned length byte; payloads
//! are decoded from the card's legacy 8-bit Thai codepage (TIS-620, read via
//! the windows-874 superset). The photo is reassembled from fixed segments,
//! tolerating per-segment loss.

use encoding_rs::WINDOWS_874;
use tracing::{debug, info, warn};

use crate::apdu::{commands, ApduResponse};
use crate::classify::retry_with_backoff;
use crate::config::ReaderConfig;
use crate::error::CardError;
use crate::port::{CardChannel, ChannelError, ProtocolToken};
use crate::transport::CommandTransport;
use thaiid_common::{CardRecord, RawCardFields};

pub struct FieldReader<'a> {
    channel: &'a dyn CardChannel,
    protocol: ProtocolToken,
    transport: CommandTransport,
    config: &'a ReaderConfig,
}

impl<'a> FieldReader<'a> {
    pub fn new(channel: &'a dyn CardChannel, protocol: ProtocolToken, config: &'a ReaderConfig) -> Self {
        Self {
            channel,
            protocol,
            transport: CommandTransport::new(config),
            config,
        }
    }

    /// Run the full read sequence and assemble the normalized record.
    ///
    /// Field order is fixed: each GET RESPONSE depends on the length byte of
    /// the selector immediately before it, so reads never interleave.
    pub async fn read(&self) -> Result<CardRecord, CardError> {
        info!("selecting card application");
        self.transport
            .send(self.channel, self.protocol, commands::SELECT)
            .await
            .map_err(|source| CardError::FieldRead {
                field: "card application",
                source,
            })?;
        info!("card application selected");

        // The citizen ID is the field most prone to lost transactions; it
        // gets its own backoff budget and a dedicated fatal message.
        let citizen_id = retry_with_backoff(
            || self.read_text(commands::CITIZEN_ID),
            self.config.citizen_id_retries,
            self.config.transaction_retry_delay,
        )
        .await
        .map_err(|err| {
            warn!(error = %err, "citizen ID read exhausted its retry budget");
            CardError::CitizenIdRead
        })?;
        info!("citizen ID read successfully");

        let full_name_th = self.read_scalar(commands::FULL_NAME_TH, "Thai name").await?;
        let full_name_en = self.read_scalar(commands::FULL_NAME_EN, "English name").await?;
        let gender = self.read_scalar(commands::GENDER, "gender").await?;
        let card_issuer = self.read_scalar(commands::CARD_ISSUER, "card issuer").await?;
        let date_of_birth = self.read_scalar(commands::DATE_OF_BIRTH, "birth date").await?;
        let issue_date = self.read_scalar(commands::ISSUE_DATE, "issue date").await?;
        let expire_date = self.read_scalar(commands::EXPIRE_DATE, "expiry date").await?;
        let address = self.read_scalar(commands::ADDRESS, "address").await?;

        info!("reading photo data");
        let mut photo = Vec::new();
        for index in 0..commands::PHOTO_SEGMENT_COUNT {
            match self.read_field(&commands::photo_segment(index)).await {
                Ok(segment) => {
                    debug!(
                        segment = index + 1,
                        total = commands::PHOTO_SEGMENT_COUNT,
                        bytes = segment.len(),
                        "photo segment read"
                    );
                    photo.extend_from_slice(&segment);
                }
                Err(err) => {
                    // Partial photos are acceptable; keep whatever segments
                    // survive, in order.
                    warn!(
                        segment = index + 1,
                        total = commands::PHOTO_SEGMENT_COUNT,
                        error = %err,
                        "failed to read photo segment, skipping"
                    );
                }
            }
        }

        let raw = RawCardFields {
            citizen_id,
            full_name_th,
            full_name_en,
            gender,
            card_issuer,
            date_of_birth,
            issue_date,
            expire_date,
            address,
            photo,
        };
        Ok(raw.into_record()?)
    }

    async fn read_scalar(
        &self,
        selector: &[u8],
        field: &'static str,
    ) -> Result<String, CardError> {
        self.read_text(selector)
            .await
            .map_err(|source| CardError::FieldRead { field, source })
    }

    async fn read_text(&self, selector: &[u8]) -> Result<String, ChannelError> {
        let payload = self.read_field(selector).await?;
        let (decoded, _, _) = WINDOWS_874.decode(&payload);
        Ok(decoded.into_owned())
    }

    /// Selector then GET RESPONSE; returns the payload with the trailing
    /// status word stripped. Any status other than 9000 is a failure.
    async fn read_field(&self, selector: &[u8]) -> Result<Vec<u8>, ChannelError> {
        let head = self
            .transport
            .send(self.channel, self.protocol, selector)
            .await?;
        let length = head.get(1).copied().ok_or(ChannelError::ShortResponse)?;

        let raw = self
            .transport
            .send(self.channel, self.protocol, &commands::get_response(length))
            .await?;
        let response = ApduResponse::parse(&raw).ok_or(ChannelError::ShortResponse)?;
        if !response.is_success() {
            return Err(ChannelError::ErrorStatus(response.status_string()));
        }
        Ok(response.data)
    }
}
