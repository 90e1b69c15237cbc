//! Addressed message envelope.

use crate::error::Result;
use crate::fields::{FieldValues, FieldValuesExt};
use crate::message::Message;

pub const FROM_FIELD: &str = "from";
pub const TO_FIELD: &str = "to";
pub const CHANNEL_FIELD: &str = "channel";
pub const TYPE_FIELD: &str = "type";

/// A message together with its sender, recipient and channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: String,
    pub to: String,
    pub channel: String,
    pub message: Message,
}

impl Envelope {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        channel: impl Into<String>,
        message: Message,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            channel: channel.into(),
            message,
        }
    }

    /// Encodes the envelope as a single flat field list.
    pub fn encode(&self) -> FieldValues {
        let mut fvs: FieldValues = vec![
            (FROM_FIELD.to_string(), self.from.clone()),
            (TO_FIELD.to_string(), self.to.clone()),
            (CHANNEL_FIELD.to_string(), self.channel.clone()),
            (TYPE_FIELD.to_string(), self.message.kind().code().to_string()),
        ];
        fvs.extend(self.message.to_fields());
        fvs
    }

    /// Decodes a flat field list produced by [`Envelope::encode`].
    pub fn decode(fvs: &FieldValues) -> Result<Self> {
        let from = fvs.require(FROM_FIELD)?.to_string();
        let to = fvs.require(TO_FIELD)?.to_string();
        let channel = fvs.require(CHANNEL_FIELD)?.to_string();
        let message = Message::from_raw(fvs.require(TYPE_FIELD)?, fvs)?;
        Ok(Self {
            from,
            to,
            channel,
            message,
        })
    }
}
