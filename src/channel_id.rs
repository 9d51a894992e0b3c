use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Debug, Display};
use std::str::FromStr;
use thiserror::Error;

/// The number of bytes in a channel identifier.
pub const CHANNEL_ID_LEN: usize = 32;

/// The unique identifier for a payment channel.
///
/// Channel IDs are assigned at creation by the session-negotiation layer (a 32-byte digest over
/// the channel's opening parameters) and are opaque here. The canonical text form is `0x`
/// followed by 64 lowercase hex characters; parsing accepts mixed case and normalizes on output.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelId([u8; CHANNEL_ID_LEN]);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid channel id: {0}")]
pub struct ChannelIdError(String);

impl ChannelIdError {
    pub fn new(msg: impl Into<String>) -> Self {
        ChannelIdError(msg.into())
    }
}

impl ChannelId {
    pub fn from_bytes(bytes: [u8; CHANNEL_ID_LEN]) -> Self {
        ChannelId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CHANNEL_ID_LEN] {
        &self.0
    }

    /// Parses a channel ID from its `0x`-prefixed hex form.
    pub fn from_hex(value: &str) -> Result<Self, ChannelIdError> {
        let digits = value
            .strip_prefix("0x")
            .ok_or_else(|| ChannelIdError::new(format!("'{value}' does not start with 0x")))?;
        if digits.len() != 2 * CHANNEL_ID_LEN {
            return Err(ChannelIdError::new(format!(
                "expected {} hex characters, got {}",
                2 * CHANNEL_ID_LEN,
                digits.len()
            )));
        }
        let mut bytes = [0u8; CHANNEL_ID_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|e| ChannelIdError::new(format!("invalid hex: {e}")))?;
        Ok(ChannelId(bytes))
    }

    /// Returns the canonical `0x`-prefixed lowercase hex form (66 characters).
    pub fn as_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_hex())
    }
}

impl Debug for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChannelId({})", self.as_hex())
    }
}

impl FromStr for ChannelId {
    type Err = ChannelIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelId::from_hex(s)
    }
}

impl Serialize for ChannelId {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.as_hex().serialize(s)
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(de)?;
        ChannelId::from_hex(&value).map_err(serde::de::Error::custom)
    }
}
