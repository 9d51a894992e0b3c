use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// A non-negative token amount in the asset's smallest unit.
///
/// Amounts travel as decimal strings because they routinely exceed the integer
/// precision of an f64; internally they are a `u128`, which is wide enough for
/// every token amount the settlement networks produce in practice. Arithmetic
/// is checked only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokenAmount {
    amount: u128,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("'{0}' is not an unsigned decimal string")]
    NotDecimal(String),
    #[error("'{0}' does not fit into 128 bits")]
    Overflow(String),
}

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount { amount: 0 };

    /// Creates a new `TokenAmount` from a value in the asset's smallest unit.
    pub fn from_raw(amount: u128) -> Self {
        TokenAmount { amount }
    }

    pub fn to_raw(&self) -> u128 {
        self.amount
    }

    /// Parses a `TokenAmount` from a decimal string.
    ///
    /// Only ASCII digits are accepted. Signs, whitespace, decimal points and
    /// empty strings are rejected rather than coerced.
    pub fn from_decimal(value: &str) -> Result<Self, AmountError> {
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::NotDecimal(value.into()));
        }
        let amount = value.parse::<u128>().map_err(|_| AmountError::Overflow(value.into()))?;
        Ok(TokenAmount { amount })
    }

    pub fn to_decimal(&self) -> String {
        self.amount.to_string()
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn checked_add(&self, other: TokenAmount) -> Option<TokenAmount> {
        self.amount.checked_add(other.amount).map(TokenAmount::from_raw)
    }

    pub fn checked_sub(&self, other: TokenAmount) -> Option<TokenAmount> {
        self.amount.checked_sub(other.amount).map(TokenAmount::from_raw)
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.amount)
    }
}

impl FromStr for TokenAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenAmount::from_decimal(s)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S>(&self, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_decimal().serialize(s)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(de: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(de)?;
        TokenAmount::from_decimal(&value).map_err(serde::de::Error::custom)
    }
}
