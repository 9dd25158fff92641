pub mod ack;
pub mod admin;
pub mod delegation;
pub mod deposit;
pub mod intent;
pub mod lsm;
pub mod memo;
pub mod msg;
pub mod rates;
pub mod rebalance;
pub mod records;
pub mod validator;
pub mod withdrawal;

pub use num::Decimal;

pub type Address = String;
pub type Epoch = u64;
/// Unix timestamp in seconds
pub type Timestamp = u64;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "amount_str")]
    pub amount: u128,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("arithmetic overflow")]
pub struct OverflowError;

impl From<num::OverflowError> for OverflowError {
    fn from(_: num::OverflowError) -> Self {
        Self
    }
}

/// Sum a sequence of amounts, failing on overflow
pub fn checked_sum(amounts: impl IntoIterator<Item = u128>) -> Result<u128, OverflowError> {
    amounts
        .into_iter()
        .try_fold(0u128, |acc, x| acc.checked_add(x))
        .ok_or(OverflowError)
}

/// Hex encoded sha256 of the given parts, joined by '/'
pub fn derive_hash(parts: &[&str]) -> String {
    let preimage = parts.join("/");

    hex::encode(hmac_sha256::Hash::hash(preimage.as_bytes()))
}

/// Amounts are stored and transmitted as decimal strings, in line with the cosmos convention
pub mod amount_str {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;

        s.parse().map_err(de::Error::custom)
    }
}
