//! Deposit records as produced by key generation tools.

use alloy_primitives::Bytes;
use serde::{de, Deserialize, Deserializer};

/// Length of a deposit data root.
pub(crate) const DATA_ROOT_LEN: usize = 32;

/// A single deposit intent.
///
/// Byte fields are decoded from hex strings (with or without `0x`) or JSON byte arrays. Fields
/// that are absent decode as empty; whether they are required is decided by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DepositRecord {
    /// Account label, informational only.
    #[serde(default)]
    pub account: String,

    /// Validator public key.
    #[serde(default, deserialize_with = "de_bytes")]
    pub pubkey: Bytes,

    #[serde(default, deserialize_with = "de_bytes")]
    pub withdrawal_credentials: Bytes,

    #[serde(default, deserialize_with = "de_bytes")]
    pub signature: Bytes,

    /// Hash tree root of the deposit data, either empty or 32 bytes.
    #[serde(default, deserialize_with = "de_data_root")]
    pub deposit_data_root: Bytes,

    /// Amount in gwei. Zero means the value is supplied externally.
    #[serde(default, alias = "amount", rename = "value", deserialize_with = "de_amount")]
    pub amount: u64,

    #[serde(default, deserialize_with = "de_bytes")]
    pub fork_version: Bytes,

    /// Deposit data format version.
    #[serde(default)]
    pub version: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytes {
    Hex(String),
    Array(Vec<u8>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(u64),
    Text(String),
}

fn de_bytes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
    match RawBytes::deserialize(deserializer)? {
        RawBytes::Hex(s) => {
            let s = s.trim();
            let s = s.strip_prefix("0x").unwrap_or(s);
            hex::decode(s)
                .map(Bytes::from)
                .map_err(|e| de::Error::custom(format!("invalid hex string: {e}")))
        }
        RawBytes::Array(bytes) => Ok(Bytes::from(bytes)),
    }
}

fn de_data_root<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
    let root = de_bytes(deserializer)?;
    if !root.is_empty() && root.len() != DATA_ROOT_LEN {
        return Err(de::Error::custom(format!(
            "deposit data root must be {DATA_ROOT_LEN} bytes, got {}",
            root.len()
        )));
    }
    Ok(root)
}

fn de_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match RawAmount::deserialize(deserializer)? {
        RawAmount::Number(n) => Ok(n),
        RawAmount::Text(s) => s
            .trim()
            .parse()
            .map_err(|e| de::Error::custom(format!("invalid amount '{s}': {e}"))),
    }
}
