//! Error types for deposit resolution, validation and submission.
//!
//! Every message ends with what the user can do about it. Where a violation can be
//! overridden the message names the flag, so the override is discoverable from the error
//! text alone.

use std::fmt;

use alloy_primitives::{Address, Bytes, U256};
use thiserror::Error;

use crate::constants::WEI_PER_GWEI;

/// Errors raised while resolving a deposit contract or processing deposit records.
#[derive(Debug, Error)]
pub enum DepositError {
    #[error("one of --address or --network is required to select the deposit contract")]
    MissingTarget,

    #[error(
        "address {address} does not match a known deposit contract on chain {chain_id}. \
         You are either running an old version of this tool, sending to the wrong network or \
         sending to a custom contract. If you are completely sure you know what you are doing \
         use --allow-unknown-contract to send to this address anyway"
    )]
    UnknownContract { address: Address, chain_id: u64 },

    #[error(
        "unknown deposit network '{0}'. Run the `networks` command to list known networks, or \
         supply --address together with --allow-unknown-contract"
    )]
    UnknownNetwork(String),

    #[error("malformed deposit data: {0}. Supply the JSON produced by the key generation tool")]
    MalformedInput(String),

    #[error("no deposit information supplied")]
    EmptyInput,

    #[error("deposit {index}: no {field}. Regenerate the deposit data; this cannot be overridden")]
    MissingField { index: usize, field: DepositField },

    #[error(
        "deposit {index}: deposit data root is {len} bytes, expected 32. Regenerate the deposit \
         data; this cannot be overridden"
    )]
    InvalidDataRoot { index: usize, len: usize },

    #[error(
        "deposit {index}: fork version {actual} does not match the contract's fork version \
         {expected}. The deposit data was generated for a different network; this cannot be \
         overridden"
    )]
    ForkVersionMismatch {
        index: usize,
        expected: Bytes,
        actual: Bytes,
    },

    #[error(
        "deposit {index}: {} is below the 1 Ether minimum deposit; this cannot be overridden",
        ether(.amount)
    )]
    AmountTooSmall { index: usize, amount: u64 },

    #[error(
        "deposit {index}: {} is more than 32 Ether. Any amount above 32 Ether will not count \
         towards the validator's effective balance and is effectively wasted. If you really \
         want to do this use --allow-excessive-deposit",
        ether(.amount)
    )]
    AmountExceedsEffectiveLimit { index: usize, amount: u64 },

    #[error(
        "deposit {index}: deposit data version {version} is older than the minimum {min} \
         supported by this contract. Upgrade your key generation tool and regenerate the \
         deposit data, or use --allow-old-data if you are completely sure"
    )]
    SchemaTooOld { index: usize, version: u64, min: u64 },

    #[error(
        "deposit {index}: deposit data version {version} is newer than the maximum {max} \
         supported by this contract. Upgrade this tool, or use --allow-new-data if you are \
         completely sure"
    )]
    SchemaTooNew { index: usize, version: u64, max: u64 },

    #[error(
        "deposit data does not carry an amount and no value was supplied. Supply --value, or \
         use --force-zero-value to send the deposit without value"
    )]
    MissingValue,

    #[error(
        "supplied value {} is below the 1 Ether minimum deposit; this cannot be overridden",
        ether(.amount)
    )]
    ValueTooSmall { amount: u64 },

    #[error(
        "supplied value {} is more than 32 Ether and would not count towards the validator's \
         effective balance. If you really want to do this use --allow-excessive-deposit",
        ether(.amount)
    )]
    ValueExceedsEffectiveLimit { amount: u64 },

    #[error(
        "supplied value {0} wei is not a whole number of gwei, which the deposit contract \
         rejects. Supply a value with at most 9 decimal places"
    )]
    ValueNotWholeGwei(U256),

    #[error(
        "existing deposit check failed: {0}. The check cannot be skipped; retry once the \
         indexer is reachable"
    )]
    IndexerUnavailable(#[from] IndexerError),

    #[error(
        "there has already been {} deposited to validator {pubkey}. If you really want to add \
         more funds to this validator use --allow-duplicate-deposit",
        ether(.total)
    )]
    ValidatorAlreadyFunded { pubkey: Bytes, total: u64 },

    #[error(
        "this deposit will increase the total deposits of validator {pubkey} to {}. If you \
         really want to add these funds use --allow-duplicate-deposit or \
         --allow-excessive-deposit",
        ether(.total)
    )]
    WouldExceedEffectiveLimit { pubkey: Bytes, total: u64 },

    #[error("failed to sign deposit transaction: {0}")]
    Signing(String),

    #[error("chain interaction failed: {0}")]
    Chain(#[from] ChainError),
}

impl DepositError {
    /// Command line flag that turns this error into a logged pass-through, if any.
    pub fn override_flag(&self) -> Option<&'static str> {
        match self {
            Self::UnknownContract { .. } => Some("--allow-unknown-contract"),
            Self::AmountExceedsEffectiveLimit { .. } | Self::ValueExceedsEffectiveLimit { .. } => {
                Some("--allow-excessive-deposit")
            }
            Self::SchemaTooOld { .. } => Some("--allow-old-data"),
            Self::SchemaTooNew { .. } => Some("--allow-new-data"),
            Self::MissingValue => Some("--force-zero-value"),
            Self::ValidatorAlreadyFunded { .. } | Self::WouldExceedEffectiveLimit { .. } => {
                Some("--allow-duplicate-deposit")
            }
            _ => None,
        }
    }

    /// Index of the deposit record this error refers to, for per-record validation errors.
    pub fn record_index(&self) -> Option<usize> {
        match self {
            Self::MissingField { index, .. }
            | Self::InvalidDataRoot { index, .. }
            | Self::ForkVersionMismatch { index, .. }
            | Self::AmountTooSmall { index, .. }
            | Self::AmountExceedsEffectiveLimit { index, .. }
            | Self::SchemaTooOld { index, .. }
            | Self::SchemaTooNew { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Whether the error was caused by the user's input rather than by an external service.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            Self::IndexerUnavailable(_) | Self::Signing(_) | Self::Chain(_)
        )
    }
}

/// Required deposit record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositField {
    PublicKey,
    DepositDataRoot,
    Signature,
    WithdrawalCredentials,
}

impl fmt::Display for DepositField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PublicKey => "public key",
            Self::DepositDataRoot => "deposit data root",
            Self::Signature => "signature",
            Self::WithdrawalCredentials => "withdrawal credentials",
        };
        f.write_str(name)
    }
}

/// Errors constructing a [`ContractRegistry`](crate::registry::ContractRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("deposit contract {address} is registered twice on chain {chain_id}")]
    DuplicateAddress { address: Address, chain_id: u64 },

    #[error("network {network} has min version {min} greater than max version {max}")]
    InvalidVersionBounds { network: String, min: u64, max: u64 },
}

/// Errors querying the deposit indexer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexerError {
    #[error("indexer request failed: {0}")]
    Request(String),

    #[error("indexer returned HTTP status {0}")]
    Status(u16),

    #[error("invalid data returned from indexer: {0}")]
    InvalidResponse(String),

    #[error("indexer reported errors: {0}")]
    Query(String),

    #[error("invalid deposit amount '{0}' from pre-existing deposit")]
    InvalidAmount(String),

    #[error("no indexer client configured for '{0}'")]
    NotConfigured(String),
}

/// Errors from the chain collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("invalid RPC endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl ChainError {
    pub fn rpc(err: impl fmt::Display) -> Self {
        Self::Rpc(err.to_string())
    }
}

/// Renders a gwei amount as Ether, e.g. `32 Ether` or `1.5 Ether`.
pub fn ether(gwei: &u64) -> String {
    let whole = gwei / WEI_PER_GWEI;
    let frac = gwei % WEI_PER_GWEI;
    if frac == 0 {
        return format!("{whole} Ether");
    }
    let frac = format!("{frac:09}");
    format!("{whole}.{} Ether", frac.trim_end_matches('0'))
}
