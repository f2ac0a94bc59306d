//! Deposit transaction construction for offline signing and online submission.

use std::fmt;

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    rpc::types::TransactionRequest,
};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use alloy_sol_types::{sol, SolCall};
use tracing::{debug, info, warn};

use crate::{
    chain::DepositChain,
    constants::{DEPOSIT_GAS_LIMIT, WEI_PER_GWEI},
    errors::{ether, DepositError, IndexerError},
    indexer::{check_duplicate, DepositIndexer},
    record::DepositRecord,
    registry::ContractDescriptor,
    validate::{validate_fallback_value, ValidationContext},
};

sol! {
    /// Deposit function of the beacon chain deposit contract.
    function deposit(
        bytes pubkey,
        bytes withdrawal_credentials,
        bytes signature,
        bytes32 deposit_data_root
    ) external payable;
}

/// Caller supplied inputs to transaction construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildParams {
    /// Gas limit replacing [`DEPOSIT_GAS_LIMIT`].
    pub gas_limit: Option<u64>,

    /// Value in wei for records that carry no amount.
    pub value_fallback: Option<U256>,
}

/// Fee parameters for offline transactions, in wei.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeParams {
    Legacy {
        gas_price: u128,
    },
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

impl FeeParams {
    fn apply(self, request: TransactionRequest) -> TransactionRequest {
        match self {
            Self::Legacy { gas_price } => request.with_gas_price(gas_price),
            Self::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => request
                .with_max_fee_per_gas(max_fee_per_gas)
                .with_max_priority_fee_per_gas(max_priority_fee_per_gas),
        }
    }
}

/// Parameters of a deposit transaction, identical for both build modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositTxParams {
    pub to: Address,

    /// Value in wei.
    pub value: U256,

    pub gas_limit: u64,

    /// ABI encoded `deposit` call.
    pub calldata: Bytes,
}

impl DepositTxParams {
    /// Transaction request without sender, nonce or fees.
    pub fn to_request(&self) -> TransactionRequest {
        TransactionRequest::default()
            .with_to(self.to)
            .with_value(self.value)
            .with_input(self.calldata.clone())
            .with_gas_limit(self.gas_limit)
    }

    /// Value in gwei, saturating.
    pub fn value_gwei(&self) -> u64 {
        u64::try_from(self.value / U256::from(WEI_PER_GWEI)).unwrap_or(u64::MAX)
    }
}

/// How a deposit transaction leaves the builder.
#[derive(Clone, Copy)]
pub enum BuildMode<'a> {
    /// Sign locally and return the encoded transaction without touching the network.
    Offline {
        wallet: &'a EthereumWallet,
        from: Address,
        chain_id: u64,
        nonce: u64,
        fees: FeeParams,
    },

    /// Check the indexer for existing deposits, then submit through the chain.
    Online {
        chain: &'a dyn DepositChain,
        indexer: Option<&'a dyn DepositIndexer>,
    },
}

impl fmt::Debug for BuildMode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline {
                from,
                chain_id,
                nonce,
                fees,
                ..
            } => f
                .debug_struct("Offline")
                .field("from", from)
                .field("chain_id", chain_id)
                .field("nonce", nonce)
                .field("fees", fees)
                .finish_non_exhaustive(),
            Self::Online { indexer, .. } => f
                .debug_struct("Online")
                .field("indexer", &indexer.is_some())
                .finish_non_exhaustive(),
        }
    }
}

/// Result of building a deposit transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionPayload {
    /// `0x` prefixed EIP-2718 encoding of the signed transaction.
    Signed(String),

    /// Hash of the broadcast transaction.
    Submitted(TxHash),
}

/// ABI encodes the deposit call for a record.
///
/// Fails for a data root that is not 32 bytes, which validation rejects up front.
pub fn deposit_calldata(record: &DepositRecord) -> Result<Bytes, DepositError> {
    let deposit_data_root = B256::try_from(record.deposit_data_root.as_ref()).map_err(|_| {
        DepositError::MalformedInput(format!(
            "deposit data root must be 32 bytes, got {}",
            record.deposit_data_root.len()
        ))
    })?;
    let call = depositCall {
        pubkey: record.pubkey.clone(),
        withdrawal_credentials: record.withdrawal_credentials.clone(),
        signature: record.signature.clone(),
        deposit_data_root,
    };
    Ok(call.abi_encode().into())
}

/// Derives value, gas and calldata for a validated record.
///
/// The value is zero when forced, otherwise the record's amount converted to wei, otherwise
/// the fallback. A fallback is held to the same bounds as a record amount.
pub fn derive_params(
    record: &DepositRecord,
    descriptor: &ContractDescriptor,
    ctx: &ValidationContext,
    params: &BuildParams,
) -> Result<DepositTxParams, DepositError> {
    let value = if ctx.force_zero_value {
        if overridden_by_zero_value(record, params) {
            warn!(
                account = %record.account,
                amount = record.amount,
                fallback = ?params.value_fallback,
                flag = "--force-zero-value",
                "sending deposit without value, allowed by override"
            );
        }
        U256::ZERO
    } else if record.amount != 0 {
        U256::from(record.amount) * U256::from(WEI_PER_GWEI)
    } else {
        let fallback = params.value_fallback.ok_or(DepositError::MissingValue)?;
        validate_fallback_value(fallback, ctx)?;
        fallback
    };

    Ok(DepositTxParams {
        to: descriptor.address,
        value,
        gas_limit: params.gas_limit.unwrap_or(DEPOSIT_GAS_LIMIT),
        calldata: deposit_calldata(record)?,
    })
}

/// Whether forcing a zero value changes what would otherwise be sent.
fn overridden_by_zero_value(record: &DepositRecord, params: &BuildParams) -> bool {
    record.amount != 0 || !matches!(params.value_fallback, Some(v) if v.is_zero())
}

/// Builds the deposit transaction for one validated record.
pub async fn build(
    record: &DepositRecord,
    descriptor: &ContractDescriptor,
    ctx: &ValidationContext,
    params: &BuildParams,
    mode: BuildMode<'_>,
) -> Result<TransactionPayload, DepositError> {
    let tx = derive_params(record, descriptor, ctx, params)?;

    match mode {
        BuildMode::Offline {
            wallet,
            from,
            chain_id,
            nonce,
            fees,
        } => {
            let request = fees.apply(
                tx.to_request()
                    .with_from(from)
                    .with_chain_id(chain_id)
                    .with_nonce(nonce),
            );
            let envelope = request
                .build(wallet)
                .await
                .map_err(|e| DepositError::Signing(e.to_string()))?;
            debug!(%nonce, tx_hash = %envelope.tx_hash(), "signed deposit transaction");
            Ok(TransactionPayload::Signed(format!(
                "0x{}",
                hex::encode(envelope.encoded_2718())
            )))
        }

        BuildMode::Online { chain, indexer } => {
            if descriptor.has_indexer() {
                let indexer = indexer
                    .ok_or_else(|| IndexerError::NotConfigured(descriptor.indexer.clone()))?;
                check_duplicate(
                    indexer,
                    &descriptor.indexer,
                    &record.pubkey,
                    &record.withdrawal_credentials,
                    tx.value_gwei(),
                    ctx,
                )
                .await?;
            }

            info!(
                group = "beacon",
                command = "deposit",
                account = %record.account,
                amount = %ether(&tx.value_gwei()),
                deposit_public_key = %record.pubkey,
                deposit_withdrawal_credentials = %record.withdrawal_credentials,
                deposit_signature = %record.signature,
                deposit_data_root = %record.deposit_data_root,
                "creating deposit"
            );

            let tx_hash = chain.submit(tx.to_request()).await?;
            info!(%tx_hash, "deposit submitted");
            Ok(TransactionPayload::Submitted(tx_hash))
        }
    }
}
