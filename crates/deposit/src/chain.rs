//! Execution chain access for online deposits.

use std::{fmt, time::Duration};

use alloy::{
    network::{Ethereum, EthereumWallet, NetworkWallet, TransactionBuilder},
    providers::{
        DynProvider, PendingTransactionBuilder, PendingTransactionError, Provider,
        ProviderBuilder, WatchTxError,
    },
    rpc::types::TransactionRequest,
};
use alloy_primitives::{Address, TxHash};
use async_trait::async_trait;
use reqwest::Url;
use tracing::debug;

use crate::errors::ChainError;

/// Final state of a submitted transaction as far as the caller waited for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Mined and succeeded.
    Confirmed,
    /// Mined but reverted.
    Reverted,
    /// Not mined within the timeout.
    TimedOut,
}

/// Chain operations needed to submit deposits.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DepositChain: Send + Sync {
    /// Chain id of the connected chain.
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Address transactions are sent from.
    fn sender(&self) -> Address;

    /// Fills in nonce and fees from the network, signs and broadcasts the transaction.
    async fn submit(&self, request: TransactionRequest) -> Result<TxHash, ChainError>;

    /// Waits up to `timeout` for the transaction to be mined.
    async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError>;
}

/// [`DepositChain`] backed by a JSON-RPC endpoint.
#[derive(Clone)]
pub struct RpcChain {
    provider: DynProvider,
    sender: Address,
}

impl fmt::Debug for RpcChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChain")
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

impl RpcChain {
    /// Connects to an HTTP JSON-RPC endpoint, signing with `wallet`'s default signer.
    pub fn connect(endpoint: &str, wallet: EthereumWallet) -> Result<Self, ChainError> {
        let url: Url = endpoint
            .parse()
            .map_err(|_| ChainError::InvalidEndpoint(endpoint.to_owned()))?;
        let sender = NetworkWallet::<Ethereum>::default_signer_address(&wallet);
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(url)
            .erased();
        Ok(Self { provider, sender })
    }
}

#[async_trait]
impl DepositChain for RpcChain {
    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.provider.get_chain_id().await.map_err(ChainError::rpc)
    }

    fn sender(&self) -> Address {
        self.sender
    }

    async fn submit(&self, request: TransactionRequest) -> Result<TxHash, ChainError> {
        let nonce = self
            .provider
            .get_transaction_count(self.sender)
            .pending()
            .await
            .map_err(ChainError::rpc)?;
        let fees = self
            .provider
            .estimate_eip1559_fees()
            .await
            .map_err(ChainError::rpc)?;
        debug!(
            %nonce,
            max_fee_per_gas = fees.max_fee_per_gas,
            max_priority_fee_per_gas = fees.max_priority_fee_per_gas,
            "resolved transaction parameters"
        );

        let request = request
            .with_from(self.sender)
            .with_nonce(nonce)
            .with_max_fee_per_gas(fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas);

        let pending = self
            .provider
            .send_transaction(request)
            .await
            .map_err(ChainError::rpc)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmation(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<Confirmation, ChainError> {
        let pending = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .with_timeout(Some(timeout));
        match pending.get_receipt().await {
            Ok(receipt) if receipt.status() => Ok(Confirmation::Confirmed),
            Ok(_) => Ok(Confirmation::Reverted),
            Err(PendingTransactionError::TxWatcher(WatchTxError::Timeout)) => {
                Ok(Confirmation::TimedOut)
            }
            Err(e) => Err(ChainError::rpc(e)),
        }
    }
}
