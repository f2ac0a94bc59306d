use std::{path::PathBuf, str::FromStr, time::Duration};

use alloy::{
    network::EthereumWallet,
    primitives::{utils::parse_ether, Address, TxHash},
};
use argh::FromArgs;
use beacon_deposit::{
    load, run_batch, BatchReport, BuildMode, BuildParams, Confirmation, ContractDescriptor,
    ContractRegistry, DepositChain, DepositError, DepositIndexer, DepositRecord, FeeParams,
    GraphIndexer, ResolveTarget, RpcChain, TransactionPayload, ValidationContext,
};
use tracing::{info, warn};

use crate::{
    errors::{Completion, DisplayableError, DisplayedError},
    settings::Settings,
    signer::{load_signer, KeySource},
};

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Sends deposits to the beacon chain deposit contract
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "deposit")]
pub(crate) struct DepositArgs {
    /// deposit data as a JSON object or array, or the path of a file containing it
    #[argh(option)]
    data: String,

    /// address of the deposit contract
    #[argh(option)]
    address: Option<String>,

    /// name of the network whose deposit contract to use, e.g. mainnet or hoodi
    #[argh(option)]
    network: Option<String>,

    /// address the deposits are sent from. must match the signing key
    #[argh(option)]
    from: Option<String>,

    /// hex private key to sign with
    #[argh(option)]
    private_key: Option<String>,

    /// path of an encrypted JSON keystore to sign with
    #[argh(option)]
    keystore: Option<PathBuf>,

    /// passphrase of the keystore
    #[argh(option)]
    passphrase: Option<String>,

    /// print signed transactions instead of sending them
    #[argh(switch)]
    offline: bool,

    /// nonce of the first transaction in offline mode
    #[argh(option, default = "0")]
    nonce: u64,

    /// chain id in offline mode. defaults to the chain of the selected network
    #[argh(option)]
    chain_id: Option<u64>,

    /// legacy gas price in gwei for offline transactions
    #[argh(option)]
    gas_price: Option<u64>,

    /// max fee per gas in gwei for offline transactions
    #[argh(option)]
    max_fee_per_gas: Option<u64>,

    /// max priority fee per gas in gwei for offline transactions. defaults to 1
    #[argh(option)]
    max_priority_fee_per_gas: Option<u64>,

    /// gas limit of each deposit transaction
    #[argh(option)]
    gas_limit: Option<u64>,

    /// value in Ether for deposits whose data carries no amount
    #[argh(option)]
    value: Option<String>,

    /// send to a contract address that is not known to this tool
    #[argh(switch)]
    allow_unknown_contract: bool,

    /// allow deposit data older than the contract supports
    #[argh(switch)]
    allow_old_data: bool,

    /// allow deposit data newer than the contract supports
    #[argh(switch)]
    allow_new_data: bool,

    /// allow deposits above the maximum effective balance
    #[argh(switch)]
    allow_excessive_deposit: bool,

    /// allow deposits to validators that already have deposits
    #[argh(switch)]
    allow_duplicate_deposit: bool,

    /// send every deposit with zero value
    #[argh(switch)]
    force_zero_value: bool,

    /// wait for submitted deposits to be mined
    #[argh(switch)]
    wait: bool,

    /// seconds to wait for each deposit to be mined
    #[argh(option, default = "300")]
    wait_timeout: u64,
}

impl DepositArgs {
    fn validation_context(&self) -> ValidationContext {
        ValidationContext {
            allow_old_schema: self.allow_old_data,
            allow_new_schema: self.allow_new_data,
            allow_excessive_amount: self.allow_excessive_deposit,
            allow_unknown_contract: self.allow_unknown_contract,
            allow_duplicate_deposit: self.allow_duplicate_deposit,
            force_zero_value: self.force_zero_value,
        }
    }

    fn target(&self, default_network: Option<&str>) -> Result<ResolveTarget, DisplayedError> {
        if let Some(address) = &self.address {
            let address = Address::from_str(address)
                .user_error(format!("invalid contract address '{address}'"))?;
            return Ok(ResolveTarget::address(address));
        }
        Ok(ResolveTarget {
            address: None,
            network: self
                .network
                .clone()
                .or_else(|| default_network.map(str::to_owned)),
        })
    }

    fn key_source(&self) -> Result<KeySource<'_>, DisplayedError> {
        match (&self.private_key, &self.keystore) {
            (Some(key), None) => Ok(KeySource::PrivateKey(key)),
            (None, Some(path)) => Ok(KeySource::Keystore {
                path,
                passphrase: self.passphrase.as_deref().unwrap_or_default(),
            }),
            (Some(_), Some(_)) => Err(DisplayedError::UserError(
                "only one of --private-key and --keystore may be given".to_owned(),
                Box::new(()),
            )),
            (None, None) => Err(DisplayedError::UserError(
                "one of --private-key or --keystore is required to sign deposits".to_owned(),
                Box::new(()),
            )),
        }
    }

    fn build_params(&self) -> Result<BuildParams, DisplayedError> {
        let value_fallback = self
            .value
            .as_deref()
            .map(|v| parse_ether(v).user_error(format!("invalid value '{v}'. Supply Ether")))
            .transpose()?;
        Ok(BuildParams {
            gas_limit: self.gas_limit,
            value_fallback,
        })
    }

    fn fees(&self) -> Result<FeeParams, DisplayedError> {
        match (self.gas_price, self.max_fee_per_gas) {
            (Some(gas_price), None) => Ok(FeeParams::Legacy {
                gas_price: gwei_to_wei(gas_price),
            }),
            (None, Some(max_fee)) => {
                let priority = self.max_priority_fee_per_gas.unwrap_or(1).min(max_fee);
                Ok(FeeParams::Eip1559 {
                    max_fee_per_gas: gwei_to_wei(max_fee),
                    max_priority_fee_per_gas: gwei_to_wei(priority),
                })
            }
            (Some(_), Some(_)) => Err(DisplayedError::UserError(
                "only one of --gas-price and --max-fee-per-gas may be given".to_owned(),
                Box::new(()),
            )),
            (None, None) => Err(DisplayedError::UserError(
                "offline transactions need --gas-price or --max-fee-per-gas".to_owned(),
                Box::new(()),
            )),
        }
    }
}

fn gwei_to_wei(gwei: u64) -> u128 {
    u128::from(gwei) * WEI_PER_GWEI
}

pub(crate) async fn deposit(
    args: DepositArgs,
    settings: Settings,
    registry: &ContractRegistry,
) -> Result<Completion, DisplayedError> {
    let ctx = args.validation_context();
    let params = args.build_params()?;
    let target = args.target(settings.default_network.as_deref())?;
    let from = args
        .from
        .as_deref()
        .map(|f| Address::from_str(f).user_error(format!("invalid --from address '{f}'")))
        .transpose()?;

    let records = load(&args.data)?;
    info!(count = records.len(), "loaded deposit data");

    let signer = load_signer(args.key_source()?, from)?;
    let sender = signer.address();
    let wallet = EthereumWallet::from(signer);

    if args.offline {
        if target.address.is_some() && args.chain_id.is_none() {
            return Err(DisplayedError::UserError(
                "--chain-id is required to send to a contract address offline".to_owned(),
                Box::new(()),
            ));
        }
        let descriptor = registry.resolve(
            &target,
            args.chain_id.unwrap_or_default(),
            ctx.allow_unknown_contract,
        )?;
        let chain_id = args.chain_id.unwrap_or(descriptor.chain_id);
        if chain_id != descriptor.chain_id {
            warn!(%chain_id, network = %descriptor.network, expected = descriptor.chain_id, "chain id differs from the network's chain");
        }
        log_contract(&descriptor);

        let mode = BuildMode::Offline {
            wallet: &wallet,
            from: sender,
            chain_id,
            nonce: args.nonce,
            fees: args.fees()?,
        };
        let report = run_batch(&records, &descriptor, &ctx, &params, mode)
        .await
        .map_err(|e| batch_error(e, &records))?;
        for (_, payload) in report.succeeded() {
            if let TransactionPayload::Signed(tx) = payload {
                println!("{tx}");
            }
        }
        return finish(&report, Vec::new());
    }

    let chain = RpcChain::connect(&settings.rpc_endpoint, wallet)
        .user_error("invalid RPC endpoint. Check rpc_endpoint in the config file")?;
    let chain_id = chain
        .chain_id()
        .await
        .internal_error(format!("failed to reach {}", settings.rpc_endpoint))?;
    let descriptor = registry.resolve(&target, chain_id, ctx.allow_unknown_contract)?;
    if chain_id != descriptor.chain_id {
        warn!(%chain_id, network = %descriptor.network, expected = descriptor.chain_id, "connected chain differs from the network's chain");
    }
    log_contract(&descriptor);

    let indexer = if descriptor.has_indexer() {
        Some(
            GraphIndexer::new(settings.indexer_host.clone(), settings.indexer_timeout)
                .internal_error("failed to create indexer client")?,
        )
    } else {
        None
    };
    let mode = BuildMode::Online {
        chain: &chain,
        indexer: indexer.as_ref().map(|i| i as &dyn DepositIndexer),
    };
    let report = run_batch(&records, &descriptor, &ctx, &params, mode)
        .await
        .map_err(|e| batch_error(e, &records))?;

    let submitted: Vec<TxHash> = report
        .succeeded()
        .filter_map(|(_, payload)| match payload {
            TransactionPayload::Submitted(hash) => Some(*hash),
            TransactionPayload::Signed(_) => None,
        })
        .collect();
    let unconfirmed = if args.wait {
        wait_for_deposits(&chain, &submitted, Duration::from_secs(args.wait_timeout)).await?
    } else {
        Vec::new()
    };
    finish(&report, unconfirmed)
}

fn log_contract(descriptor: &ContractDescriptor) {
    info!(
        network = %descriptor.network,
        chain_id = descriptor.chain_id,
        address = %descriptor.address,
        min_version = descriptor.min_version,
        max_version = descriptor.max_version,
        indexer = %descriptor.indexer,
        "using deposit contract"
    );
}

/// Waits for each transaction in turn, returning those not mined in time.
async fn wait_for_deposits(
    chain: &dyn DepositChain,
    submitted: &[TxHash],
    timeout: Duration,
) -> Result<Vec<TxHash>, DisplayedError> {
    let mut unconfirmed = Vec::new();
    let mut reverted = Vec::new();
    for tx_hash in submitted {
        match chain
            .wait_for_confirmation(*tx_hash, timeout)
            .await
            .internal_error(format!("failed to wait for {tx_hash}"))?
        {
            Confirmation::Confirmed => info!(%tx_hash, "deposit mined"),
            Confirmation::Reverted => {
                warn!(%tx_hash, "deposit reverted");
                reverted.push(*tx_hash);
            }
            Confirmation::TimedOut => {
                warn!(%tx_hash, "deposit not mined in time");
                unconfirmed.push(*tx_hash);
            }
        }
    }

    if !reverted.is_empty() {
        return Err(DisplayedError::UserError(
            format!("{} deposit transaction(s) reverted", reverted.len()),
            Box::new(reverted),
        ));
    }
    Ok(unconfirmed)
}

/// Converts a batch-level failure, naming the account of the offending record when there is one.
fn batch_error(err: DepositError, records: &[DepositRecord]) -> DisplayedError {
    let account = err
        .record_index()
        .and_then(|index| records.get(index))
        .map(|record| record.account.clone())
        .filter(|account| !account.is_empty());
    match (account, DisplayedError::from(err)) {
        (Some(account), DisplayedError::UserError(msg, e)) => {
            DisplayedError::UserError(format!("{msg} (account {account})"), e)
        }
        (_, displayed) => displayed,
    }
}

fn finish(report: &BatchReport, unconfirmed: Vec<TxHash>) -> Result<Completion, DisplayedError> {
    if report.has_failures() {
        let failed: Vec<String> = report
            .failed()
            .map(|(outcome, err)| format!("deposit {} ({}): {err}", outcome.index, outcome.account))
            .collect();
        return Err(DisplayedError::UserError(
            format!(
                "{} of {} deposits were not sent:\n{}",
                failed.len(),
                report.outcomes.len(),
                failed.join("\n")
            ),
            Box::new(failed.len()),
        ));
    }
    if !unconfirmed.is_empty() {
        return Ok(Completion::Unconfirmed);
    }
    Ok(Completion::Done)
}
