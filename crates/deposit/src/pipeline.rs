//! Batch processing of deposit records.

use tracing::{error, info, warn};

use crate::{
    builder::{build, BuildMode, BuildParams, TransactionPayload},
    errors::DepositError,
    record::DepositRecord,
    registry::ContractDescriptor,
    validate::{validate_batch, validate_fallback_value, ValidationContext},
};

/// What happened to one record of a batch.
#[derive(Debug)]
pub struct RecordOutcome {
    /// Position of the record in the batch.
    pub index: usize,

    /// Account label of the record.
    pub account: String,

    pub result: Result<TransactionPayload, DepositError>,
}

/// Per-record outcomes of a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<RecordOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&RecordOutcome, &TransactionPayload)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|p| (o, p)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&RecordOutcome, &DepositError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

/// Validates a batch and builds a transaction for every record.
///
/// Validation covers the whole batch, and the fallback value if any record needs it, before
/// anything is built, so a single bad record means
/// no transaction is signed or sent. Once validation has passed, a record that fails to build
/// is reported in its outcome and the remaining records are still attempted. In offline mode
/// the nonce advances only for records that were signed.
pub async fn run_batch(
    records: &[DepositRecord],
    descriptor: &ContractDescriptor,
    ctx: &ValidationContext,
    params: &BuildParams,
    mut mode: BuildMode<'_>,
) -> Result<BatchReport, DepositError> {
    validate_batch(records, descriptor, ctx)?;
    if !ctx.force_zero_value && records.iter().any(|r| r.amount == 0) {
        if let Some(value) = params.value_fallback {
            validate_fallback_value(value, ctx)?;
        }
    }

    let mut report = BatchReport::default();
    for (index, record) in records.iter().enumerate() {
        let result = build(record, descriptor, ctx, params, mode).await;
        match &result {
            Ok(payload) => {
                if let BuildMode::Offline { nonce, .. } = &mut mode {
                    *nonce += 1;
                }
                if let TransactionPayload::Submitted(tx_hash) = payload {
                    info!(%index, account = %record.account, %tx_hash, "deposit sent");
                }
            }
            Err(err) => match err.override_flag() {
                Some(flag) => warn!(%index, account = %record.account, %err, %flag, "deposit not sent"),
                None => error!(%index, account = %record.account, %err, "deposit not sent"),
            },
        }
        report.outcomes.push(RecordOutcome {
            index,
            account: record.account.clone(),
            result,
        });
    }

    Ok(report)
}
