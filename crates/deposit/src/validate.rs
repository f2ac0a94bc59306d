//! Pre-flight validation of deposit records against the resolved contract.

use alloy_primitives::U256;
use tracing::{debug, warn};

use crate::{
    constants::{MAX_EFFECTIVE_BALANCE_GWEI, MIN_DEPOSIT_GWEI, WEI_PER_GWEI},
    errors::{DepositError, DepositField},
    record::{DepositRecord, DATA_ROOT_LEN},
    registry::ContractDescriptor,
};

/// Overrides that turn specific validation failures into logged pass-throughs.
///
/// The flags are independent and combine additively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationContext {
    /// Accept deposit data older than the contract's minimum version.
    pub allow_old_schema: bool,

    /// Accept deposit data newer than the contract's maximum version.
    pub allow_new_schema: bool,

    /// Accept deposits above the maximum effective balance.
    pub allow_excessive_amount: bool,

    /// Accept a contract address that is not in the registry.
    pub allow_unknown_contract: bool,

    /// Accept deposits to validators that already have deposits.
    pub allow_duplicate_deposit: bool,

    /// Send transactions with zero value regardless of the deposit amount.
    pub force_zero_value: bool,
}

/// Validates every record of a batch.
///
/// Stops at the first violation. Nothing in the batch may be built unless this passes for all
/// records.
pub fn validate_batch(
    records: &[DepositRecord],
    descriptor: &ContractDescriptor,
    ctx: &ValidationContext,
) -> Result<(), DepositError> {
    for (index, record) in records.iter().enumerate() {
        validate_record(index, record, descriptor, ctx)?;
    }
    debug!(count = records.len(), network = %descriptor.network, "deposit data validated");
    Ok(())
}

/// Validates a single record, `index` being its position in the batch.
pub fn validate_record(
    index: usize,
    record: &DepositRecord,
    descriptor: &ContractDescriptor,
    ctx: &ValidationContext,
) -> Result<(), DepositError> {
    let required = [
        (&record.pubkey, DepositField::PublicKey),
        (&record.deposit_data_root, DepositField::DepositDataRoot),
        (&record.signature, DepositField::Signature),
        (&record.withdrawal_credentials, DepositField::WithdrawalCredentials),
    ];
    for (value, field) in required {
        if value.is_empty() {
            return Err(DepositError::MissingField { index, field });
        }
        if field == DepositField::DepositDataRoot && value.len() != DATA_ROOT_LEN {
            return Err(DepositError::InvalidDataRoot {
                index,
                len: value.len(),
            });
        }
    }

    if !descriptor.fork_version.is_empty()
        && !record.fork_version.is_empty()
        && descriptor.fork_version != record.fork_version
    {
        return Err(DepositError::ForkVersionMismatch {
            index,
            expected: descriptor.fork_version.clone(),
            actual: record.fork_version.clone(),
        });
    }

    let amount = record.amount;
    // Zero defers to an externally supplied value, checked when the transaction is built.
    if amount != 0 && amount < MIN_DEPOSIT_GWEI {
        return Err(DepositError::AmountTooSmall { index, amount });
    }

    if amount > MAX_EFFECTIVE_BALANCE_GWEI {
        if !ctx.allow_excessive_amount {
            return Err(DepositError::AmountExceedsEffectiveLimit { index, amount });
        }
        warn!(
            %index,
            %amount,
            flag = "--allow-excessive-deposit",
            "deposit exceeds maximum effective balance, allowed by override"
        );
    }

    if record.version < descriptor.min_version {
        if !ctx.allow_old_schema {
            return Err(DepositError::SchemaTooOld {
                index,
                version: record.version,
                min: descriptor.min_version,
            });
        }
        warn!(
            %index,
            version = record.version,
            flag = "--allow-old-data",
            "deposit data older than supported, allowed by override"
        );
    }

    if record.version > descriptor.max_version {
        if !ctx.allow_new_schema {
            return Err(DepositError::SchemaTooNew {
                index,
                version: record.version,
                max: descriptor.max_version,
            });
        }
        warn!(
            %index,
            version = record.version,
            flag = "--allow-new-data",
            "deposit data newer than supported, allowed by override"
        );
    }

    Ok(())
}

/// Validates a value in wei supplied for records that carry no amount, returning it in gwei.
///
/// The same bounds apply as to record amounts, and the value must be a whole number of gwei.
pub fn validate_fallback_value(value: U256, ctx: &ValidationContext) -> Result<u64, DepositError> {
    let (gwei, remainder) = value.div_rem(U256::from(WEI_PER_GWEI));
    if !remainder.is_zero() {
        return Err(DepositError::ValueNotWholeGwei(value));
    }
    let amount = u64::try_from(gwei).unwrap_or(u64::MAX);

    if amount < MIN_DEPOSIT_GWEI {
        return Err(DepositError::ValueTooSmall { amount });
    }

    if amount > MAX_EFFECTIVE_BALANCE_GWEI {
        if !ctx.allow_excessive_amount {
            return Err(DepositError::ValueExceedsEffectiveLimit { amount });
        }
        warn!(
            %amount,
            flag = "--allow-excessive-deposit",
            "supplied value exceeds maximum effective balance, allowed by override"
        );
    }

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, Bytes};

    use super::*;

    fn descriptor() -> ContractDescriptor {
        ContractDescriptor {
            network: "Test".to_owned(),
            chain_id: 1,
            address: Address::repeat_byte(0x11),
            fork_version: Bytes::from_static(&[0, 0, 0, 1]),
            min_version: 2,
            max_version: 3,
            indexer: String::new(),
        }
    }

    fn record(amount: u64) -> DepositRecord {
        DepositRecord {
            account: "test".to_owned(),
            pubkey: Bytes::from(vec![0xaa; 48]),
            withdrawal_credentials: Bytes::from(vec![0x00; 32]),
            signature: Bytes::from(vec![0xbb; 96]),
            deposit_data_root: Bytes::from(vec![0xcc; 32]),
            amount,
            fork_version: Bytes::from_static(&[0, 0, 0, 1]),
            version: 3,
        }
    }

    fn check(record: &DepositRecord, ctx: &ValidationContext) -> Result<(), DepositError> {
        validate_record(0, record, &descriptor(), ctx)
    }

    #[test]
    fn test_amounts_within_bounds_pass() {
        let ctx = ValidationContext::default();
        for amount in [1_000_000_000, 16_000_000_000, 32_000_000_000] {
            assert!(check(&record(amount), &ctx).is_ok(), "{amount}");
        }
    }

    #[test]
    fn test_zero_amount_is_exempt_from_floor() {
        assert!(check(&record(0), &ValidationContext::default()).is_ok());
    }

    #[test]
    fn test_amount_below_floor() {
        let ctx = ValidationContext {
            allow_excessive_amount: true,
            allow_old_schema: true,
            allow_new_schema: true,
            ..Default::default()
        };
        let err = check(&record(999_999_999), &ctx).unwrap_err();
        assert!(matches!(
            err,
            DepositError::AmountTooSmall {
                amount: 999_999_999,
                ..
            }
        ));
    }

    #[test]
    fn test_amount_above_limit() {
        let err = check(&record(32_000_000_001), &ValidationContext::default()).unwrap_err();
        assert!(matches!(
            err,
            DepositError::AmountExceedsEffectiveLimit { .. }
        ));

        let ctx = ValidationContext {
            allow_excessive_amount: true,
            ..Default::default()
        };
        assert!(check(&record(32_000_000_001), &ctx).is_ok());
    }

    #[test]
    fn test_schema_bounds() {
        let ctx = ValidationContext::default();
        for version in [2, 3] {
            let rec = DepositRecord {
                version,
                ..record(32_000_000_000)
            };
            assert!(check(&rec, &ctx).is_ok());
        }

        let old = DepositRecord {
            version: 1,
            ..record(32_000_000_000)
        };
        assert!(matches!(
            check(&old, &ctx),
            Err(DepositError::SchemaTooOld { version: 1, min: 2, .. })
        ));
        let allow_old = ValidationContext {
            allow_old_schema: true,
            ..Default::default()
        };
        assert!(check(&old, &allow_old).is_ok());

        let new = DepositRecord {
            version: 4,
            ..record(32_000_000_000)
        };
        assert!(matches!(
            check(&new, &ctx),
            Err(DepositError::SchemaTooNew { version: 4, max: 3, .. })
        ));
        let allow_new = ValidationContext {
            allow_new_schema: true,
            ..Default::default()
        };
        assert!(check(&new, &allow_new).is_ok());
        // Overrides are independent.
        assert!(check(&new, &allow_old).is_err());
    }

    #[test]
    fn test_missing_fields_in_order() {
        let ctx = ValidationContext::default();
        let empty = DepositRecord::default();
        assert!(matches!(
            check(&empty, &ctx),
            Err(DepositError::MissingField {
                field: DepositField::PublicKey,
                ..
            })
        ));

        let cases = [
            (
                DepositRecord {
                    deposit_data_root: Bytes::new(),
                    signature: Bytes::new(),
                    ..record(32_000_000_000)
                },
                DepositField::DepositDataRoot,
            ),
            (
                DepositRecord {
                    signature: Bytes::new(),
                    withdrawal_credentials: Bytes::new(),
                    ..record(32_000_000_000)
                },
                DepositField::Signature,
            ),
            (
                DepositRecord {
                    withdrawal_credentials: Bytes::new(),
                    ..record(32_000_000_000)
                },
                DepositField::WithdrawalCredentials,
            ),
        ];
        for (rec, expected) in cases {
            match check(&rec, &ctx) {
                Err(DepositError::MissingField { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected missing {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_short_data_root_fails_validation() {
        let rec = DepositRecord {
            deposit_data_root: Bytes::from(vec![0xcc; 31]),
            ..record(32_000_000_000)
        };
        let err = validate_batch(
            &[record(32_000_000_000), rec],
            &descriptor(),
            &ValidationContext::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DepositError::InvalidDataRoot { index: 1, len: 31 }
        ));
        assert_eq!(err.record_index(), Some(1));
    }

    #[test]
    fn test_fallback_value_bounds() {
        let ether = |milli: u64| U256::from(milli) * U256::from(1_000_000_000_000_000u64);
        let ctx = ValidationContext::default();

        assert_eq!(
            validate_fallback_value(ether(32_000), &ctx).unwrap(),
            32_000_000_000
        );
        assert_eq!(
            validate_fallback_value(ether(1_000), &ctx).unwrap(),
            1_000_000_000
        );
        assert!(matches!(
            validate_fallback_value(ether(500), &ctx),
            Err(DepositError::ValueTooSmall {
                amount: 500_000_000
            })
        ));
        assert!(matches!(
            validate_fallback_value(ether(64_000), &ctx),
            Err(DepositError::ValueExceedsEffectiveLimit { .. })
        ));

        let allow_excessive = ValidationContext {
            allow_excessive_amount: true,
            ..Default::default()
        };
        assert_eq!(
            validate_fallback_value(ether(64_000), &allow_excessive).unwrap(),
            64_000_000_000
        );
        // The floor cannot be overridden.
        assert!(validate_fallback_value(ether(500), &allow_excessive).is_err());
    }

    #[test]
    fn test_fallback_value_must_be_whole_gwei() {
        let value = U256::from(32_000_000_000_000_000_001u128);
        assert!(matches!(
            validate_fallback_value(value, &ValidationContext::default()),
            Err(DepositError::ValueNotWholeGwei(v)) if v == value
        ));
    }

    #[test]
    fn test_fork_version_mismatch_is_not_overridable() {
        let rec = DepositRecord {
            fork_version: Bytes::from_static(&[0, 0, 0, 2]),
            ..record(32_000_000_000)
        };
        let ctx = ValidationContext {
            allow_old_schema: true,
            allow_new_schema: true,
            allow_excessive_amount: true,
            allow_unknown_contract: true,
            allow_duplicate_deposit: true,
            force_zero_value: true,
        };
        assert!(matches!(
            check(&rec, &ctx),
            Err(DepositError::ForkVersionMismatch { .. })
        ));
    }

    #[test]
    fn test_fork_version_unchecked_when_either_side_empty() {
        let ctx = ValidationContext::default();
        let rec = DepositRecord {
            fork_version: Bytes::new(),
            ..record(32_000_000_000)
        };
        assert!(check(&rec, &ctx).is_ok());

        let unchecked = ContractDescriptor {
            fork_version: Bytes::new(),
            ..descriptor()
        };
        let other_fork = DepositRecord {
            fork_version: Bytes::from_static(&[9, 9, 9, 9]),
            ..record(32_000_000_000)
        };
        assert!(validate_record(0, &other_fork, &unchecked, &ctx).is_ok());
    }

    #[test]
    fn test_batch_reports_failing_index() {
        let mut records = vec![record(32_000_000_000); 3];
        records[1].pubkey = Bytes::new();
        let err =
            validate_batch(&records, &descriptor(), &ValidationContext::default()).unwrap_err();
        assert!(matches!(
            err,
            DepositError::MissingField {
                index: 1,
                field: DepositField::PublicKey
            }
        ));
        assert_eq!(err.record_index(), Some(1));
    }
}
