//! Existing deposit check against an external deposit indexer.

use std::time::Duration;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    constants::MAX_EFFECTIVE_BALANCE_GWEI,
    errors::{DepositError, IndexerError},
    validate::ValidationContext,
};

/// A deposit the indexer has already seen for a validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDeposit {
    /// Amount in gwei.
    pub amount: u64,

    pub withdrawal_credentials: Bytes,
}

/// Source of deposits already made to the deposit contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DepositIndexer: Send + Sync {
    /// Returns every deposit the named indexer has recorded for a validator public key.
    async fn deposits_for(
        &self,
        indexer_name: &str,
        pubkey: &[u8],
    ) -> Result<Vec<IndexedDeposit>, IndexerError>;
}

/// Outcome of an existing deposit check that passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateCheckResult {
    /// Number of deposits already made to the validator.
    pub prior_deposits: usize,

    /// Sum of those deposits, in gwei.
    pub prior_total: u64,
}

/// Checks the indexer for earlier deposits to the same validator.
///
/// Fails if the validator already holds the maximum effective balance, unless duplicate
/// deposits are allowed, or if this deposit would take it past the maximum, unless either
/// duplicate or excessive deposits are allowed. The indexer is queried on every call so each
/// deposit of a batch is checked against what the indexer knows at that moment.
pub async fn check_duplicate(
    indexer: &dyn DepositIndexer,
    indexer_name: &str,
    pubkey: &[u8],
    withdrawal_credentials: &[u8],
    incoming: u64,
    ctx: &ValidationContext,
) -> Result<DuplicateCheckResult, DepositError> {
    let deposits = indexer.deposits_for(indexer_name, pubkey).await?;
    if deposits.is_empty() {
        debug!(%indexer_name, "no existing deposits for validator");
        return Ok(DuplicateCheckResult::default());
    }

    let total = deposits
        .iter()
        .fold(0u64, |acc, d| acc.saturating_add(d.amount));

    for deposit in &deposits {
        if deposit.withdrawal_credentials.as_ref() != withdrawal_credentials {
            warn!(
                existing = %deposit.withdrawal_credentials,
                incoming = %hex::encode(withdrawal_credentials),
                "existing deposit has different withdrawal credentials"
            );
        }
    }

    if total >= MAX_EFFECTIVE_BALANCE_GWEI {
        if !ctx.allow_duplicate_deposit {
            return Err(DepositError::ValidatorAlreadyFunded {
                pubkey: Bytes::copy_from_slice(pubkey),
                total,
            });
        }
        warn!(%total, "validator already fully funded, allowed by override");
    }

    let combined = total.saturating_add(incoming);
    if combined > MAX_EFFECTIVE_BALANCE_GWEI {
        if !(ctx.allow_duplicate_deposit || ctx.allow_excessive_amount) {
            return Err(DepositError::WouldExceedEffectiveLimit {
                pubkey: Bytes::copy_from_slice(pubkey),
                total: combined,
            });
        }
        warn!(%combined, "validator total deposits exceed maximum effective balance, allowed by override");
    }

    Ok(DuplicateCheckResult {
        prior_deposits: deposits.len(),
        prior_total: total,
    })
}

/// Subgraph deposit indexer queried over HTTP.
#[derive(Debug, Clone)]
pub struct GraphIndexer {
    client: reqwest::Client,
    host: String,
}

impl GraphIndexer {
    /// Creates an indexer client for `host`, e.g. `api.thegraph.com`.
    ///
    /// A host given with an explicit `http://` or `https://` scheme is used as is.
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self, IndexerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndexerError::Request(e.to_string()))?;
        Ok(Self {
            client,
            host: host.into(),
        })
    }

    fn endpoint(&self, indexer_name: &str) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}/subgraphs/name/{indexer_name}")
        } else {
            format!("https://{host}/subgraphs/name/{indexer_name}")
        }
    }
}

#[async_trait]
impl DepositIndexer for GraphIndexer {
    async fn deposits_for(
        &self,
        indexer_name: &str,
        pubkey: &[u8],
    ) -> Result<Vec<IndexedDeposit>, IndexerError> {
        let url = self.endpoint(indexer_name);
        debug!(%url, "querying existing deposits");

        let resp = self
            .client
            .post(&url)
            .json(&deposits_query(pubkey))
            .send()
            .await
            .map_err(|e| IndexerError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IndexerError::Status(status.as_u16()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| IndexerError::Request(e.to_string()))?;
        parse_deposits_response(&body)
    }
}

/// GraphQL request body selecting the deposits of a validator.
pub fn deposits_query(pubkey: &[u8]) -> Value {
    json!({
        "query": format!(
            "{{deposits(where:{{validatorPubKey:\"0x{}\"}}){{ id amount withdrawalCredentials }}}}",
            hex::encode(pubkey)
        )
    })
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    #[serde(default)]
    data: Option<GraphData>,
    #[serde(default)]
    errors: Vec<GraphError>,
}

#[derive(Debug, Deserialize)]
struct GraphData {
    #[serde(default)]
    deposits: Option<Vec<GraphDeposit>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphDeposit {
    amount: String,
    #[serde(default)]
    withdrawal_credentials: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
}

/// Parses a subgraph response. A missing `data` section or a null `deposits` list means no
/// deposits.
pub fn parse_deposits_response(body: &[u8]) -> Result<Vec<IndexedDeposit>, IndexerError> {
    let resp: GraphResponse = serde_json::from_slice(body)
        .map_err(|e| IndexerError::InvalidResponse(e.to_string()))?;

    if !resp.errors.is_empty() {
        let messages: Vec<_> = resp.errors.into_iter().map(|e| e.message).collect();
        return Err(IndexerError::Query(messages.join("; ")));
    }

    let Some(data) = resp.data else {
        return Ok(Vec::new());
    };

    data.deposits
        .unwrap_or_default()
        .into_iter()
        .map(|d| {
            let amount = d
                .amount
                .parse::<u64>()
                .map_err(|_| IndexerError::InvalidAmount(d.amount.clone()))?;
            let withdrawal_credentials = match d.withdrawal_credentials {
                Some(wc) => {
                    let wc = wc.strip_prefix("0x").unwrap_or(&wc);
                    hex::decode(wc)
                        .map(Bytes::from)
                        .map_err(|e| IndexerError::InvalidResponse(e.to_string()))?
                }
                None => Bytes::new(),
            };
            Ok(IndexedDeposit {
                amount,
                withdrawal_credentials,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBKEY: [u8; 4] = [0xaa, 0xbb, 0xcc, 0xdd];
    const CREDS: [u8; 2] = [0x00, 0x01];

    fn deposits(amounts: &[u64]) -> Vec<IndexedDeposit> {
        amounts
            .iter()
            .map(|&amount| IndexedDeposit {
                amount,
                withdrawal_credentials: Bytes::from_static(&CREDS),
            })
            .collect()
    }

    fn indexer_returning(amounts: &'static [u64]) -> MockDepositIndexer {
        let mut indexer = MockDepositIndexer::new();
        indexer
            .expect_deposits_for()
            .times(1)
            .returning(move |_, _| Ok(deposits(amounts)));
        indexer
    }

    async fn check(
        indexer: &MockDepositIndexer,
        incoming: u64,
        ctx: ValidationContext,
    ) -> Result<DuplicateCheckResult, DepositError> {
        check_duplicate(indexer, "test/deposits", &PUBKEY, &CREDS, incoming, &ctx).await
    }

    #[tokio::test]
    async fn test_no_prior_deposits_passes() {
        let indexer = indexer_returning(&[]);
        let res = check(&indexer, 32_000_000_000, ValidationContext::default())
            .await
            .unwrap();
        assert_eq!(res, DuplicateCheckResult::default());
    }

    #[tokio::test]
    async fn test_fully_funded_validator() {
        let indexer = indexer_returning(&[32_000_000_000]);
        let err = check(&indexer, 1, ValidationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DepositError::ValidatorAlreadyFunded {
                total: 32_000_000_000,
                ..
            }
        ));

        let indexer = indexer_returning(&[32_000_000_000]);
        let ctx = ValidationContext {
            allow_duplicate_deposit: true,
            ..Default::default()
        };
        let res = check(&indexer, 1, ctx).await.unwrap();
        assert_eq!(res.prior_total, 32_000_000_000);
    }

    #[tokio::test]
    async fn test_fully_funded_needs_duplicate_override() {
        // The excessive override alone does not cover an already funded validator.
        let indexer = indexer_returning(&[16_000_000_000, 16_000_000_000]);
        let ctx = ValidationContext {
            allow_excessive_amount: true,
            ..Default::default()
        };
        let err = check(&indexer, 1_000_000_000, ctx).await.unwrap_err();
        assert!(matches!(err, DepositError::ValidatorAlreadyFunded { .. }));
    }

    #[tokio::test]
    async fn test_would_exceed_limit() {
        let indexer = indexer_returning(&[30_000_000_000]);
        let err = check(&indexer, 3_000_000_000, ValidationContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DepositError::WouldExceedEffectiveLimit {
                total: 33_000_000_000,
                ..
            }
        ));

        let overrides = [
            ValidationContext {
                allow_duplicate_deposit: true,
                ..Default::default()
            },
            ValidationContext {
                allow_excessive_amount: true,
                ..Default::default()
            },
            ValidationContext {
                allow_duplicate_deposit: true,
                allow_excessive_amount: true,
                ..Default::default()
            },
        ];
        for ctx in overrides {
            let indexer = indexer_returning(&[30_000_000_000]);
            let res = check(&indexer, 3_000_000_000, ctx).await.unwrap();
            assert_eq!(res.prior_deposits, 1);
            assert_eq!(res.prior_total, 30_000_000_000);
        }
    }

    #[tokio::test]
    async fn test_top_up_to_limit_passes() {
        let indexer = indexer_returning(&[30_000_000_000]);
        let res = check(&indexer, 2_000_000_000, ValidationContext::default())
            .await
            .unwrap();
        assert_eq!(res.prior_total, 30_000_000_000);
    }

    #[tokio::test]
    async fn test_indexer_failure_is_fatal() {
        let mut indexer = MockDepositIndexer::new();
        indexer
            .expect_deposits_for()
            .returning(|_, _| Err(IndexerError::Status(502)));
        let ctx = ValidationContext {
            allow_duplicate_deposit: true,
            allow_excessive_amount: true,
            ..Default::default()
        };
        let err = check(&indexer, 1, ctx).await.unwrap_err();
        assert!(matches!(
            err,
            DepositError::IndexerUnavailable(IndexerError::Status(502))
        ));
    }

    #[test]
    fn test_query_body() {
        let query = deposits_query(&PUBKEY);
        assert_eq!(
            query["query"],
            "{deposits(where:{validatorPubKey:\"0xaabbccdd\"}){ id amount withdrawalCredentials }}"
        );
    }

    #[test]
    fn test_endpoint() {
        let indexer = GraphIndexer::new("api.thegraph.com", Duration::from_secs(1)).unwrap();
        assert_eq!(
            indexer.endpoint("attestantio/eth2deposits"),
            "https://api.thegraph.com/subgraphs/name/attestantio/eth2deposits"
        );
        let local = GraphIndexer::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            local.endpoint("a/b"),
            "http://localhost:8000/subgraphs/name/a/b"
        );
    }

    #[test]
    fn test_parse_response() {
        let body = br#"{"data":{"deposits":[
            {"id":"1","amount":"16000000000","withdrawalCredentials":"0x0001"},
            {"id":"2","amount":"1000000000","withdrawalCredentials":"0x0002"}
        ]}}"#;
        let deposits = parse_deposits_response(body).unwrap();
        assert_eq!(deposits.len(), 2);
        assert_eq!(deposits[0].amount, 16_000_000_000);
        assert_eq!(deposits[1].withdrawal_credentials.as_ref(), &[0x00, 0x02]);
    }

    #[test]
    fn test_parse_empty_response() {
        assert!(parse_deposits_response(br#"{"data":{"deposits":[]}}"#)
            .unwrap()
            .is_empty());
        assert!(parse_deposits_response(br#"{}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_null_deposits() {
        assert!(parse_deposits_response(br#"{"data":{"deposits":null}}"#)
            .unwrap()
            .is_empty());
        assert!(parse_deposits_response(br#"{"data":null}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_errors_are_fatal() {
        let body = br#"{"data":null,"errors":[{"message":"indexer not synced"}]}"#;
        assert_eq!(
            parse_deposits_response(body).unwrap_err(),
            IndexerError::Query("indexer not synced".to_owned())
        );
    }

    #[test]
    fn test_parse_bad_amount() {
        let body = br#"{"data":{"deposits":[{"amount":"lots"}]}}"#;
        assert_eq!(
            parse_deposits_response(body).unwrap_err(),
            IndexerError::InvalidAmount("lots".to_owned())
        );
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_deposits_response(b"<html>"),
            Err(IndexerError::InvalidResponse(_))
        ));
    }
}
