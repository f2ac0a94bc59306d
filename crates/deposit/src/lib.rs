//! Submission of Ethereum beacon chain validator deposits.
//!
//! Deposit records produced by key generation tooling are loaded, validated as a whole batch
//! against a deposit contract resolved from the [`ContractRegistry`], and then turned into
//! deposit transactions that are either signed offline or submitted through an execution
//! client, after checking an external indexer for deposits already made.

pub mod builder;
pub mod chain;
pub mod constants;
pub mod errors;
pub mod indexer;
pub mod loader;
pub mod pipeline;
pub mod record;
pub mod registry;
pub mod validate;

pub use builder::{
    build, derive_params, BuildMode, BuildParams, DepositTxParams, FeeParams, TransactionPayload,
};
pub use chain::{Confirmation, DepositChain, RpcChain};
pub use errors::{ChainError, DepositError, DepositField, IndexerError, RegistryError};
pub use indexer::{check_duplicate, DepositIndexer, DuplicateCheckResult, GraphIndexer};
pub use loader::load;
pub use pipeline::{run_batch, BatchReport, RecordOutcome};
pub use record::DepositRecord;
pub use registry::{ContractDescriptor, ContractRegistry, ResolveTarget};
pub use validate::{validate_batch, validate_fallback_value, validate_record, ValidationContext};
