//! Protocol constants for beacon chain deposits.

/// Number of wei in one gwei. Deposit amounts are denominated in gwei.
pub const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Smallest deposit the deposit contract accepts, in gwei (1 Ether).
pub const MIN_DEPOSIT_GWEI: u64 = 1_000_000_000;

/// Maximum effective balance of a validator, in gwei (32 Ether).
///
/// Anything deposited above this does not count towards the effective balance.
pub const MAX_EFFECTIVE_BALANCE_GWEI: u64 = 32_000_000_000;

/// Gas limit for a deposit call.
///
/// Just above the maximum gas the deposit contract can use when updating its incremental
/// Merkle tree, as calculated in the formal verification of the contract.
pub const DEPOSIT_GAS_LIMIT: u64 = 160_000;

/// Upper version bound of a synthetic descriptor for an unrecognized contract.
pub const UNBOUNDED_VERSION: u64 = 999;

/// Network name given to a synthetic descriptor for an unrecognized contract.
pub const USER_SUPPLIED_NETWORK: &str = "user-supplied network";

/// Default host of the subgraph indexer.
pub const DEFAULT_INDEXER_HOST: &str = "api.thegraph.com";
