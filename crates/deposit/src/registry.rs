//! Known deposit contract deployments and contract resolution.

use std::collections::HashSet;

use alloy_primitives::{address, bytes, Address, Bytes};
use tracing::warn;

use crate::{
    constants::{UNBOUNDED_VERSION, USER_SUPPLIED_NETWORK},
    errors::{DepositError, RegistryError},
};

/// A deployed deposit contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDescriptor {
    /// Human readable network name, matched case-insensitively.
    pub network: String,

    /// Chain id of the execution chain the contract is deployed on.
    pub chain_id: u64,

    /// Contract address.
    pub address: Address,

    /// Fork version deposit data must be generated for. Empty means unchecked.
    pub fork_version: Bytes,

    /// Oldest deposit data version accepted.
    pub min_version: u64,

    /// Newest deposit data version accepted.
    pub max_version: u64,

    /// Name of the subgraph indexing deposits to this contract. Empty disables the existing
    /// deposit check.
    pub indexer: String,
}

impl ContractDescriptor {
    /// Descriptor for an address that is not in the registry, used only when the caller
    /// explicitly allows unknown contracts.
    pub fn user_supplied(address: Address, chain_id: u64) -> Self {
        Self {
            network: USER_SUPPLIED_NETWORK.to_owned(),
            chain_id,
            address,
            fork_version: Bytes::new(),
            min_version: 0,
            max_version: UNBOUNDED_VERSION,
            indexer: String::new(),
        }
    }

    /// Whether deposits to this contract are checked against an indexer before submission.
    pub fn has_indexer(&self) -> bool {
        !self.indexer.is_empty()
    }
}

/// What the caller asked to deposit to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveTarget {
    /// Explicit contract address. Takes precedence over the network.
    pub address: Option<Address>,

    /// Network name.
    pub network: Option<String>,
}

impl ResolveTarget {
    pub fn address(address: Address) -> Self {
        Self {
            address: Some(address),
            network: None,
        }
    }

    pub fn network(network: impl Into<String>) -> Self {
        Self {
            address: None,
            network: Some(network.into()),
        }
    }
}

/// Immutable table of deposit contracts.
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    contracts: Vec<ContractDescriptor>,
}

impl ContractRegistry {
    /// Builds a registry, rejecting duplicate `(chain_id, address)` pairs and inverted version
    /// bounds.
    pub fn new(contracts: Vec<ContractDescriptor>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for contract in &contracts {
            if contract.min_version > contract.max_version {
                return Err(RegistryError::InvalidVersionBounds {
                    network: contract.network.clone(),
                    min: contract.min_version,
                    max: contract.max_version,
                });
            }
            if !seen.insert((contract.chain_id, contract.address)) {
                return Err(RegistryError::DuplicateAddress {
                    address: contract.address,
                    chain_id: contract.chain_id,
                });
            }
        }
        Ok(Self { contracts })
    }

    /// Registry of the deposit contracts this tool knows about.
    pub fn known() -> Self {
        Self {
            contracts: known_contracts(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContractDescriptor> {
        self.contracts.iter()
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Resolves the deposit contract for a target.
    ///
    /// An address must match a registered contract on `current_chain_id`, unless
    /// `allow_unknown` is set in which case a synthetic descriptor with unbounded versions is
    /// returned. A network name is matched case-insensitively.
    pub fn resolve(
        &self,
        target: &ResolveTarget,
        current_chain_id: u64,
        allow_unknown: bool,
    ) -> Result<ContractDescriptor, DepositError> {
        if let Some(address) = target.address {
            if let Some(contract) = self
                .contracts
                .iter()
                .find(|c| c.address == address && c.chain_id == current_chain_id)
            {
                return Ok(contract.clone());
            }

            if !allow_unknown {
                return Err(DepositError::UnknownContract {
                    address,
                    chain_id: current_chain_id,
                });
            }

            warn!(%address, chain_id = current_chain_id, "sending to unknown deposit contract");
            return Ok(ContractDescriptor::user_supplied(address, current_chain_id));
        }

        if let Some(network) = &target.network {
            return self
                .contracts
                .iter()
                .find(|c| c.network.eq_ignore_ascii_case(network))
                .cloned()
                .ok_or_else(|| DepositError::UnknownNetwork(network.clone()));
        }

        Err(DepositError::MissingTarget)
    }
}

fn contract(
    network: &str,
    chain_id: u64,
    address: Address,
    fork_version: Bytes,
    versions: (u64, u64),
    indexer: &str,
) -> ContractDescriptor {
    ContractDescriptor {
        network: network.to_owned(),
        chain_id,
        address,
        fork_version,
        min_version: versions.0,
        max_version: versions.1,
        indexer: indexer.to_owned(),
    }
}

fn known_contracts() -> Vec<ContractDescriptor> {
    vec![
        contract(
            "Mainnet",
            1,
            address!("00000000219ab540356cBB839Cbe05303d7705Fa"),
            bytes!("00000000"),
            (3, 3),
            "attestantio/eth2deposits",
        ),
        contract(
            "Hoodi",
            560048,
            address!("00000000219ab540356cBB839Cbe05303d7705Fa"),
            bytes!("10000910"),
            (3, 3),
            "",
        ),
        contract(
            "Holesky",
            17000,
            address!("4242424242424242424242424242424242424242"),
            bytes!("01017000"),
            (3, 3),
            "",
        ),
        contract(
            "Sepolia",
            11155111,
            address!("7f02C3E3c98b133055B8B348B2Ac625669Ed295D"),
            bytes!("90000069"),
            (3, 3),
            "",
        ),
        contract(
            "Prater",
            5,
            address!("ff50ed3d0ec03aC01D4C79aAd74928BFF48a7b2b"),
            bytes!("00001020"),
            (3, 3),
            "attestantio/eth2deposits-prater",
        ),
        contract(
            "Pyrmont",
            5,
            address!("8c5fecdC472E27Bc447696F431E425D02dd46a8c"),
            bytes!("00002009"),
            (3, 3),
            "attestantio/eth2deposits-pyrmont",
        ),
        contract(
            "Topaz",
            5,
            address!("5ca1e00004366ac85f492887aaab12d0e6418876"),
            Bytes::new(),
            (1, 1),
            "attestantio/eth2deposits-topaz",
        ),
        contract(
            "Onyx",
            5,
            address!("0f0f0fc0530007361933eab5db97d09acdd6c1c8"),
            Bytes::new(),
            (2, 2),
            "attestantio/eth2deposits-onyx",
        ),
        contract(
            "Altona",
            5,
            address!("16e82D77882A663454Ef92806b7DeCa1D394810f"),
            bytes!("00000121"),
            (2, 2),
            "attestantio/eth2deposits-altona",
        ),
        contract(
            "Medalla",
            5,
            address!("07b39F4fDE4A38bACe212b546dAc87C58DfE3fDC"),
            bytes!("00000001"),
            (2, 3),
            "attestantio/eth2deposits-medalla",
        ),
        contract(
            "Spadina",
            5,
            address!("48B597F4b53C21B48AD95c7256B49D1779Bd5890"),
            bytes!("00000002"),
            (2, 3),
            "attestantio/eth2deposits-spadina",
        ),
        contract(
            "Zinken",
            5,
            address!("99F0Ec06548b086E46Cb0019C78D0b9b9F36cD53"),
            bytes!("00000003"),
            (2, 3),
            "attestantio/eth2deposits-zinken",
        ),
    ]
}
