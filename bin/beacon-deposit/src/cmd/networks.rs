use argh::FromArgs;
use beacon_deposit::{constants::UNBOUNDED_VERSION, ContractDescriptor, ContractRegistry};

/// Lists the deposit contracts this tool knows about
#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand, name = "networks")]
pub(crate) struct NetworksArgs {}

pub(crate) fn networks(_args: NetworksArgs, registry: &ContractRegistry) {
    for contract in registry.iter() {
        println!("{}", describe(contract));
    }
}

fn describe(contract: &ContractDescriptor) -> String {
    let fork_version = if contract.fork_version.is_empty() {
        "-".to_owned()
    } else {
        contract.fork_version.to_string()
    };
    let max_version = if contract.max_version == UNBOUNDED_VERSION {
        "*".to_owned()
    } else {
        contract.max_version.to_string()
    };
    let indexer = if contract.has_indexer() {
        contract.indexer.as_str()
    } else {
        "-"
    };
    format!(
        "{:<10} chain {:<9} {} fork {:<10} versions {}..={} indexer {}",
        contract.network,
        contract.chain_id,
        contract.address,
        fork_version,
        contract.min_version,
        max_version,
        indexer,
    )
}
