//! Beacon chain deposit CLI

mod cmd;
mod errors;
mod logging;
mod settings;
mod signer;

use std::process;

use beacon_deposit::ContractRegistry;
use cmd::{deposit::deposit, networks::networks, Commands, TopLevel};
use errors::EXIT_FAILURE;
use settings::Settings;
use tracing::debug;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let TopLevel { cmd, json_logs } = argh::from_env();

    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        process::exit(EXIT_FAILURE);
    });
    logging::init(json_logs || settings.json_logs);
    debug!(config_file = ?settings.config_file, rpc_endpoint = %settings.rpc_endpoint, "loaded settings");

    let registry = ContractRegistry::known();

    let result = match cmd {
        Commands::Networks(args) => {
            networks(args, &registry);
            return;
        }
        Commands::Deposit(args) => deposit(args, settings, &registry).await,
    };

    match result {
        Ok(completion) => process::exit(completion.exit_code()),
        Err(err) => {
            eprintln!("{err}");
            process::exit(EXIT_FAILURE);
        }
    }
}
