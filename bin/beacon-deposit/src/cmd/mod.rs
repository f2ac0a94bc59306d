use argh::FromArgs;
use deposit::DepositArgs;
use networks::NetworksArgs;

pub(crate) mod deposit;
pub(crate) mod networks;

/// Sends beacon chain validator deposits
#[derive(FromArgs, PartialEq, Debug)]
pub(crate) struct TopLevel {
    #[argh(subcommand)]
    pub(crate) cmd: Commands,

    /// emit logs as JSON
    #[argh(switch)]
    pub(crate) json_logs: bool,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
pub(crate) enum Commands {
    Deposit(DepositArgs),
    Networks(NetworksArgs),
}
