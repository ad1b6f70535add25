use argh::FromArgs;

use crate::CliError;

mod fetch;

/// Works with the signing keys bot framework tokens are verified against.
#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argh(subcommand, name = "keys")]
pub struct KeysCommand {
    #[argh(subcommand)]
    subcommand: KeysSubCommand,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argh(subcommand)]
pub enum KeysSubCommand {
    Fetch(fetch::FetchKeys),
}

impl KeysCommand {
    pub async fn run(&self) -> Result<(), CliError> {
        match &self.subcommand {
            KeysSubCommand::Fetch(cmd) => cmd.run().await,
        }
    }
}
