use argh::FromArgs;

use crate::CliError;

mod token;

/// Verifies tokens and signatures.
#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argh(subcommand, name = "verify")]
pub struct VerifyCommand {
    #[argh(subcommand)]
    subcommand: VerifySubCommand,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argh(subcommand)]
pub enum VerifySubCommand {
    Token(token::VerifyToken),
}

impl VerifyCommand {
    pub async fn run(&self) -> Result<(), CliError> {
        match &self.subcommand {
            VerifySubCommand::Token(cmd) => cmd.run().await,
        }
    }
}
