use argh::FromArgs;
use skybot_core::auth::DenialReason;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

mod keys;
mod verify;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    JSONSerializationError(#[from] serde_json::Error),
    #[error("{0}")]
    CoreError(#[from] skybot_core::Error),
    #[error("token denied: {0}")]
    Denied(DenialReason),
}

/// Command-line interface for inspecting bot framework signing keys and tokens.
#[derive(FromArgs, PartialEq, Eq, Debug)]
pub struct Arguments {
    #[argh(subcommand)]
    command: RootCommand,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argh(subcommand)]
pub enum RootCommand {
    Keys(keys::KeysCommand),
    Verify(verify::VerifyCommand),
}

impl RootCommand {
    pub async fn run(&self) -> Result<(), CliError> {
        match self {
            RootCommand::Keys(cmd) => cmd.run().await,
            RootCommand::Verify(cmd) => cmd.run().await,
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    if std::env::var_os("RUST_BACKTRACE").is_none() {
        std::env::set_var("RUST_BACKTRACE", "1")
    }

    if std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "skybot=debug,skybot_core=debug")
    }

    tracing_subscriber::fmt::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Arguments = argh::from_env();
    if let Err(e) = args.command.run().await {
        tracing::error!("command failed: {}", e);
        std::process::exit(1);
    }
}
