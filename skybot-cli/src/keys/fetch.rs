use std::fs;

use argh::FromArgs;
use camino::Utf8PathBuf;
use skybot_core::directory::{KeyDirectoryClient, DISCOVERY_URL};
use skybot_core::jwks::SigningKeySet;

use crate::CliError;

/// Fetch the signing key set published by the bot framework.
#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argh(subcommand, name = "fetch")]
pub struct FetchKeys {
    /// the OpenID discovery document locating the key set (default: bot framework well-known URL)
    #[argh(option, default = "DISCOVERY_URL.to_string()")]
    discovery_url: String,
    /// fetch the key set from this URL directly, skipping discovery
    #[argh(option)]
    jwks_url: Option<String>,
    /// path to write the key set to (default: standard output)
    #[argh(option)]
    output: Option<Utf8PathBuf>,
}

impl FetchKeys {
    pub async fn run(&self) -> Result<(), CliError> {
        let keys = self.fetch().await?;

        tracing::info!(
            "fetched {} signing keys: {}",
            keys.keys.len(),
            keys.key_ids().join(", ")
        );

        let json = serde_json::to_string_pretty(&keys)?;
        match &self.output {
            Some(file_name) => {
                tracing::info!("saving key set to {}", file_name);
                fs::write(file_name, json.as_bytes())?;
            }
            None => println!("{}", json),
        }

        Ok(())
    }

    async fn fetch(&self) -> Result<SigningKeySet, CliError> {
        let directory = KeyDirectoryClient::with_discovery_url(&self.discovery_url)?;
        let keys = match &self.jwks_url {
            Some(url) => directory.fetch_signing_keys_from(url).await?,
            None => directory.fetch_signing_keys().await?,
        };
        Ok(keys)
    }
}
