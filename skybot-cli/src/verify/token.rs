use std::fs;

use argh::FromArgs;
use camino::Utf8PathBuf;
use serde_json::json;
use skybot_core::auth::{AuthorizationResult, RequestAuthorizer};
use skybot_core::claims::{TrustContext, DEFAULT_ISSUER};
use skybot_core::directory::KeyDirectoryClient;
use skybot_core::jwks::SigningKeySet;
use skybot_core::jwt::{Claims, AUTHORIZATION_HEADER_PREFIX};

use crate::CliError;

/// Verify a bot framework token against keys in a given file.
#[derive(FromArgs, PartialEq, Eq, Debug)]
#[argh(subcommand, name = "token")]
pub struct VerifyToken {
    /// path to key set file, as written by `keys fetch`
    #[argh(positional)]
    jwks_file_name: Utf8PathBuf,
    /// path to file containing the token, with or without the "Bearer " prefix
    #[argh(positional)]
    token_file_name: Utf8PathBuf,
    /// the bot's application ID the token must be addressed to
    #[argh(option)]
    audience: String,
    /// trusted token issuer (default: https://api.botframework.com)
    #[argh(option, default = "DEFAULT_ISSUER.to_string()")]
    issuer: String,
    /// check expiry as of this time, in seconds since the epoch (default: now)
    #[argh(option)]
    at: Option<i64>,
}

impl VerifyToken {
    pub async fn run(&self) -> Result<(), CliError> {
        tracing::info!(
            "verifying token from {} signed by a key in {}",
            self.token_file_name,
            self.jwks_file_name
        );

        let claims = self.verify()?;

        println!("{}", serde_json::to_string_pretty(&json!(claims))?);

        Ok(())
    }

    fn verify(&self) -> Result<Claims, CliError> {
        let keys: SigningKeySet = fs::read_to_string(&self.jwks_file_name)?.parse()?;
        let token = fs::read_to_string(&self.token_file_name)?;
        let header_value = authorization_header(&token);

        // keys are supplied, the directory is never contacted
        let authorizer = RequestAuthorizer::new(
            TrustContext::new(&self.audience, &self.issuer),
            KeyDirectoryClient::new()?,
        );
        let result = match self.at {
            Some(now) => authorizer.authorize_with_keys_at(&header_value, &keys, now),
            None => authorizer.authorize_with_keys(&header_value, &keys),
        };

        match result {
            AuthorizationResult::Authorized(claims) => Ok(claims),
            AuthorizationResult::Denied(reason) => Err(CliError::Denied(reason)),
        }
    }
}

fn authorization_header(token: &str) -> String {
    let token = token.trim();
    if token.starts_with(AUTHORIZATION_HEADER_PREFIX) {
        token.to_string()
    } else {
        format!("{}{}", AUTHORIZATION_HEADER_PREFIX, token)
    }
}
