use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::jwks::{DiscoveryDocument, SigningKeySet};
use crate::Error;

/// Well-known OpenID configuration of the bot framework's token issuer.
pub const DISCOVERY_URL: &str =
    "https://login.botframework.com/v1/.well-known/openidconfiguration";

/// Fetches signing keys from the issuer's key directory.
///
/// Nothing is cached: every call performs fresh requests. Callers that want
/// to avoid the round-trips keep their own copy of the [`SigningKeySet`].
#[derive(Clone, Debug)]
pub struct KeyDirectoryClient {
    discovery_url: Url,
    client: reqwest::Client,
}

impl KeyDirectoryClient {
    pub fn new() -> Result<Self, Error> {
        Self::with_discovery_url(DISCOVERY_URL)
    }

    pub fn with_discovery_url(discovery_url: &str) -> Result<Self, Error> {
        let discovery_url: Url = discovery_url.parse()?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            discovery_url,
            client,
        })
    }

    pub fn discovery_url(&self) -> &Url {
        &self.discovery_url
    }

    pub async fn fetch_discovery_document(&self) -> Result<DiscoveryDocument, Error> {
        self.get_json(self.discovery_url.clone()).await
    }

    /// Resolves the key set location through the discovery document, then
    /// fetches the key set.
    pub async fn fetch_signing_keys(&self) -> Result<SigningKeySet, Error> {
        let document = self.fetch_discovery_document().await?;
        self.fetch_signing_keys_from(&document.jwks_uri).await
    }

    pub async fn fetch_signing_keys_from(&self, url: &str) -> Result<SigningKeySet, Error> {
        let keys: SigningKeySet = self.get_json(url.parse()?).await?;
        tracing::debug!(
            url = url,
            keys = keys.key_ids().join(", ").as_str(),
            "fetched signing keys"
        );
        Ok(keys)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let req = self.client.request(Method::GET, url.clone()).build()?;
        let resp = self.client.execute(req).await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = resp.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
