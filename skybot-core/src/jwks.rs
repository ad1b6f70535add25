use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::Error;

/// The issuer's published signing keys.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SigningKeySet {
    #[serde(default)]
    pub keys: Vec<SigningKey>,
}

impl SigningKeySet {
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// First key with the given ID, in document order.
    pub fn find(&self, key_id: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|k| k.key_id == key_id)
    }

    pub fn key_ids(&self) -> Vec<&str> {
        self.keys.iter().map(|k| k.key_id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Display for SigningKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", json!(self))
    }
}

impl FromStr for SigningKeySet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SigningKey {
    #[serde(rename = "kty", default)]
    pub key_type: String,
    #[serde(rename = "use", default)]
    pub usage: String,
    #[serde(rename = "kid", default)]
    pub key_id: String,
    #[serde(rename = "x5t", default)]
    pub thumbprint: String,
    #[serde(rename = "n", default)]
    pub modulus: String,
    #[serde(rename = "e", default)]
    pub exponent: String,
    /// Base64 (standard alphabet) DER certificates, leaf first.
    #[serde(rename = "x5c", default)]
    pub certificate_chain: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub endorsements: Option<Vec<String>>,
}

/// OpenID discovery document. Only `jwks_uri` is needed to locate the keys,
/// everything else is informational.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveryDocument {
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub authorization_endpoint: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
}
