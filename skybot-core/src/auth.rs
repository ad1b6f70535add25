use chrono::Utc;

use crate::claims::{self, TrustContext};
use crate::directory::KeyDirectoryClient;
use crate::jwks::SigningKeySet;
use crate::jwt::{self, Claims};
use crate::signature;

/// Why a request was refused. Callers must treat every reason the same way
/// (refuse the request); the distinction exists for diagnostics.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    #[error("authorization header is missing or not a bearer token")]
    MalformedHeader,
    #[error("bearer token is not a well-formed signed token")]
    MalformedToken,
    #[error("failed to fetch signing keys")]
    KeyFetchFailed,
    #[error("token signing key not found in key set")]
    KeyNotFound,
    #[error("failed to parse signing certificate")]
    CertificateParseFailed,
    #[error("token signature does not match")]
    SignatureMismatch,
    #[error("token issuer is not trusted")]
    IssuerMismatch,
    #[error("token was issued for a different audience")]
    AudienceMismatch,
    #[error("token has expired")]
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResult {
    /// The token is authentic; carries its verified claims.
    Authorized(Claims),
    Denied(DenialReason),
}

impl AuthorizationResult {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationResult::Authorized(_))
    }

    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            AuthorizationResult::Authorized(_) => None,
            AuthorizationResult::Denied(reason) => Some(*reason),
        }
    }
}

impl From<Result<Claims, DenialReason>> for AuthorizationResult {
    fn from(result: Result<Claims, DenialReason>) -> Self {
        match result {
            Ok(claims) => AuthorizationResult::Authorized(claims),
            Err(reason) => AuthorizationResult::Denied(reason),
        }
    }
}

/// Decides whether an inbound webhook call carries a valid bearer token
/// from the trusted issuer, addressed to this bot.
#[derive(Clone, Debug)]
pub struct RequestAuthorizer {
    trust: TrustContext,
    directory: KeyDirectoryClient,
}

impl RequestAuthorizer {
    pub fn new(trust: TrustContext, directory: KeyDirectoryClient) -> Self {
        Self { trust, directory }
    }

    pub fn trust_context(&self) -> &TrustContext {
        &self.trust
    }

    pub fn directory(&self) -> &KeyDirectoryClient {
        &self.directory
    }

    /// Authorizes `header_value` (the raw `Authorization` header) against
    /// freshly fetched signing keys.
    pub async fn authorize(&self, header_value: &str) -> AuthorizationResult {
        let keys = match self.directory.fetch_signing_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(
                    discovery_url = self.directory.discovery_url().as_str(),
                    err = e.to_string(),
                    "failed to fetch signing keys"
                );
                return AuthorizationResult::Denied(DenialReason::KeyFetchFailed);
            }
        };
        self.authorize_with_keys(header_value, &keys)
    }

    /// Authorizes against a key set the caller already holds.
    pub fn authorize_with_keys(
        &self,
        header_value: &str,
        keys: &SigningKeySet,
    ) -> AuthorizationResult {
        self.authorize_with_keys_at(header_value, keys, Utc::now().timestamp())
    }

    /// Like [`Self::authorize_with_keys`], with expiry checked as of `now`
    /// (epoch seconds).
    pub fn authorize_with_keys_at(
        &self,
        header_value: &str,
        keys: &SigningKeySet,
        now: i64,
    ) -> AuthorizationResult {
        let result: AuthorizationResult = self.verify(header_value, keys, now).into();
        match &result {
            AuthorizationResult::Authorized(claims) => tracing::debug!(
                service_url = claims.service_url.as_str(),
                "request authorized"
            ),
            AuthorizationResult::Denied(reason) => {
                tracing::warn!(reason = ?reason, "request denied: {}", reason)
            }
        }
        result
    }

    fn verify(
        &self,
        header_value: &str,
        keys: &SigningKeySet,
        now: i64,
    ) -> Result<Claims, DenialReason> {
        let token = jwt::parse_authorization_header(header_value)?;
        signature::verify(&token, keys)?;
        claims::validate(&token.claims, &self.trust, now)?;
        Ok(token.claims)
    }
}
