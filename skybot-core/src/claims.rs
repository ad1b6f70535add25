use crate::auth::DenialReason;
use crate::jwt::Claims;

/// Issuer of the tokens the bot framework attaches to webhook calls.
pub const DEFAULT_ISSUER: &str = "https://api.botframework.com";

/// Who a token must come from and who it must be addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustContext {
    /// The bot's own application ID.
    pub expected_audience: String,
    pub expected_issuer: String,
}

impl TrustContext {
    pub fn new(expected_audience: &str, expected_issuer: &str) -> Self {
        Self {
            expected_audience: expected_audience.to_string(),
            expected_issuer: expected_issuer.to_string(),
        }
    }

    /// Trusts tokens issued by [`DEFAULT_ISSUER`] for the given application ID.
    pub fn for_app_id(app_id: &str) -> Self {
        Self::new(app_id, DEFAULT_ISSUER)
    }
}

/// Checks issuer, audience and expiry, in that order, as of `now` (epoch
/// seconds). The token must expire strictly after `now`.
pub fn validate(claims: &Claims, trust: &TrustContext, now: i64) -> Result<(), DenialReason> {
    if claims.issuer != trust.expected_issuer {
        return Err(DenialReason::IssuerMismatch);
    }
    if claims.audience != trust.expected_audience {
        return Err(DenialReason::AudienceMismatch);
    }
    if claims.expires_at <= now {
        return Err(DenialReason::Expired);
    }
    Ok(())
}
