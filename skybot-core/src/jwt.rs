use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::auth::DenialReason;

pub const AUTHORIZATION_HEADER_PREFIX: &str = "Bearer ";

const SEGMENT_SEPARATOR: char = '.';

/// A compact token as received from the bot framework, decoded but not yet
/// verified.
///
/// `header_encoded` and `payload_encoded` are the segments exactly as they
/// appeared on the wire. The signature covers those strings, never a
/// re-serialization of [`Header`] or [`Claims`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    pub header_encoded: String,
    pub payload_encoded: String,
    pub header: Header,
    pub claims: Claims,
    pub signature: Vec<u8>,
}

impl SignedToken {
    /// The bytes the issuer signed: `header "." payload`.
    pub fn signing_input(&self) -> String {
        format!(
            "{}{}{}",
            self.header_encoded, SEGMENT_SEPARATOR, self.payload_encoded
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    #[serde(rename = "typ", default)]
    pub token_type: String,
    #[serde(rename = "alg", default)]
    pub algorithm: String,
    #[serde(rename = "kid", default)]
    pub key_id: String,
    #[serde(rename = "x5t", default)]
    pub key_thumbprint: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    #[serde(rename = "serviceurl", default)]
    pub service_url: String,
    #[serde(rename = "iss", default)]
    pub issuer: String,
    #[serde(rename = "aud", default)]
    pub audience: String,
    /// Epoch seconds.
    #[serde(rename = "exp", default)]
    pub expires_at: i64,
    /// Epoch seconds.
    #[serde(rename = "nbf", default)]
    pub not_before: i64,
}

/// Parses the value of an `Authorization` header of the form
/// `Bearer <header>.<payload>.<signature>`.
pub fn parse_authorization_header(value: &str) -> Result<SignedToken, DenialReason> {
    let token = match value.strip_prefix(AUTHORIZATION_HEADER_PREFIX) {
        Some(token) if !token.is_empty() => token,
        _ => return Err(DenialReason::MalformedHeader),
    };
    parse(token)
}

/// Parses a compact token without the `Bearer ` prefix.
pub fn parse(token: &str) -> Result<SignedToken, DenialReason> {
    let segments: Vec<&str> = token.split(SEGMENT_SEPARATOR).collect();
    if segments.len() != 3 {
        tracing::trace!(segments = segments.len(), "unexpected token segment count");
        return Err(DenialReason::MalformedToken);
    }

    let header: Header = decode_json_segment(segments[0])?;
    let claims: Claims = decode_json_segment(segments[1])?;
    let signature = decode_segment(segments[2])?;

    Ok(SignedToken {
        header_encoded: segments[0].to_string(),
        payload_encoded: segments[1].to_string(),
        header,
        claims,
        signature,
    })
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, DenialReason> {
    base64::decode_config(segment, base64::URL_SAFE_NO_PAD).map_err(|e| {
        tracing::trace!(err = e.to_string(), "token segment is not base64url");
        DenialReason::MalformedToken
    })
}

fn decode_json_segment<T: DeserializeOwned>(segment: &str) -> Result<T, DenialReason> {
    let bytes = decode_segment(segment)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::trace!(err = e.to_string(), "token segment is not valid JSON");
        DenialReason::MalformedToken
    })
}
