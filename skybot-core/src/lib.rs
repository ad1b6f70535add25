pub mod activity;
pub mod auth;
pub mod claims;
pub mod directory;
pub mod jwks;
pub mod jwt;
pub mod signature;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub const MICROSOFT_APP_ID_ENV: &str = "MICROSOFT_APP_ID";
pub const MICROSOFT_APP_PASSWORD_ENV: &str = "MICROSOFT_APP_PASSWORD";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("OpenSSL error: {0}")]
    OpenSSLError(#[from] openssl::error::ErrorStack),
    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    JSONSerializationError(#[from] serde_json::Error),
    #[error("failed to parse URL: {0}")]
    UrlParsingError(#[from] url::ParseError),
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },
}
