use miette::Diagnostic;
use reqwest::{header, Method, StatusCode};
use serde::{Deserialize, Serialize};
use skybot_core::activity::Activity;
use thiserror::Error;

use crate::mask;

pub type Result<T> = miette::Result<T, ConnectorError>;

pub const TOKEN_URL: &str = "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token";
const TOKEN_SCOPE: &str = "https://api.botframework.com/.default";
const TOKEN_GRANT_TYPE: &str = "client_credentials";

/// Client for the bot connector: obtains access tokens for the bot and
/// posts activities back into conversations.
#[derive(Clone)]
pub struct ConnectorClient {
    token_url: url::Url,
    client: reqwest::Client,
}

#[derive(Error, Diagnostic, Debug)]
pub enum ConnectorError {
    #[error("failed to create HTTP client: {0}")]
    ClientBuildError(reqwest::Error),
    #[error("failed to create HTTP request: {0}")]
    RequestBuildError(reqwest::Error),
    #[error("failed to execute HTTP request: {0}")]
    RequestError(reqwest::Error),
    #[error("failed to parse connector response: {0}")]
    ResponseParseError(serde_json::Error),
    #[error("failed to parse connector URL: {0}")]
    UrlParsingError(url::ParseError),
    #[error("service URL {0:?} cannot have a path")]
    #[diagnostic(code(skybot::error::connector))]
    InvalidServiceUrl(String),
    #[error("connector returned unexpected HTTP status {0}: {1}")]
    #[diagnostic(code(skybot::error::connector))]
    UnexpectedStatus(StatusCode, String),
}

impl ConnectorClient {
    pub fn new() -> Result<Self> {
        Self::with_token_url(TOKEN_URL)
    }

    pub fn with_token_url(token_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(ConnectorError::ClientBuildError)?;
        let token_url: url::Url = token_url
            .parse()
            .map_err(ConnectorError::UrlParsingError)?;

        Ok(Self { token_url, client })
    }

    /// Exchanges the bot's credentials for an access token (client
    /// credentials grant). Anything but `200 OK` is an error.
    pub async fn request_access_token(
        &self,
        app_id: &str,
        app_password: &str,
    ) -> Result<TokenResponse> {
        let req = self
            .client
            .request(Method::POST, self.token_url.clone())
            .form(&[
                ("grant_type", TOKEN_GRANT_TYPE),
                ("client_id", app_id),
                ("client_secret", app_password),
                ("scope", TOKEN_SCOPE),
            ])
            .build()
            .map_err(ConnectorError::RequestBuildError)?;

        let resp = self
            .client
            .execute(req)
            .await
            .map_err(ConnectorError::RequestError)?;

        let status = resp.status();
        let body = resp.bytes().await.map_err(ConnectorError::RequestError)?;

        if status != StatusCode::OK {
            return Err(ConnectorError::UnexpectedStatus(
                status,
                String::from_utf8_lossy(&body).to_string(),
            ));
        }

        let token: TokenResponse =
            serde_json::from_slice(&body).map_err(ConnectorError::ResponseParseError)?;

        tracing::debug!(
            app_id = app_id,
            token = mask::secret(&token.access_token).as_str(),
            expires_in = token.expires_in,
            "access token issued"
        );

        Ok(token)
    }

    /// Replies to `activity` with a text message in the same conversation.
    pub async fn send_reply_message(
        &self,
        activity: &Activity,
        message: &str,
        access_token: &str,
    ) -> Result<()> {
        let reply = activity.reply(message);
        let url = reply_url(activity)?;
        self.send_activity(&reply, url.as_str(), access_token)
            .await
    }

    /// Posts `activity` to `url`. Any 200, 201, 202 or 204 status is
    /// success.
    pub async fn send_activity(
        &self,
        activity: &Activity,
        url: &str,
        access_token: &str,
    ) -> Result<()> {
        let url: url::Url = url.parse().map_err(ConnectorError::UrlParsingError)?;
        let req = self
            .client
            .request(Method::POST, url.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .json(activity)
            .build()
            .map_err(ConnectorError::RequestBuildError)?;

        let resp = self
            .client
            .execute(req)
            .await
            .map_err(ConnectorError::RequestError)?;

        let status = resp.status();
        match status {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::NO_CONTENT => {
                tracing::debug!(
                    url = url.as_str(),
                    conversation = activity.conversation.id.as_str(),
                    "activity sent"
                );
                Ok(())
            }
            _ => {
                let body = resp.text().await.unwrap_or_default();
                Err(ConnectorError::UnexpectedStatus(status, body))
            }
        }
    }
}

/// Where replies to `activity` are posted, below the service URL. The
/// conversation and activity IDs are percent-encoded as path segments.
pub fn reply_url(activity: &Activity) -> Result<url::Url> {
    let mut url: url::Url = activity
        .service_url
        .parse()
        .map_err(ConnectorError::UrlParsingError)?;
    url.path_segments_mut()
        .map_err(|_| ConnectorError::InvalidServiceUrl(activity.service_url.clone()))?
        .pop_if_empty()
        .extend([
            "v3",
            "conversations",
            activity.conversation.id.as_str(),
            "activities",
            activity.id.as_str(),
        ]);
    Ok(url)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub ext_expires_in: i64,
    pub access_token: String,
}
