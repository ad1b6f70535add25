use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use skybot_core::activity::Activity;
use skybot_core::auth::{AuthorizationResult, DenialReason, RequestAuthorizer};

use crate::handler::ActivityHandler;
use crate::keycache::KeySetCache;
use crate::mask;

/// Value sent in `Strict-Transport-Security` unless configured otherwise
/// (two years).
pub const DEFAULT_STRICT_TRANSPORT_SECURITY: &str = "max-age=63072000; includeSubDomains";

/// The endpoint the bot framework posts activities to.
pub struct Webhook {
    path: String,
    authorizer: RequestAuthorizer,
    key_cache: Option<KeySetCache>,
    handler: Arc<dyn ActivityHandler>,
    strict_transport_security: Option<HeaderValue>,
}

impl Webhook {
    pub fn new(
        path: &str,
        authorizer: RequestAuthorizer,
        handler: Arc<dyn ActivityHandler>,
    ) -> Self {
        Self {
            path: path.to_string(),
            authorizer,
            key_cache: None,
            handler,
            strict_transport_security: Some(HeaderValue::from_static(
                DEFAULT_STRICT_TRANSPORT_SECURITY,
            )),
        }
    }

    /// Authorize against keys from `cache` instead of fetching them for
    /// every call.
    pub fn with_key_cache(mut self, cache: KeySetCache) -> Self {
        self.key_cache = Some(cache);
        self
    }

    /// `None` omits the header.
    pub fn with_strict_transport_security(mut self, value: Option<HeaderValue>) -> Self {
        self.strict_transport_security = value;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn authorize(&self, header_value: &str) -> AuthorizationResult {
        let cache = match &self.key_cache {
            Some(cache) => cache,
            None => return self.authorizer.authorize(header_value).await,
        };

        let result = self.authorize_cached(cache, header_value).await;
        if result.denial_reason() != Some(DenialReason::KeyNotFound) {
            return result;
        }

        // the issuer may have rotated its keys since they were cached
        if !cache.refresh().await {
            return result;
        }
        tracing::debug!("token key not in cached key set, refreshing");
        self.authorize_cached(cache, header_value).await
    }

    async fn authorize_cached(
        &self,
        cache: &KeySetCache,
        header_value: &str,
    ) -> AuthorizationResult {
        match cache.signing_keys().await {
            Ok(keys) => self.authorizer.authorize_with_keys(header_value, &keys),
            Err(e) => {
                tracing::warn!(err = e.to_string(), "failed to fetch signing keys");
                AuthorizationResult::Denied(DenialReason::KeyFetchFailed)
            }
        }
    }

    fn respond(&self, status: StatusCode) -> Response {
        let mut response = status.into_response();
        if let Some(value) = &self.strict_transport_security {
            response
                .headers_mut()
                .insert(header::STRICT_TRANSPORT_SECURITY, value.clone());
        }
        response
    }
}

/// Handler for `POST <webhook path>`.
///
/// The caller is authorized before the body is looked at: `403` when the
/// bearer token is refused, `400` when the body is not an activity, `403`
/// when the activity's `serviceUrl` is not the one the token was issued
/// for, `200` once the activity has been handled.
pub async fn receive(
    Extension(webhook): Extension<Arc<Webhook>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let claims = match webhook.authorize(header_value).await {
        AuthorizationResult::Authorized(claims) => claims,
        AuthorizationResult::Denied(reason) => {
            tracing::debug!(
                authorization = mask::authorization(header_value).as_str(),
                "refusing webhook call: {}",
                reason
            );
            return webhook.respond(StatusCode::FORBIDDEN);
        }
    };

    let activity: Activity = match serde_json::from_slice(&body) {
        Ok(activity) => activity,
        Err(e) => {
            tracing::debug!(err = e.to_string(), "webhook body is not an activity");
            return webhook.respond(StatusCode::BAD_REQUEST);
        }
    };

    // replies, and the bot's access token, go to the service URL
    if activity.service_url != claims.service_url {
        tracing::warn!(
            service_url = activity.service_url.as_str(),
            token_service_url = claims.service_url.as_str(),
            "refusing activity for a service URL the token was not issued for"
        );
        return webhook.respond(StatusCode::FORBIDDEN);
    }

    webhook.handler.handle(activity).await;

    webhook.respond(StatusCode::OK)
}
