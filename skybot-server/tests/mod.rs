use async_trait::async_trait;
use axum::http::HeaderValue;
use serde_json::json;
use skybot_core::activity::Activity;
use skybot_core::auth::RequestAuthorizer;
use skybot_core::claims::{TrustContext, DEFAULT_ISSUER};
use skybot_core::directory::KeyDirectoryClient;
use skybot_core::jwt::Claims;
use skybot_core::testing::{self, TestIssuer};
use std::{
    error::Error,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::sync::Mutex;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skybot_server::{
    api::{self as server_api, Webhook},
    app::{App, Args},
    handler::ActivityHandler,
    keycache::KeySetCache,
};

pub const APP_ID: &str = "8e7f0e5a-5b6c-4a8e-9d3f-1c2b3a4d5e6f";
pub const WEBHOOK_PATH: &str = "/api/messages";
const DISCOVERY_PATH: &str = "/v1/.well-known/openidconfiguration";
const KEYS_PATH: &str = "/v1/keys";
const KEY_ID: &str = "i6lGk3FZzxRcUb2C3nEQ7syHJlY";


pub struct TestApp {
    url: Url,
    issuer: TestIssuer,
    handler: Arc<RecordingHandler>,
    _directory: MockServer,
}

#[derive(Error, Debug)]
pub enum TestError {
    #[error("failed to connect to test server: {0}")]
    ConnectError(#[source] reqwest::Error),
    #[error("failed to check test server health")]
    HealthCheckError,
    #[error("failed to parse URL: {0}")]
    UrlError(#[from] url::ParseError),
    #[error("failed to execute request: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("failed to sign test token: {0}")]
    TokenError(#[from] skybot_core::Error),
}

pub type TestResult<T> = Result<T, TestError>;

/// Activities the webhook passed on, in arrival order.
#[derive(Default)]
pub struct RecordingHandler {
    activities: Mutex<Vec<Activity>>,
}

impl RecordingHandler {
    pub async fn activities(&self) -> Vec<Activity> {
        self.activities.lock().await.clone()
    }
}

#[async_trait]
impl ActivityHandler for RecordingHandler {
    async fn handle(&self, activity: Activity) {
        self.activities.lock().await.push(activity);
    }
}

pub struct TestAppBuilder {
    key_cache_ttl: Option<Duration>,
    min_key_refresh_interval: Option<Duration>,
    strict_transport_security: Option<HeaderValue>,
    key_status: u16,
    expected_key_fetches: Option<u64>,
}

impl TestAppBuilder {
    pub fn key_cache_ttl(mut self, ttl: Duration) -> Self {
        self.key_cache_ttl = Some(ttl);
        self
    }

    pub fn min_key_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_key_refresh_interval = Some(interval);
        self
    }

    pub fn without_strict_transport_security(mut self) -> Self {
        self.strict_transport_security = None;
        self
    }

    /// Status the key directory answers key set requests with.
    pub fn key_status(mut self, status: u16) -> Self {
        self.key_status = status;
        self
    }

    /// Fails the test on drop unless the key set is fetched exactly
    /// `count` times.
    pub fn expect_key_fetches(mut self, count: u64) -> Self {
        self.expected_key_fetches = Some(count);
        self
    }

    pub async fn start(self) -> TestApp {
        let issuer = TestIssuer::new(KEY_ID).expect("failed to create test issuer");
        let directory = start_directory(&issuer, self.key_status, self.expected_key_fetches).await;

        let client = KeyDirectoryClient::with_discovery_url(&format!(
            "{}{}",
            directory.uri(),
            DISCOVERY_PATH
        ))
        .expect("failed to create key directory client");
        let authorizer =
            RequestAuthorizer::new(TrustContext::new(APP_ID, DEFAULT_ISSUER), client.clone());
        let handler = Arc::new(RecordingHandler::default());

        let mut webhook = Webhook::new(WEBHOOK_PATH, authorizer, handler.clone())
            .with_strict_transport_security(self.strict_transport_security);
        if let Some(ttl) = self.key_cache_ttl {
            let mut cache = KeySetCache::new(client, ttl);
            if let Some(interval) = self.min_key_refresh_interval {
                cache = cache.with_min_refresh_interval(interval);
            }
            webhook = webhook.with_key_cache(cache);
        }

        let port = next_available_port();
        let listen_address = SocketAddr::from(([127, 0, 0, 1], port));
        let server = axum::Server::try_bind(&listen_address)
            .expect("failed to bind test server")
            .serve(server_api::build(Arc::new(webhook)).into_make_service());

        let _ = tokio::spawn(server);

        let url =
            Url::parse(&format!("http://127.0.0.1:{}", port)).expect("failed to generate URL");
        wait_until_up(&reqwest::Client::new(), &url)
            .await
            .expect("test server did not come up");

        TestApp {
            url,
            issuer,
            handler,
            _directory: directory,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            key_cache_ttl: None,
            min_key_refresh_interval: None,
            strict_transport_security: Some(HeaderValue::from_static(
                server_api::webhook::DEFAULT_STRICT_TRANSPORT_SECURITY,
            )),
            key_status: 200,
            expected_key_fetches: None,
        }
    }

    pub async fn start() -> Self {
        Self::builder().start().await
    }

    /// Runs the full application, configured from `args`, with the key
    /// directory pointed at a mock. Returns the server URL and the mock,
    /// which must outlive the server.
    pub async fn run_app(args: Args) -> (Url, MockServer) {
        Self::run_app_over("http", &reqwest::Client::new(), args).await
    }

    /// Runs the full application like [`TestApp::run_app`], waiting for it
    /// to come up over `scheme` using `client`.
    pub async fn run_app_over(
        scheme: &str,
        client: &reqwest::Client,
        args: Args,
    ) -> (Url, MockServer) {
        let issuer = TestIssuer::new(KEY_ID).expect("failed to create test issuer");
        let directory = start_directory(&issuer, 200, None).await;

        let port = next_available_port();
        let app = App::with_args(Args {
            listen_address: SocketAddr::from(([127, 0, 0, 1], port)),
            app_id: Some(APP_ID.to_string()),
            discovery_url: format!("{}{}", directory.uri(), DISCOVERY_PATH),
            ..args
        });

        let _ = tokio::spawn(async move { app.run().await });

        let url = Url::parse(&format!("{}://127.0.0.1:{}", scheme, port))
            .expect("failed to generate URL");
        wait_until_up(client, &url)
            .await
            .expect("application did not come up");

        (url, directory)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn issuer(&self) -> &TestIssuer {
        &self.issuer
    }

    pub fn handler(&self) -> &RecordingHandler {
        &self.handler
    }

    /// Claims the webhook accepts: right issuer and audience, an hour
    /// before expiry.
    pub fn valid_claims(&self) -> Claims {
        testing::claims(DEFAULT_ISSUER, APP_ID, now() + 3600)
    }

    pub fn bearer(&self, claims: &Claims) -> TestResult<String> {
        Ok(self.issuer.bearer(claims)?)
    }

    pub async fn post_activity(
        &self,
        authorization: Option<&str>,
        body: &str,
    ) -> TestResult<reqwest::Response> {
        let mut req = reqwest::Client::new()
            .post(self.url.join(WEBHOOK_PATH)?)
            .header("Content-Type", "application/json")
            .body(body.to_string());
        if let Some(authorization) = authorization {
            req = req.header("Authorization", authorization);
        }
        Ok(req.send().await?)
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn message_json(text: &str) -> String {
    message_json_for(testing::SERVICE_URL, text)
}

pub fn message_json_for(service_url: &str, text: &str) -> String {
    json!({
        "type": "message",
        "id": "1485983408511",
        "timestamp": "2017-02-01T21:10:07.437Z",
        "channelId": "skype",
        "serviceUrl": service_url,
        "from": { "id": "29:1A2B3C", "name": "Megan" },
        "conversation": { "id": "29:1A2B3C" },
        "recipient": { "id": format!("28:{}", APP_ID), "name": "skybot" },
        "text": text,
        "entities": [{ "type": "clientInfo", "locale": "en-US" }]
    })
    .to_string()
}

async fn start_directory(
    issuer: &TestIssuer,
    key_status: u16,
    expected_key_fetches: Option<u64>,
) -> MockServer {
    let directory = MockServer::start().await;

    let mut discovery = Mock::given(method("GET"))
        .and(path(DISCOVERY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": "https://api.botframework.com",
            "authorization_endpoint": "https://invalid.botframework.com",
            "jwks_uri": format!("{}{}", directory.uri(), KEYS_PATH),
            "id_token_signing_alg_values_supported": ["RS256"],
            "token_endpoint_auth_methods_supported": ["private_key_jwt"]
        })));
    let mut keys = Mock::given(method("GET"))
        .and(path(KEYS_PATH))
        .respond_with(ResponseTemplate::new(key_status).set_body_json(issuer.key_set()));
    if let Some(count) = expected_key_fetches {
        discovery = discovery.expect(count);
        keys = keys.expect(count);
    }
    discovery.mount(&directory).await;
    keys.mount(&directory).await;

    directory
}

async fn wait_until_up(client: &reqwest::Client, url: &Url) -> Result<(), TestError> {
    let mut remaining_tries = 50;

    while remaining_tries > 0 {
        let result = client
            .request(reqwest::Method::GET, url.join("/health")?)
            .send()
            .await;
        match result {
            Ok(res) => {
                return if res.text().await?.trim() == "UP" {
                    Ok(())
                } else {
                    Err(TestError::HealthCheckError)
                };
            }
            Err(e) => {
                if let Some(source) = e.source() {
                    if let Some(hyper_error) = source.downcast_ref::<hyper::Error>() {
                        if hyper_error.is_connect() {
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            remaining_tries -= 1;
                            continue;
                        }
                    }
                }
                return Err(TestError::ConnectError(e));
            }
        }
    }

    Err(TestError::HealthCheckError)
}

fn next_available_port() -> u16 {
    for _ in 0..10 {
        if let Some(port) = bind_os_available_port() {
            return port;
        }
    }

    panic!("no port available")
}

fn bind_os_available_port() -> Option<u16> {
    TcpListener::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .ok()
}
