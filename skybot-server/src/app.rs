use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use argh::FromArgs;
use axum::http::HeaderValue;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use dotenv::dotenv;
use miette::{Diagnostic, IntoDiagnostic, Result};
use skybot_core::auth::RequestAuthorizer;
use skybot_core::claims::{TrustContext, DEFAULT_ISSUER};
use skybot_core::directory::{KeyDirectoryClient, DISCOVERY_URL};
use skybot_core::{MICROSOFT_APP_ID_ENV, MICROSOFT_APP_PASSWORD_ENV};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::api::{self, webhook::DEFAULT_STRICT_TRANSPORT_SECURITY, Webhook, HEALTH_URI};
use crate::handler::{ActivityHandler, EchoActivityHandler, LogActivityHandler};
use crate::integrations::connector::{ConnectorClient, ConnectorError};
use crate::keycache::KeySetCache;
use crate::mask;

pub struct App {
    args: Args,
}

#[derive(Error, Diagnostic, Debug)]
pub enum AppError {
    #[error("required environment variable {name} is not set, required for {purpose}")]
    #[diagnostic(code(skybot::error::env))]
    MissingEnvironmentVariable { name: String, purpose: String },
    #[error("configuration error: {0}")]
    #[diagnostic(code(skybot::error::configuration))]
    ConfigurationError(#[from] skybot_core::Error),
    #[error("connector error: {0}")]
    #[diagnostic(code(skybot::error::connector))]
    ConnectorError(#[from] ConnectorError),
    #[error("invalid webhook path {0:?}, must start with '/' and not be /health")]
    #[diagnostic(code(skybot::error::configuration))]
    InvalidPath(String),
    #[error("invalid Strict-Transport-Security header value {0:?}")]
    #[diagnostic(code(skybot::error::configuration))]
    InvalidStrictTransportSecurity(String),
    #[error("--tls-cert and --tls-key must be given together")]
    #[diagnostic(code(skybot::error::configuration))]
    IncompleteTlsConfiguration,
    #[error("failed to load TLS certificate and key: {0}")]
    #[diagnostic(code(skybot::error::tls))]
    TlsConfigurationError(#[source] std::io::Error),
}

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

impl App {
    pub fn new() -> Self {
        Self::with_args(argh::from_env())
    }

    pub fn with_args(args: Args) -> Self {
        Self { args }
    }

    pub async fn run(&self) -> Result<()> {
        dotenv().ok();

        miette::set_panic_hook();

        if std::env::var_os("RUST_BACKTRACE").is_none() {
            std::env::set_var("RUST_BACKTRACE", "1")
        }

        if std::env::var_os("RUST_LOG").is_none() {
            std::env::set_var("RUST_LOG", "skybot_server=debug,skybot_core=debug")
        }

        if self.args.json {
            tracing_subscriber::fmt::fmt()
                .json()
                .with_env_filter(EnvFilter::from_default_env())
                .try_init()
                .ok();
        } else {
            tracing_subscriber::fmt::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .try_init()
                .ok();
        }

        let tls_files = self.tls_files()?;
        let webhook = Arc::new(self.webhook()?);
        let router = api::build(webhook);
        let listen_address = self.args.listen_address;

        match tls_files {
            Some((cert, key)) => {
                let tls_config = RustlsConfig::from_pem_file(cert, key)
                    .await
                    .map_err(AppError::TlsConfigurationError)?;

                let handle = Handle::new();
                tokio::spawn(shutdown_gracefully(handle.clone()));

                self.log_started("https");

                axum_server::bind_rustls(listen_address, tls_config)
                    .handle(handle)
                    .serve(router.into_make_service())
                    .await
                    .into_diagnostic()?;
            }
            None => {
                let server = axum::Server::try_bind(&listen_address)
                    .into_diagnostic()?
                    .serve(router.into_make_service_with_connect_info::<SocketAddr>());

                self.log_started("http");

                server
                    .with_graceful_shutdown(shutdown_signal())
                    .await
                    .into_diagnostic()?;
            }
        }

        tracing::debug!("server terminated");

        Ok(())
    }

    fn log_started(&self, scheme: &str) {
        tracing::debug!(
            ip = self.args.listen_address.ip().to_string().as_str(),
            port = self.args.listen_address.port(),
            path = self.args.path.as_str(),
            url = format!(
                "{}://{}:{}{}",
                scheme,
                self.args.listen_address.ip(),
                self.args.listen_address.port(),
                self.args.path
            ),
            "server started"
        );
    }

    /// Certificate and key to serve HTTPS with, if configured.
    pub fn tls_files(&self) -> Result<Option<(&Path, &Path)>, AppError> {
        match (&self.args.tls_cert, &self.args.tls_key) {
            (Some(cert), Some(key)) => Ok(Some((cert.as_path(), key.as_path()))),
            (None, None) => Ok(None),
            _ => Err(AppError::IncompleteTlsConfiguration),
        }
    }

    /// Builds the webhook from the configured arguments and environment.
    pub fn webhook(&self) -> Result<Webhook, AppError> {
        let args = &self.args;

        if !args.path.starts_with('/') || args.path == HEALTH_URI {
            return Err(AppError::InvalidPath(args.path.clone()));
        }

        let app_id = match &args.app_id {
            Some(app_id) => app_id.clone(),
            None => env_or_error(MICROSOFT_APP_ID_ENV, "token audience verification")?,
        };

        let directory = KeyDirectoryClient::with_discovery_url(&args.discovery_url)?;
        let authorizer = RequestAuthorizer::new(
            TrustContext::new(&app_id, &args.issuer),
            directory.clone(),
        );

        tracing::debug!(
            app_id = app_id.as_str(),
            issuer = args.issuer.as_str(),
            discovery_url = args.discovery_url.as_str(),
            "verifying webhook tokens"
        );

        let handler: Arc<dyn ActivityHandler> = if args.echo {
            let app_password = match &args.app_password {
                Some(app_password) => app_password.clone(),
                None => env_or_error(MICROSOFT_APP_PASSWORD_ENV, "replying to messages")?,
            };
            tracing::debug!(
                app_password = mask::secret(&app_password).as_str(),
                "echoing message activities"
            );
            Arc::new(EchoActivityHandler::new(
                ConnectorClient::new()?,
                &app_id,
                &app_password,
            ))
        } else {
            Arc::new(LogActivityHandler)
        };

        let strict_transport_security = if args.hsts.is_empty() {
            None
        } else {
            Some(
                HeaderValue::from_str(&args.hsts)
                    .map_err(|_| AppError::InvalidStrictTransportSecurity(args.hsts.clone()))?,
            )
        };

        let mut webhook = Webhook::new(&args.path, authorizer, handler)
            .with_strict_transport_security(strict_transport_security);

        if args.key_cache_ttl_seconds > 0 {
            let ttl = Duration::from_secs(args.key_cache_ttl_seconds);
            webhook = webhook.with_key_cache(KeySetCache::new(directory, ttl));
        } else {
            tracing::debug!("signing key cache disabled, keys are fetched for every request");
        }

        Ok(webhook)
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to handle Ctrl-C signal: {}", e);
        return;
    }
    tracing::info!("ctrl-c received");
}

async fn shutdown_gracefully(handle: Handle) {
    shutdown_signal().await;
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
}

#[derive(FromArgs)]
/// Bot framework webhook server.
pub struct Args {
    /// server address:port to listen on (default: 0.0.0.0:8080, PORT environment variable can override default port 8080)
    #[argh(
        option,
        default = "SocketAddr::from(([0, 0, 0, 0], default_listen_port()))"
    )]
    pub listen_address: SocketAddr,
    /// path the bot framework posts activities to (default: /, or WEBHOOK_PATH environment variable)
    #[argh(option, default = "default_path()")]
    pub path: String,
    /// the bot's application ID, tokens must be addressed to it (default: MICROSOFT_APP_ID environment variable)
    #[argh(option)]
    pub app_id: Option<String>,
    /// the bot's application password, needed to reply (default: MICROSOFT_APP_PASSWORD environment variable)
    #[argh(option)]
    pub app_password: Option<String>,
    /// trusted token issuer (default: https://api.botframework.com)
    #[argh(option, default = "DEFAULT_ISSUER.to_string()")]
    pub issuer: String,
    /// the OpenID discovery document locating the signing keys (default: bot framework well-known URL)
    #[argh(option, default = "DISCOVERY_URL.to_string()")]
    pub discovery_url: String,
    /// seconds to reuse fetched signing keys for, 0 fetches them for every request (default: 0, or KEY_CACHE_TTL_SECONDS environment variable)
    #[argh(option, default = "default_key_cache_ttl_seconds()")]
    pub key_cache_ttl_seconds: u64,
    /// the Strict-Transport-Security response header value, empty to omit (default: max-age=63072000; includeSubDomains)
    #[argh(option, default = "DEFAULT_STRICT_TRANSPORT_SECURITY.to_string()")]
    pub hsts: String,
    /// PEM certificate chain to serve HTTPS with, requires --tls-key
    #[argh(option)]
    pub tls_cert: Option<PathBuf>,
    /// PEM private key for --tls-cert
    #[argh(option)]
    pub tls_key: Option<PathBuf>,
    /// reply to message activities with their own text
    #[argh(switch)]
    pub echo: bool,
    /// use JSON for log messages
    #[argh(switch)]
    pub json: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([127, 0, 0, 1], default_listen_port())),
            path: default_path(),
            app_id: None,
            app_password: None,
            issuer: DEFAULT_ISSUER.to_string(),
            discovery_url: DISCOVERY_URL.to_string(),
            key_cache_ttl_seconds: default_key_cache_ttl_seconds(),
            hsts: DEFAULT_STRICT_TRANSPORT_SECURITY.to_string(),
            tls_cert: None,
            tls_key: None,
            echo: false,
            json: false,
        }
    }
}

const DEFAULT_LISTEN_PORT: u16 = 8080;

fn default_listen_port() -> u16 {
    if let Ok(port_str) = std::env::var("PORT") {
        if let Ok(port) = port_str.parse() {
            tracing::debug!("using port from PORT environment variable");
            port
        } else {
            DEFAULT_LISTEN_PORT
        }
    } else {
        DEFAULT_LISTEN_PORT
    }
}

const DEFAULT_PATH: &str = "/";

fn default_path() -> String {
    if let Ok(value) = std::env::var("WEBHOOK_PATH") {
        value
    } else {
        DEFAULT_PATH.to_string()
    }
}

const DEFAULT_KEY_CACHE_TTL_SECONDS: u64 = 0;

fn default_key_cache_ttl_seconds() -> u64 {
    if let Ok(value) = std::env::var("KEY_CACHE_TTL_SECONDS") {
        value.parse().ok().unwrap_or(DEFAULT_KEY_CACHE_TTL_SECONDS)
    } else {
        DEFAULT_KEY_CACHE_TTL_SECONDS
    }
}

fn env_or_error(name: &str, purpose: &str) -> Result<String, AppError> {
    if let Ok(value) = std::env::var(name) {
        Ok(value)
    } else {
        Err(AppError::MissingEnvironmentVariable {
            name: name.to_string(),
            purpose: purpose.to_string(),
        })
    }
}
