//! OAuth 2.0 management for YouTube API authentication.
//!
//! This module encapsulates the interactive authorization flow used by the `auth` subcommand and
//! the token refresh used by the credential guardian while the bot is running.

use crate::error::{Error, Result};
use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// Google OAuth2 token endpoint URL used for both initial authentication and token refresh
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Scope needed to read and modify playlists.
const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";

const OAUTH_DONE_HTML: &str = "<!doctype html>\
    <html><head><title>radiobot</title></head>\
    <body><p>Authorization complete. You can close this tab and return to the terminal.</p></body>\
    </html>";

/// The OAuth client a Google Cloud project issues for an installed application.
///
/// Loaded from the `client_secrets.json` file the Google Cloud console lets you download.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Reads a Google `client_secrets.json`, accepting both "installed" and "web" clients.
    pub fn from_file(path: &Path) -> eyre::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read OAuth client secrets from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parse {}", path.display()))
    }

    pub fn from_json(raw: &str) -> eyre::Result<Self> {
        let file: ClientSecretsFile =
            serde_json::from_str(raw).context("client secrets are not valid JSON")?;
        file.installed
            .or(file.web)
            .ok_or_else(|| eyre::eyre!("client secrets have neither an `installed` nor a `web` client"))
    }
}

/// Manages OAuth 2.0 authentication flows for YouTube API access.
///
/// The OAuthManager encapsulates all OAuth operations, providing a consistent interface
/// for both initial user authentication and token refresh operations.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    secrets: ClientSecrets,
    token_url: TokenUrl,
    http: reqwest::Client,
}

impl OAuthManager {
    /// Creates a new OAuth manager for the given client.
    ///
    /// `timeout` bounds every request made to the token endpoint.
    pub fn new(secrets: ClientSecrets, timeout: Duration) -> eyre::Result<Self> {
        let token_url = TokenUrl::new(
            secrets
                .token_uri
                .clone()
                .unwrap_or_else(|| TOKEN_URL.to_string()),
        )
        .context("parse token endpoint URL")?;
        let http = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .context("build OAuth HTTP client")?;
        Ok(Self {
            secrets,
            token_url,
            http,
        })
    }

    /// Sends token requests somewhere other than the configured endpoint, e.g. a local mock.
    pub fn with_token_url(mut self, token_url: &str) -> eyre::Result<Self> {
        self.token_url = TokenUrl::new(token_url.to_string()).context("parse token endpoint URL")?;
        Ok(self)
    }

    /// Performs a complete OAuth 2.0 authorization flow to obtain a new access token.
    ///
    /// This method initiates the full OAuth flow, including:
    /// 1. Setting up a local HTTP server on `port` to receive the authorization callback
    /// 2. Pointing the operator's browser (or terminal) at the consent screen
    /// 3. Exchanging the authorization code for an access token
    ///
    /// Port 0 picks any free port.
    pub async fn authenticate(&self, port: u16) -> eyre::Result<BasicTokenResponse> {
        let csrf = CsrfToken::new_random();
        let (redirect_url, eventually_authorization_code) = setup_redirect(port, csrf.clone())
            .await
            .context("set up redirect endpoint")?;

        let auth_url = AuthUrl::new(AUTH_URL.to_string()).context("parse authorization URL")?;
        let client = BasicClient::new(ClientId::new(self.secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.secrets.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(redirect_url);

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (auth_url, _csrf_token) = client
            // We never re-use the CSRF since we only go through the flow exactly once.
            .authorize_url(move || csrf.clone())
            .add_scope(Scope::new(YOUTUBE_SCOPE.to_string()))
            // Without these Google only hands out a refresh token on first consent.
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .set_pkce_challenge(pkce_challenge)
            .url();

        tracing::info!(url = %auth_url, "open this URL to authorize radiobot");
        println!("Open this URL in a browser to authorize radiobot:\n\n    {auth_url}\n");
        if let Err(e) = webbrowser::open(auth_url.as_ref()) {
            tracing::debug!(error = %e, "could not open a browser, waiting for manual visit");
        }

        let authorization_code = eventually_authorization_code
            .await
            .context("await user authorization code")?;

        let token_result = client
            .exchange_code(authorization_code)
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http)
            .await
            .context("exchange authorization code with access token")?;

        if token_result.refresh_token().is_none() {
            tracing::warn!("Google did not return a refresh token; the credential will not survive expiry");
        }

        Ok(token_result)
    }

    /// Attempts to refresh an existing OAuth token using its refresh token.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(new_token))` - Refresh succeeded, new token is available
    /// * `Ok(None)` - The grant is gone (revoked, expired, no refresh token): re-authenticate
    /// * `Err(Error::Transient)` - The token endpoint could not be reached; try again later
    /// * `Err(Error::Permanent)` - The token endpoint answered with something unexpected
    pub async fn refresh_token(
        &self,
        token: &BasicTokenResponse,
    ) -> Result<Option<BasicTokenResponse>> {
        let Some(refresh_token) = token.refresh_token() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Ok(None);
        };

        tracing::debug!("attempting to refresh OAuth token");

        // Create a minimal OAuth client for token refresh (no redirect URL needed)
        let client = BasicClient::new(ClientId::new(self.secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.secrets.client_secret.clone()))
            .set_token_uri(self.token_url.clone());

        match client
            .exchange_refresh_token(refresh_token)
            .request_async(&self.http)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(RequestTokenError::ServerResponse(sr))
                if matches!(
                    sr.error(),
                    BasicErrorResponseType::InvalidGrant
                        | BasicErrorResponseType::InvalidClient
                        | BasicErrorResponseType::UnauthorizedClient
                        | BasicErrorResponseType::InvalidScope
                ) =>
            {
                tracing::warn!(error = %sr, "OAuth refresh token rejected");
                Ok(None)
            }
            Err(RequestTokenError::ServerResponse(sr)) => Err(Error::Permanent(format!(
                "token endpoint refused refresh: {sr}"
            ))),
            Err(RequestTokenError::Request(e)) => {
                Err(Error::Transient(format!("reach token endpoint: {e}")))
            }
            Err(RequestTokenError::Parse(e, _)) => Err(Error::Transient(format!(
                "unreadable token endpoint response: {e}"
            ))),
            Err(RequestTokenError::Other(e)) => {
                Err(Error::Transient(format!("token endpoint: {e}")))
            }
        }
    }
}

/// Sets up a local HTTP server to receive the OAuth authorization callback.
///
/// The server validates the CSRF token and extracts the authorization code from the callback.
///
/// # Returns
///
/// A tuple containing:
/// - The redirect URL to use in the OAuth flow
/// - A future that resolves to the authorization code when the callback is received
async fn setup_redirect(
    port: u16,
    csrf: CsrfToken,
) -> eyre::Result<(
    RedirectUrl,
    impl Future<Output = eyre::Result<AuthorizationCode>>,
)> {
    let socket = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("bind to localhost:{port}"))?;
    let addr = socket.local_addr().context("get local address")?;
    let url = RedirectUrl::new(format!("http://{}:{}", addr.ip(), addr.port()))
        .context("construct redirect url")?;
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let r = async move {
            let (got, mut gotten) = tokio::sync::mpsc::channel(1);
            // Browsers like to ask for /favicon.ico first, so keep accepting until a callback
            // with a code arrives.
            loop {
                let (conn, _) = socket.accept().await.context("accept")?;
                let conn = hyper_util::rt::TokioIo::new(conn);
                let csrf = csrf.clone();
                let got = got.clone();
                let service = service_fn(move |req: Request<body::Incoming>| {
                    let csrf = csrf.clone();
                    let got = got.clone();
                    async move {
                        let mut presented_state = None;
                        let mut presented_code = None;
                        for (k, v) in
                            form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
                        {
                            match &*k {
                                "state" => presented_state = Some(v),
                                "code" => presented_code = Some(v),
                                _ => {}
                            }
                        }
                        if presented_state.as_deref() != Some(csrf.secret().as_str()) {
                            return Ok::<_, std::convert::Infallible>(bad_request(
                                "invalid or missing state",
                            ));
                        }
                        let Some(code) = presented_code else {
                            return Ok(bad_request("no authorization code found"));
                        };
                        let _ = got.send(AuthorizationCode::new(code.into_owned())).await;
                        Ok(Response::new(Full::<Bytes>::from(OAUTH_DONE_HTML)))
                    }
                });
                let serve = hyper::server::conn::http1::Builder::new()
                    .keep_alive(false)
                    .serve_connection(conn, service);
                if let Err(e) = serve.await {
                    tracing::debug!(error = %e, "redirect connection failed");
                }
                if let Ok(code) = gotten.try_recv() {
                    return Ok(code);
                }
            }
        };
        let _ = tx.send(r.await);
    });
    Ok((url, async move {
        rx.await.context("redirect future dropped prematurely")?
    }))
}

fn bad_request(message: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::from(message));
    *response.status_mut() = http::StatusCode::BAD_REQUEST;
    response
}
