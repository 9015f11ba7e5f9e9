use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::credentials::{CredentialFile, CredentialGuardian};
use crate::oauth::{ClientSecrets, OAuthManager};
use crate::playlist::PlaylistClient;
use crate::readiness::ReadinessState;
use crate::youtube_api::YouTubeClient;
use eyre::Context;
use std::sync::Arc;

pub mod config;
pub mod console;
pub mod cooldown;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod health;
pub mod oauth;
pub mod playlist;
pub mod readiness;
pub mod youtube_api;

pub use error::{Error, Result};

/// Everything a transport needs to feed events into, wired together.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub coordinator: Arc<Coordinator>,
    pub credentials: Arc<CredentialGuardian>,
    pub readiness: Arc<ReadinessState>,
}

/// Builds the OAuth manager from the configured client secrets file.
pub fn oauth_manager(config: &Config) -> eyre::Result<OAuthManager> {
    let secrets = ClientSecrets::from_file(&config.client_secrets_path)?;
    OAuthManager::new(secrets, config.request_timeout)
}

/// Complete pipeline setup shared by the `run` and `add` subcommands.
///
/// A missing or dead credential does not fail setup: the bot comes up not-ready and tells
/// whoever talks to it to re-authenticate.
pub async fn setup_pipeline(config: &Config) -> eyre::Result<Pipeline> {
    let playlist_id = config.require_playlist_id()?;
    let readiness = Arc::new(ReadinessState::new());

    // ==============================================================================
    // Credentials
    // ==============================================================================
    // The guardian owns the token from here on. Asking for it once up front refreshes a stale
    // stored token and decides initial readiness.
    let oauth = oauth_manager(config).context("set up OAuth")?;
    let credentials = Arc::new(
        CredentialGuardian::load(
            CredentialFile::new(&config.credentials_path),
            oauth,
            Arc::clone(&readiness),
        )
        .await
        .context("load YouTube credentials")?,
    );
    match credentials.current().await {
        Ok(_) => tracing::info!("YouTube credentials are usable"),
        Err(e) => tracing::warn!(error = %e, "starting without usable YouTube credentials"),
    }

    // ==============================================================================
    // Playlist client
    // ==============================================================================
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("build YouTube HTTP client")?;
    let playlist = PlaylistClient::new(YouTubeClient::new(http), Arc::clone(&credentials), playlist_id)
        .with_retry(config.retry.clone())
        .with_max_duration(config.max_video_duration);

    let coordinator = Arc::new(Coordinator::new(
        playlist,
        Arc::clone(&readiness),
        config.coordinator_settings(),
    ));

    Ok(Pipeline {
        coordinator,
        credentials,
        readiness,
    })
}
