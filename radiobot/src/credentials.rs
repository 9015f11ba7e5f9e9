//! Ownership of the YouTube credential: expiry tracking, refresh, persistence and the
//! "somebody has to log in again" state.

use crate::error::{Error, Result};
use crate::oauth::OAuthManager;
use crate::readiness::ReadinessState;
use eyre::Context;
use jiff::Timestamp;
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Access tokens are treated as expired this long before Google says they are.
const EXPIRY_BUFFER: Duration = Duration::from_secs(300);

/// Assumed lifetime when the token endpoint does not say.
const DEFAULT_LIFETIME: Duration = Duration::from_secs(3300);

/// An OAuth token together with the moment it stops being usable.
///
/// This is also the on-disk format of the credential file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeBoundAccessToken {
    token: BasicTokenResponse,
    /// When the current access token expires (with safety buffer)
    expires_at: Timestamp,
}

impl TimeBoundAccessToken {
    /// Creates a new token with calculated expiry time.
    ///
    /// The expiry time is calculated from the token's `expires_in` field minus
    /// a 5-minute safety buffer to prevent edge-case failures.
    pub fn new(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: Self::calculate_token_expiry(&token),
            token,
        }
    }

    /// Creates a token that is already expired, forcing a refresh before first use.
    pub fn expired(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: Timestamp::UNIX_EPOCH,
            token,
        }
    }

    pub fn raw_token(&self) -> &BasicTokenResponse {
        &self.token
    }

    pub fn access_token(&self) -> &str {
        self.token.access_token().secret()
    }

    pub fn expires_at(&self) -> Timestamp {
        self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        Timestamp::now() >= self.expires_at
    }

    fn expire(&mut self) {
        self.expires_at = Timestamp::UNIX_EPOCH;
    }

    /// Refreshes this token using the provided OAuth manager, preserving the refresh token.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Token was successfully refreshed
    /// * `Ok(false)` - Refresh failed (invalid grant, no refresh token, etc.)
    /// * `Err(_)` - Network or other error occurred
    pub async fn refresh(&mut self, oauth_manager: &OAuthManager) -> Result<bool> {
        tracing::trace!("refreshing token");
        match oauth_manager.refresh_token(&self.token).await? {
            Some(new_token) => {
                let old_token = std::mem::replace(&mut self.token, new_token);

                // If the new token doesn't have a refresh token, preserve the original one
                if self.token.refresh_token().is_none() {
                    tracing::trace!("new token lacks refresh token, preserving original");
                    self.token
                        .set_refresh_token(old_token.refresh_token().cloned());
                } else {
                    tracing::debug!("new token includes refresh token");
                }

                self.expires_at = Self::calculate_token_expiry(&self.token);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn calculate_token_expiry(token: &BasicTokenResponse) -> Timestamp {
        let lifetime = token
            .expires_in()
            .map_or(DEFAULT_LIFETIME, |expires_in| {
                expires_in.saturating_sub(EXPIRY_BUFFER)
            });
        Timestamp::now()
            .checked_add(lifetime)
            .unwrap_or(Timestamp::MAX)
    }
}

/// The JSON file the credential lives in between runs.
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored credential; a missing file is `Ok(None)`.
    pub async fn load(&self) -> eyre::Result<Option<TimeBoundAccessToken>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("read credentials from {}", self.path.display()));
            }
        };
        let token = serde_json::from_str(&raw)
            .with_context(|| format!("parse credentials in {}", self.path.display()))?;
        Ok(Some(token))
    }

    /// Writes the credential, replacing the file atomically.
    pub async fn save(&self, token: &TimeBoundAccessToken) -> eyre::Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create credential directory {}", dir.display()))?;
        }
        let json = serde_json::to_vec_pretty(token).context("serialize credentials")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Debug)]
enum CredentialState {
    Valid(TimeBoundAccessToken),
    /// `stale` is the access token that stopped working, so that re-reading a credential file
    /// that still holds it does not count as re-authentication.
    ReauthRequired { stale: Option<String> },
}

/// Sole owner of the YouTube credential.
///
/// Hands out live bearer tokens, refreshes them at most once at a time, and flips the process
/// to not-ready when the credential is beyond saving. Refreshes happen under the write lock, so
/// nobody observes a token while it is being replaced.
#[derive(Debug)]
pub struct CredentialGuardian {
    state: RwLock<CredentialState>,
    oauth: OAuthManager,
    file: Option<CredentialFile>,
    readiness: Arc<ReadinessState>,
}

impl CredentialGuardian {
    pub fn new(
        token: Option<TimeBoundAccessToken>,
        oauth: OAuthManager,
        file: Option<CredentialFile>,
        readiness: Arc<ReadinessState>,
    ) -> Self {
        let state = match token {
            Some(token) => {
                readiness.set_ready(!token.is_expired());
                CredentialState::Valid(token)
            }
            None => {
                readiness.set_ready(false);
                CredentialState::ReauthRequired { stale: None }
            }
        };
        Self {
            state: RwLock::new(state),
            oauth,
            file,
            readiness,
        }
    }

    /// Builds a guardian from whatever is stored in `file`.
    pub async fn load(
        file: CredentialFile,
        oauth: OAuthManager,
        readiness: Arc<ReadinessState>,
    ) -> eyre::Result<Self> {
        let token = file.load().await?;
        if token.is_none() {
            tracing::warn!(path = %file.path().display(), "no stored YouTube credentials");
        }
        Ok(Self::new(token, oauth, Some(file), readiness))
    }

    /// Returns a bearer token that is good for at least a few more minutes.
    pub async fn current(&self) -> Result<String> {
        {
            let state = self.state.read().await;
            if let CredentialState::Valid(token) = &*state
                && !token.is_expired()
            {
                return Ok(token.access_token().to_string());
            }
        }

        let mut state = self.state.write().await;
        // Another task may have refreshed while we waited for the lock.
        self.ensure_fresh(&mut state).await
    }

    /// Called after the API answered 401/403 for `rejected`.
    ///
    /// Refreshes unless another task already replaced that token, in which case the
    /// replacement is returned.
    pub async fn refresh_rejected(&self, rejected: &str) -> Result<String> {
        let mut state = self.state.write().await;
        if let CredentialState::Valid(token) = &mut *state
            && token.access_token() == rejected
        {
            tracing::debug!("access token rejected by the API, forcing refresh");
            token.expire();
        }
        self.ensure_fresh(&mut state).await
    }

    /// Drops the credential; only a new OAuth flow gets the bot working again.
    pub async fn force_reauth(&self) {
        let mut state = self.state.write().await;
        let stale = match &*state {
            CredentialState::Valid(token) => Some(token.access_token().to_string()),
            CredentialState::ReauthRequired { stale } => stale.clone(),
        };
        self.enter_reauth(&mut state, stale);
    }

    /// Installs a token obtained from a fresh OAuth flow.
    ///
    /// The token is used from now on even if writing it to the credential file fails; that
    /// failure is returned so the caller can tell the operator.
    pub async fn reauthenticated(&self, token: BasicTokenResponse) -> eyre::Result<()> {
        let token = TimeBoundAccessToken::new(token);
        let mut state = self.state.write().await;
        let persisted = self.persist(&token).await;
        *state = CredentialState::Valid(token);
        tracing::info!("YouTube credentials re-authenticated");
        self.readiness.set_ready(true);
        persisted
    }

    pub async fn is_valid(&self) -> bool {
        matches!(&*self.state.read().await, CredentialState::Valid(_))
    }

    async fn ensure_fresh(&self, state: &mut CredentialState) -> Result<String> {
        if let CredentialState::ReauthRequired { stale } = &*state {
            let token = self
                .reload(stale.as_deref())
                .await
                .ok_or(Error::ReauthRequired)?;
            tracing::info!("picked up re-authenticated YouTube credentials from disk");
            *state = CredentialState::Valid(token);
        }

        let CredentialState::Valid(token) = &mut *state else {
            return Err(Error::ReauthRequired);
        };

        if token.is_expired() {
            tracing::debug!("access token expired, attempting refresh");
            match token.refresh(&self.oauth).await {
                Ok(true) => {
                    tracing::debug!("access token successfully refreshed");
                    if let Err(e) = self.persist(token).await {
                        tracing::warn!(error = %e, "could not persist refreshed credentials");
                    }
                }
                Ok(false) => {
                    let stale = token.access_token().to_string();
                    self.enter_reauth(state, Some(stale));
                    return Err(Error::ReauthRequired);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not refresh access token");
                    return Err(e);
                }
            }
        }

        self.readiness.set_ready(true);
        Ok(token.access_token().to_string())
    }

    fn enter_reauth(&self, state: &mut CredentialState, stale: Option<String>) {
        if matches!(state, CredentialState::Valid(_)) {
            tracing::error!("{}", crate::error::REAUTH_HINT);
        }
        *state = CredentialState::ReauthRequired { stale };
        self.readiness.set_ready(false);
    }

    /// Re-reads the credential file, accepting it only if it holds something new.
    async fn reload(&self, stale: Option<&str>) -> Option<TimeBoundAccessToken> {
        let file = self.file.as_ref()?;
        match file.load().await {
            Ok(Some(token)) if Some(token.access_token()) != stale => Some(token),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(error = %e, "could not re-read credential file");
                None
            }
        }
    }

    async fn persist(&self, token: &TimeBoundAccessToken) -> eyre::Result<()> {
        match &self.file {
            Some(file) => file.save(token).await,
            None => Ok(()),
        }
    }
}
