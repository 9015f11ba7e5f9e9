//! Idempotent appends to the shared playlist.
//!
//! Every call asks the credential guardian for a bearer token, classifies failures through
//! [`Error`], and retries according to [`RetryConfig`]: transient failures back off
//! exponentially, a rejected token gets exactly one forced refresh.

mod retry;

pub use retry::RetryConfig;

use crate::credentials::CredentialGuardian;
use crate::error::{Error, Result};
use crate::extract::VideoRef;
use crate::youtube_api::{Video, YouTubeClient, format_duration};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::instrument;

/// What the bot tells people about a video it added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetails {
    pub video: VideoRef,
    pub title: String,
    pub channel_title: String,
    pub duration: Option<Duration>,
    pub thumbnail_url: Option<String>,
}

impl VideoDetails {
    fn from_video(video: VideoRef, raw: Video) -> Self {
        Self {
            duration: raw.duration(),
            thumbnail_url: raw.snippet.thumbnails.best().map(|t| t.url.clone()),
            title: raw.snippet.title,
            channel_title: raw.snippet.channel_title,
            video,
        }
    }

    /// `m:ss` or `h:mm:ss`.
    pub fn formatted_duration(&self) -> Option<String> {
        self.duration.map(format_duration)
    }
}

/// Outcome of a successful [`PlaylistClient::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendResult {
    /// The playlist already had the video and was left untouched.
    pub already_present: bool,
    /// Metadata of the video, looked up only when it was actually added.
    pub details: Option<VideoDetails>,
}

#[derive(Debug)]
pub struct PlaylistClient {
    yt: YouTubeClient,
    credentials: Arc<CredentialGuardian>,
    playlist_id: String,
    retry: RetryConfig,
    max_duration: Option<Duration>,
}

impl PlaylistClient {
    pub fn new(
        yt: YouTubeClient,
        credentials: Arc<CredentialGuardian>,
        playlist_id: impl Into<String>,
    ) -> Self {
        Self {
            yt,
            credentials,
            playlist_id: playlist_id.into(),
            retry: RetryConfig::default(),
            max_duration: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Refuses videos longer than `limit`.
    pub fn with_max_duration(mut self, limit: Duration) -> Self {
        self.max_duration = Some(limit);
        self
    }

    pub fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    pub fn max_duration(&self) -> Option<Duration> {
        self.max_duration
    }

    /// Whether `video` is already somewhere in the playlist.
    ///
    /// Pages through the playlist and stops at the first page that has it.
    #[instrument(skip_all, fields(video = %video))]
    pub async fn contains(&self, video: &VideoRef) -> Result<bool> {
        self.retrying("playlistItems.list", |access_token| async move {
            self.scan(&access_token, video).await
        })
        .await
    }

    /// One pass over the playlist looking for `video`.
    async fn scan(&self, access_token: &str, video: &VideoRef) -> Result<bool> {
        let items = self.yt.list_playlist_items(access_token, &self.playlist_id);
        let mut items = std::pin::pin!(items);
        while let Some(item) = items.next().await {
            if item?.video_id() == Some(video.id()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Looks up title, channel, duration and thumbnail of `video`.
    #[instrument(skip_all, fields(video = %video))]
    pub async fn details(&self, video: &VideoRef) -> Result<VideoDetails> {
        let raw = self
            .retrying("videos.list", |access_token| async move {
                self.yt.get_video(&access_token, video.id()).await
            })
            .await?;
        Ok(VideoDetails::from_video(video.clone(), raw))
    }

    /// Adds `video` to the end of the playlist unless it is already there.
    ///
    /// Presence is checked right before inserting, but nothing stops a concurrent writer from
    /// adding the same video in between.
    #[instrument(skip_all, fields(video = %video))]
    pub async fn append(&self, video: &VideoRef) -> Result<AppendResult> {
        if self.contains(video).await? {
            tracing::info!("video already in playlist");
            return Ok(AppendResult {
                already_present: true,
                details: None,
            });
        }

        let details = self.details(video).await?;
        if let Some(limit) = self.max_duration
            && let Some(duration) = details.duration
            && duration > limit
        {
            tracing::info!(
                seconds = duration.as_secs(),
                limit = limit.as_secs(),
                "video too long for playlist"
            );
            return Err(Error::TooLong {
                seconds: duration.as_secs(),
                limit_seconds: limit.as_secs(),
            });
        }

        // An insert whose response got lost may still have landed, so every retry looks
        // before it inserts again.
        let attempted = &AtomicBool::new(false);
        self.retrying("playlistItems.insert", |access_token| async move {
            if attempted.swap(true, Ordering::Relaxed) && self.scan(&access_token, video).await? {
                tracing::info!("earlier insert landed after all");
                return Ok(());
            }
            self.yt
                .insert_playlist_item(&access_token, &self.playlist_id, video.id())
                .await
                .map(drop)
        })
        .await?;

        tracing::info!(title = %details.title, "added video to playlist");
        Ok(AppendResult {
            already_present: false,
            details: Some(details),
        })
    }

    /// Runs `op` with a live bearer token, applying the retry policy.
    ///
    /// Fetching or refreshing the token counts as part of the attempt, so a token endpoint
    /// hiccup is retried like any other transient failure.
    async fn retrying<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut refreshed = false;
        let mut attempt = 0;

        loop {
            let result = match self.credentials.current().await {
                Ok(access_token) => match op(access_token.clone()).await {
                    Err(Error::Auth(reason)) if !refreshed => {
                        tracing::info!(operation, %reason, "access token rejected, refreshing once");
                        refreshed = true;
                        match self.credentials.refresh_rejected(&access_token).await {
                            Ok(_) => continue,
                            Err(e) => Err(e),
                        }
                    }
                    result => result,
                },
                Err(e) => Err(e),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "YouTube call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::warn!(operation, attempts = attempt + 1, error = %e, "giving up");
                    }
                    return Err(e);
                }
            }
        }
    }
}
