//! Core YouTube API client functionality.

use crate::error::{Error, Result};
use crate::youtube_api::{
    playlist_items::{PlaylistItem, PlaylistItemInsertRequest, PlaylistItemListResponse},
    types::PagedStream,
    videos::{Video, VideoListResponse},
};
use http::Method;
use serde::Serialize;
use tokio_stream::Stream;
use tracing::instrument;

/// Base URL of the YouTube Data API v3.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Largest page size `playlistItems.list` accepts.
const MAX_PAGE_SIZE: u32 = 50;

/// Client for interacting with the YouTube Data API v3.
///
/// The client holds no credentials. Every call takes the bearer token to use, so whoever owns
/// the credential (see [`crate::credentials::CredentialGuardian`]) decides when it is refreshed
/// and the client never hands out a stale copy.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    /// HTTP client for API requests
    client: reqwest::Client,
    /// Scheme, host and path prefix every endpoint is resolved against
    api_base: String,
}

impl YouTubeClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Points the client at a different API host, e.g. a local mock server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, resource: &str) -> String {
        format!("{}/{resource}", self.api_base)
    }

    /// Makes an authenticated HTTP request to the YouTube API with common error handling.
    ///
    /// This method consolidates the shared logic across all YouTube API requests:
    /// - Authorization header setup
    /// - Query parameters (for both GET and POST requests)
    /// - JSON body (for POST requests that need a body)
    /// - Status code validation and classification into [`Error`]
    ///
    /// # Returns
    ///
    /// The raw [`reqwest::Response`] for method-specific JSON parsing.
    #[instrument(skip(self, access_token, json_body), level = tracing::Level::TRACE)]
    pub(crate) async fn make_authenticated_request(
        &self,
        method: Method,
        url: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
        json_body: Option<&impl Serialize>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(access_token);

        if let Some(params) = query_params {
            request = request.query(params);
        }

        if let Some(body) = json_body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            Error::from_reqwest(e, &format!("send {method} request to YouTube API"))
        })?;

        let status_code = response.status();
        if !status_code.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            tracing::debug!(%method, %status_code, "YouTube API request failed");
            return Err(Error::from_api_response(status_code, &error_text));
        }

        Ok(response)
    }

    /// Returns a paginated stream of every item in `playlist_id`.
    ///
    /// Uses `playlistItems.list` with `part=contentDetails`, which is all that is needed to
    /// learn which videos the playlist holds. Pages are only fetched as the stream is polled.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    pub fn list_playlist_items<'a>(
        &'a self,
        access_token: &'a str,
        playlist_id: &'a str,
    ) -> impl Stream<Item = Result<PlaylistItem>> + use<'a> {
        PagedStream::new(move |page_token| async move {
            let response = self
                .list_playlist_items_internal(access_token, playlist_id, MAX_PAGE_SIZE, page_token)
                .await?;
            Ok((response.items, response.next_page_token))
        })
    }

    /// Appends `video_id` to the end of `playlist_id`.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/playlistItems/insert>
    #[instrument(skip(self, access_token))]
    pub async fn insert_playlist_item(
        &self,
        access_token: &str,
        playlist_id: &str,
        video_id: &str,
    ) -> Result<PlaylistItem> {
        let url = self.endpoint("playlistItems");
        let query_params = [("part", "snippet")];
        let body = PlaylistItemInsertRequest::video(playlist_id, video_id);

        let response = self
            .make_authenticated_request(
                Method::POST,
                &url,
                access_token,
                Some(&query_params),
                Some(&body),
            )
            .await?;

        let item: PlaylistItem = response
            .json()
            .await
            .map_err(|e| Error::from_reqwest(e, "parse playlistItems.insert response"))?;

        tracing::debug!(item_id = item.id, "inserted playlist item");
        Ok(item)
    }

    /// Fetches title, channel, thumbnails and duration of a single video.
    ///
    /// Unknown, private and deleted videos come back as an empty list, which is reported as
    /// [`Error::Permanent`] since asking again will not help.
    ///
    /// # API Reference
    ///
    /// <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self, access_token))]
    pub async fn get_video(&self, access_token: &str, video_id: &str) -> Result<Video> {
        let url = self.endpoint("videos");
        let query_params = [("part", "snippet,contentDetails"), ("id", video_id)];

        let response = self
            .make_authenticated_request(
                Method::GET,
                &url,
                access_token,
                Some(&query_params),
                None::<&()>,
            )
            .await?;

        let mut videos: VideoListResponse = response
            .json()
            .await
            .map_err(|e| Error::from_reqwest(e, "parse videos.list response"))?;

        videos
            .items
            .pop_front()
            .ok_or_else(|| Error::Permanent(format!("video {video_id} not found or not public")))
    }

    #[instrument(skip(self, access_token), level = tracing::Level::DEBUG)]
    async fn list_playlist_items_internal(
        &self,
        access_token: &str,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> Result<PlaylistItemListResponse> {
        let url = self.endpoint("playlistItems");
        let max_results_str = max_results.to_string();

        let mut query_params = vec![
            ("part", "contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max_results_str.as_str()),
        ];
        if let Some(token) = page_token.as_deref() {
            query_params.push(("pageToken", token));
        }

        let response = self
            .make_authenticated_request(
                Method::GET,
                &url,
                access_token,
                Some(&query_params),
                None::<&()>,
            )
            .await?;

        let items: PlaylistItemListResponse = response
            .json()
            .await
            .map_err(|e| Error::from_reqwest(e, "parse playlistItems.list response"))?;

        tracing::debug!(
            total_results = items.page_info.total_results,
            returned_items = items.items.len(),
            "fetched playlist items"
        );

        Ok(items)
    }
}
