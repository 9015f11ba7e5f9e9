//! Failure taxonomy for the ingestion pipeline.
//!
//! Every failure the pipeline can report to a user maps to exactly one variant here. The
//! variant decides whether the playlist client retries, refreshes credentials, or gives up.

use reqwest::StatusCode;
use serde::Deserialize;

/// Shown to users and operators whenever the stored credential can no longer be used.
pub const REAUTH_HINT: &str = "Google credentials invalid or expired. Re-auth by running \
    `radiobot auth` (or `docker compose run --rm radiobot auth`). \
    This opens a local URL to complete OAuth and regenerates the credential file.";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input did not contain a recognizable YouTube video link.
    #[error("no valid YouTube video URL found")]
    Validation,

    /// Network failure, timeout, rate limit or server-side error.
    #[error("temporary YouTube API failure: {0}")]
    Transient(String),

    /// The API rejected the access token.
    #[error("YouTube rejected the credentials: {0}")]
    Auth(String),

    /// The credential could not be refreshed and an operator has to re-run the OAuth flow.
    #[error("{}", REAUTH_HINT)]
    ReauthRequired,

    /// Malformed request or a response we cannot make sense of.
    #[error("YouTube API error: {0}")]
    Permanent(String),

    /// The video exceeds the configured maximum duration.
    #[error("video runs {seconds} seconds, over the {limit_seconds} second limit")]
    TooLong { seconds: u64, limit_seconds: u64 },
}

impl Error {
    /// Whether the same request may succeed if simply sent again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Whether this failure should be reported as "somebody needs to re-authenticate".
    pub fn needs_reauth(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::ReauthRequired)
    }

    /// Classifies a transport-level failure from `reqwest`.
    pub(crate) fn from_reqwest(error: reqwest::Error, context: &str) -> Self {
        if error.is_builder() || error.is_decode() {
            Error::Permanent(format!("{context}: {error}"))
        } else {
            // timeouts, refused connections, resets and truncated bodies
            Error::Transient(format!("{context}: {error}"))
        }
    }

    /// Classifies a non-success response from the YouTube Data API.
    pub(crate) fn from_api_response(status: StatusCode, body: &str) -> Self {
        let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();
        let message = parsed
            .as_ref()
            .map(|e| e.error.message.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.trim().to_string());
        let rate_limited = parsed.as_ref().is_some_and(|e| {
            e.error.errors.iter().any(|detail| {
                matches!(
                    detail.reason.as_str(),
                    "quotaExceeded" | "rateLimitExceeded" | "userRateLimitExceeded"
                )
            })
        });

        match status {
            StatusCode::UNAUTHORIZED => Error::Auth(message),
            StatusCode::FORBIDDEN if rate_limited => {
                Error::Transient(format!("rate limited: {message}"))
            }
            StatusCode::FORBIDDEN => Error::Auth(message),
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
                Error::Transient(format!("status {status}: {message}"))
            }
            s if s.is_server_error() => Error::Transient(format!("status {status}: {message}")),
            _ => Error::Permanent(format!("status {status}: {message}")),
        }
    }
}

/// Error envelope returned by Google APIs.
///
/// See: <https://developers.google.com/youtube/v3/docs/errors>
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}
