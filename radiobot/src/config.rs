//! Runtime configuration read from the environment (and `.env`, loaded by the binary).
//!
//! Parsing is forgiving: a value that does not parse is logged and replaced by its default,
//! so a typo in an optional knob never keeps the bot from starting.

use crate::coordinator::{CoordinatorSettings, DEFAULT_KEYWORD};
use crate::playlist::RetryConfig;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_VIDEO_DURATION_SECONDS: u64 = 10 * 60;
const DEFAULT_COOLDOWN_SECONDS: u64 = 30;
const DEFAULT_HEALTH_HOST: &str = "0.0.0.0";
const DEFAULT_HEALTH_PORT: u16 = 8081;
const DEFAULT_OAUTH_PORT: u16 = 8080;
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub playlist_id: Option<String>,
    pub playlist_url: Option<String>,
    pub channel_id: Option<u64>,
    pub keyword: String,
    pub scan_messages: bool,
    pub max_video_duration: Duration,
    pub cooldown: Duration,
    pub health_host: String,
    pub health_port: u16,
    pub data_dir: PathBuf,
    pub credentials_path: PathBuf,
    pub client_secrets_path: PathBuf,
    pub oauth_port: u16,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let int = |name: &str| env_int(name, var(name));

        let max_video_duration = match int("MAX_VIDEO_DURATION_SECONDS") {
            Some(seconds) if seconds > 0 => seconds as u64,
            _ => DEFAULT_MAX_VIDEO_DURATION_SECONDS,
        };

        let cooldown = match int("ADDRADIO_COOLDOWN_SECONDS") {
            None => DEFAULT_COOLDOWN_SECONDS,
            Some(seconds) if seconds < 0 => {
                tracing::warn!(seconds, "ADDRADIO_COOLDOWN_SECONDS is negative; disabling cooldown");
                0
            }
            Some(seconds) => seconds as u64,
        };

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let credentials_path = var("GOOGLE_CREDS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("creds.json"));
        let client_secrets_path = var("GOOGLE_CLIENT_SECRETS")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("client_secrets.json"));

        let defaults = RetryConfig::default();
        let retry = RetryConfig {
            max_attempts: int("RETRY_MAX_ATTEMPTS")
                .and_then(|n| u32::try_from(n).ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_attempts),
            base_delay: non_negative_millis(int("RETRY_BASE_MS")).unwrap_or(defaults.base_delay),
            max_delay: non_negative_millis(int("RETRY_MAX_MS")).unwrap_or(defaults.max_delay),
        };

        Self {
            playlist_id: var("PLAYLIST_ID"),
            playlist_url: var("PLAYLIST_URL"),
            channel_id: int("CHANNEL_ID").and_then(|id| u64::try_from(id).ok()),
            keyword: var("KEYWORD").unwrap_or_else(|| DEFAULT_KEYWORD.to_string()),
            scan_messages: env_bool(
                "ENABLE_MESSAGE_SCANNING",
                var("ENABLE_MESSAGE_SCANNING"),
                true,
            ),
            max_video_duration: Duration::from_secs(max_video_duration),
            cooldown: Duration::from_secs(cooldown),
            health_host: var("HEALTH_HOST").unwrap_or_else(|| DEFAULT_HEALTH_HOST.to_string()),
            health_port: port(int("HEALTH_PORT")).unwrap_or(DEFAULT_HEALTH_PORT),
            data_dir,
            credentials_path,
            client_secrets_path,
            oauth_port: port(int("OAUTH_PORT")).unwrap_or(DEFAULT_OAUTH_PORT),
            request_timeout: Duration::from_secs(
                int("REQUEST_TIMEOUT_SECONDS")
                    .filter(|&s| s > 0)
                    .map_or(DEFAULT_REQUEST_TIMEOUT_SECONDS, |s| s as u64),
            ),
            retry,
        }
    }

    /// Shareable playlist link: `PLAYLIST_URL` if set, otherwise derived from the id.
    pub fn resolved_playlist_url(&self) -> Option<String> {
        self.playlist_url.clone().or_else(|| {
            self.playlist_id
                .as_ref()
                .map(|id| format!("https://youtube.com/playlist?list={id}"))
        })
    }

    pub fn require_playlist_id(&self) -> eyre::Result<&str> {
        self.playlist_id
            .as_deref()
            .ok_or_else(|| eyre::eyre!("PLAYLIST_ID is not set"))
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            channel_id: self.channel_id,
            keyword: self.keyword.clone(),
            scan_messages: self.scan_messages,
            playlist_url: self.resolved_playlist_url(),
            cooldown: self.cooldown,
        }
    }
}

fn env_int(name: &str, raw: Option<String>) -> Option<i64> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(name, value = %raw, "environment variable is not a valid integer");
            None
        }
    }
}

fn env_bool(name: &str, raw: Option<String>, default: bool) -> bool {
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            tracing::warn!(name, value = %raw, "environment variable is not a recognized boolean");
            default
        }
    }
}

fn port(value: Option<i64>) -> Option<u16> {
    value.and_then(|p| u16::try_from(p).ok())
}

fn non_negative_millis(value: Option<i64>) -> Option<Duration> {
    value
        .and_then(|ms| u64::try_from(ms).ok())
        .map(Duration::from_millis)
}
