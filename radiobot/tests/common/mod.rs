//! Shared fixtures: a wiremock stand-in for the YouTube and OAuth endpoints, and a reply sink
//! that records what the bot said.
#![allow(dead_code)]

use oauth2::basic::BasicTokenResponse;
use radiobot::coordinator::{
    Announcement, Author, Coordinator, CoordinatorSettings, InboundEvent, Reaction, ReplySink,
    Trigger,
};
use radiobot::Pipeline;
use radiobot::credentials::{CredentialFile, CredentialGuardian, TimeBoundAccessToken};
use radiobot::oauth::{ClientSecrets, OAuthManager};
use radiobot::playlist::{PlaylistClient, RetryConfig};
use radiobot::readiness::ReadinessState;
use radiobot::youtube_api::YouTubeClient;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PLAYLIST_ID: &str = "PLradio730";
pub const VIDEO_ID: &str = "dQw4w9WgXcQ";
pub const PLAYLIST_ITEMS: &str = "/youtube/v3/playlistItems";
pub const VIDEOS: &str = "/youtube/v3/videos";
pub const TOKEN: &str = "/token";

pub fn token_response(access: &str, refresh: Option<&str>, expires_in: u64) -> BasicTokenResponse {
    let mut body = json!({
        "access_token": access,
        "token_type": "Bearer",
        "expires_in": expires_in,
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    serde_json::from_value(body).unwrap()
}

/// A token that is good for the next hour.
pub fn live_token(access: &str) -> TimeBoundAccessToken {
    TimeBoundAccessToken::new(token_response(access, Some("1//refresh"), 3600))
}

/// A token that has to be refreshed before use.
pub fn stale_token(access: &str) -> TimeBoundAccessToken {
    TimeBoundAccessToken::expired(token_response(access, Some("1//refresh"), 3600))
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

pub fn oauth(server: &MockServer) -> OAuthManager {
    OAuthManager::new(
        ClientSecrets {
            client_id: "client.apps.googleusercontent.com".to_string(),
            client_secret: "secret".to_string(),
            token_uri: None,
        },
        Duration::from_secs(5),
    )
    .unwrap()
    .with_token_url(&format!("{}{TOKEN}", server.uri()))
    .unwrap()
}

pub fn guardian(
    server: &MockServer,
    token: Option<TimeBoundAccessToken>,
    file: Option<CredentialFile>,
) -> (Arc<CredentialGuardian>, Arc<ReadinessState>) {
    let readiness = Arc::new(ReadinessState::new());
    let guardian = CredentialGuardian::new(token, oauth(server), file, Arc::clone(&readiness));
    (Arc::new(guardian), readiness)
}

pub fn playlist_client(server: &MockServer, credentials: Arc<CredentialGuardian>) -> PlaylistClient {
    let yt = YouTubeClient::new(reqwest::Client::new())
        .with_api_base(format!("{}/youtube/v3", server.uri()));
    PlaylistClient::new(yt, credentials, PLAYLIST_ID)
        .with_retry(fast_retry())
        .with_max_duration(Duration::from_secs(600))
}

/// A coordinator backed by `server`, with a live credential.
pub fn coordinator(
    server: &MockServer,
    settings: CoordinatorSettings,
) -> (Coordinator, Arc<ReadinessState>) {
    let (credentials, readiness) = guardian(server, Some(live_token("ya29.live")), None);
    let playlist = playlist_client(server, credentials);
    (
        Coordinator::new(playlist, Arc::clone(&readiness), settings),
        readiness,
    )
}

/// The full wiring a transport sees, around an existing guardian.
pub fn pipeline(
    server: &MockServer,
    credentials: Arc<CredentialGuardian>,
    readiness: Arc<ReadinessState>,
    settings: CoordinatorSettings,
) -> Pipeline {
    let playlist = playlist_client(server, Arc::clone(&credentials));
    Pipeline {
        coordinator: Arc::new(Coordinator::new(playlist, Arc::clone(&readiness), settings)),
        credentials,
        readiness,
    }
}

pub fn playlist_page(video_ids: &[&str], next_page_token: Option<&str>) -> Value {
    let items: Vec<Value> = video_ids
        .iter()
        .enumerate()
        .map(|(i, id)| json!({ "id": format!("item{i}"), "contentDetails": { "videoId": id } }))
        .collect();
    let mut page = json!({
        "kind": "youtube#playlistItemListResponse",
        "items": items,
        "pageInfo": { "totalResults": video_ids.len(), "resultsPerPage": 50 },
    });
    if let Some(token) = next_page_token {
        page["nextPageToken"] = json!(token);
    }
    page
}

pub fn video_list(id: &str, title: &str, duration: &str) -> Value {
    json!({
        "kind": "youtube#videoListResponse",
        "items": [{
            "id": id,
            "snippet": {
                "title": title,
                "channelTitle": "Rick Astley",
                "thumbnails": { "high": { "url": format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg") } }
            },
            "contentDetails": { "duration": duration }
        }],
        "pageInfo": { "totalResults": 1, "resultsPerPage": 1 }
    })
}

pub fn google_error(code: u16, reason: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": format!("{reason} happened"),
            "errors": [{ "message": "x", "domain": "youtube", "reason": reason }]
        }
    })
}

/// Playlist without the video, a four minute video, and a working insert.
pub async fn mount_happy_path(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(PLAYLIST_ITEMS))
        .respond_with(ResponseTemplate::new(200).set_body_json(playlist_page(&[], None)))
        .mount(server)
        .await;
    mount_video(server, VIDEO_ID, "PT4M13S").await;
    Mock::given(method("POST"))
        .and(path(PLAYLIST_ITEMS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "new-item" })))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_video(server: &MockServer, id: &str, duration: &str) {
    Mock::given(method("GET"))
        .and(path(VIDEOS))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(video_list(id, "Never Gonna Give You Up", duration)),
        )
        .mount(server)
        .await;
}

pub async fn mount_refresh(server: &MockServer, access: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": access,
            "token_type": "Bearer",
            "expires_in": 3599,
        })))
        .mount(server)
        .await;
}

pub async fn mount_invalid_grant(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(TOKEN))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked.",
        })))
        .mount(server)
        .await;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    React(Reaction),
    Reply(String),
    Announce(Announcement),
}

/// Remembers every acknowledgment, in order.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    acks: Arc<Mutex<Vec<Ack>>>,
}

impl RecordingSink {
    pub fn acks(&self) -> Vec<Ack> {
        self.acks.lock().unwrap().clone()
    }

    pub fn reactions(&self) -> Vec<Reaction> {
        self.acks()
            .into_iter()
            .filter_map(|ack| match ack {
                Ack::React(reaction) => Some(reaction),
                _ => None,
            })
            .collect()
    }

    pub fn replies(&self) -> Vec<String> {
        self.acks()
            .into_iter()
            .filter_map(|ack| match ack {
                Ack::Reply(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn announcements(&self) -> Vec<Announcement> {
        self.acks()
            .into_iter()
            .filter_map(|ack| match ack {
                Ack::Announce(announcement) => Some(announcement),
                _ => None,
            })
            .collect()
    }
}

impl ReplySink for RecordingSink {
    async fn react(&self, reaction: Reaction) -> eyre::Result<()> {
        self.acks.lock().unwrap().push(Ack::React(reaction));
        Ok(())
    }

    async fn reply(&self, text: &str) -> eyre::Result<()> {
        self.acks.lock().unwrap().push(Ack::Reply(text.to_string()));
        Ok(())
    }

    async fn announce(&self, announcement: &Announcement) -> eyre::Result<()> {
        self.acks
            .lock()
            .unwrap()
            .push(Ack::Announce(announcement.clone()));
        Ok(())
    }
}

pub const CHANNEL: u64 = 730;

pub fn user() -> Author {
    Author {
        id: 42,
        mention: "<@42>".to_string(),
        is_bot: false,
    }
}

pub fn event(trigger: Trigger, text: &str) -> (InboundEvent<RecordingSink>, RecordingSink) {
    let sink = RecordingSink::default();
    let event = InboundEvent {
        text: text.to_string(),
        trigger,
        channel_id: Some(CHANNEL),
        author: user(),
        reply: sink.clone(),
    };
    (event, sink)
}

pub fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        channel_id: Some(CHANNEL),
        playlist_url: Some(format!("https://youtube.com/playlist?list={PLAYLIST_ID}")),
        ..CoordinatorSettings::default()
    }
}
