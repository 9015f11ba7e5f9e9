//! Turns inbound chat events into playlist appends and acknowledgments.
//!
//! The coordinator knows nothing about the chat platform. A transport hands it an
//! [`InboundEvent`] carrying the message text and a [`ReplySink`] to answer through; everything
//! that goes wrong while handling one event ends up as a reply and a log line, never as a
//! panic or an error returned to the transport.

use crate::cooldown::CooldownTracker;
use crate::error::{Error, REAUTH_HINT, Result};
use crate::extract::{self, VideoRef};
use crate::playlist::{PlaylistClient, VideoDetails};
use crate::readiness::ReadinessState;
use std::collections::HashSet;
use std::fmt::Write;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::instrument;

/// Keyword that marks a passive message as a playlist submission.
pub const DEFAULT_KEYWORD: &str = "730radio";

/// How an event reached the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A regular channel message that mentions the keyword.
    Passive,
    /// An explicit `/addradio <url>` invocation.
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: u64,
    /// How to refer to the author in a public message, e.g. `<@1234>`.
    pub mention: String,
    pub is_bot: bool,
}

/// One triggering message or command.
#[derive(Debug)]
pub struct InboundEvent<S> {
    pub text: String,
    pub trigger: Trigger,
    pub channel_id: Option<u64>,
    pub author: Author,
    pub reply: S,
}

/// Emoji reactions placed on a passive message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Added,
    Duplicate,
    TooLong,
    Failed,
}

impl Reaction {
    pub fn emoji(self) -> &'static str {
        match self {
            Reaction::Added => "✅",
            Reaction::Duplicate => "🔁",
            Reaction::TooLong => "⏱️",
            Reaction::Failed => "❌",
        }
    }
}

/// Public "a video was added" post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Mention of whoever asked for the video, for command submissions.
    pub requester: Option<String>,
    pub details: VideoDetails,
    pub playlist_url: Option<String>,
}

impl Announcement {
    /// Plain-text rendering for transports without rich embeds.
    pub fn text(&self) -> String {
        let details = &self.details;
        let mut out = String::new();
        if let Some(requester) = &self.requester {
            let _ = writeln!(out, "Added by {requester}");
        }
        let title = if details.title.is_empty() {
            details.video.id()
        } else {
            &details.title
        };
        let _ = write!(out, "Added: {title}");
        if !details.channel_title.is_empty() {
            let _ = write!(out, " by {}", details.channel_title);
        }
        if let Some(duration) = details.formatted_duration() {
            let _ = write!(out, " ({duration})");
        }
        let _ = write!(out, "\n{}", details.video.short_url());
        if let Some(url) = &self.playlist_url {
            let _ = write!(out, "\nPlaylist: {url}");
        }
        out
    }
}

/// Where acknowledgments for one event go.
///
/// For commands `reply` is private to the invoker; for passive messages it is a reply to the
/// message. `announce` is always public.
pub trait ReplySink: Send + Sync {
    fn react(&self, reaction: Reaction) -> impl Future<Output = eyre::Result<()>> + Send;
    fn reply(&self, text: &str) -> impl Future<Output = eyre::Result<()>> + Send;
    fn announce(
        &self,
        announcement: &Announcement,
    ) -> impl Future<Output = eyre::Result<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Only events from this channel are handled; `None` accepts every channel.
    pub channel_id: Option<u64>,
    pub keyword: String,
    /// Whether passive messages are looked at at all.
    pub scan_messages: bool,
    pub playlist_url: Option<String>,
    /// Minimum time between two commands from the same user.
    pub cooldown: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            channel_id: None,
            keyword: DEFAULT_KEYWORD.to_string(),
            scan_messages: true,
            playlist_url: None,
            cooldown: Duration::ZERO,
        }
    }
}

enum Ingested {
    Added(VideoDetails),
    Duplicate,
}

#[derive(Debug)]
pub struct Coordinator {
    playlist: PlaylistClient,
    readiness: Arc<ReadinessState>,
    settings: CoordinatorSettings,
    cooldown: CooldownTracker,
    /// Videos whose append is currently running somewhere in this process.
    in_flight: Mutex<HashSet<VideoRef>>,
}

impl Coordinator {
    pub fn new(
        playlist: PlaylistClient,
        readiness: Arc<ReadinessState>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            cooldown: CooldownTracker::new(settings.cooldown),
            playlist,
            readiness,
            settings,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    /// Handles one inbound event from start to acknowledgment.
    #[instrument(skip_all, fields(trigger = ?event.trigger, author = event.author.id))]
    pub async fn handle<S: ReplySink>(&self, event: InboundEvent<S>) {
        match event.trigger {
            Trigger::Passive => self.handle_passive(&event).await,
            Trigger::Command => self.handle_command(&event).await,
        }
    }

    async fn handle_passive<S: ReplySink>(&self, event: &InboundEvent<S>) {
        if !self.settings.scan_messages || event.author.is_bot || !self.in_channel(event) {
            return;
        }
        if !extract::contains_keyword(&event.text, &self.settings.keyword) {
            return;
        }
        let videos = extract::extract_all(&event.text);
        if videos.is_empty() {
            tracing::debug!("keyword without a recognizable video link");
            return;
        }

        let sink = &event.reply;
        for video in videos {
            match self.ingest(&video).await {
                Ok(Ingested::Added(details)) => {
                    react(sink, Reaction::Added).await;
                    announce(sink, &self.announcement(None, details)).await;
                }
                Ok(Ingested::Duplicate) => react(sink, Reaction::Duplicate).await,
                Err(e) if e.needs_reauth() => {
                    react(sink, Reaction::Failed).await;
                    reply(sink, REAUTH_HINT).await;
                    // everything else in this message would fail the same way
                    return;
                }
                Err(Error::TooLong { limit_seconds, .. }) => {
                    react(sink, Reaction::TooLong).await;
                    reply(sink, &too_long_message(limit_seconds)).await;
                }
                Err(e) => {
                    react(sink, Reaction::Failed).await;
                    reply(sink, &format!("Couldn't add `{video}`: {e}")).await;
                }
            }
        }
    }

    async fn handle_command<S: ReplySink>(&self, event: &InboundEvent<S>) {
        let sink = &event.reply;
        if let Some(channel) = self.settings.channel_id
            && !self.in_channel(event)
        {
            reply(sink, &format!("Please use this command in <#{channel}>.")).await;
            return;
        }

        let now = Instant::now();
        let wait = self.cooldown.remaining(event.author.id, now);
        if !wait.is_zero() {
            slow_down(sink, wait).await;
            return;
        }

        let Some(video) = extract::extract(&event.text) else {
            tracing::debug!(error = %Error::Validation, "rejecting command");
            reply(sink, "No valid YouTube video URL found.").await;
            return;
        };
        // another command from the same user may have started the window meanwhile
        if let Err(wait) = self.cooldown.try_start(event.author.id, now) {
            slow_down(sink, wait).await;
            return;
        }

        match self.ingest(&video).await {
            Ok(Ingested::Added(details)) => {
                let announcement = self.announcement(Some(event.author.mention.clone()), details);
                announce(sink, &announcement).await;
                reply(sink, "Video added to the playlist. ✅").await;
            }
            Ok(Ingested::Duplicate) => {
                reply(
                    sink,
                    &format!("Video `{video}` is already in the playlist. 🔁"),
                )
                .await;
            }
            Err(e) if e.needs_reauth() => reply(sink, REAUTH_HINT).await,
            Err(Error::TooLong { limit_seconds, .. }) => {
                reply(sink, &too_long_message(limit_seconds)).await;
            }
            Err(e) => reply(sink, &format!("Couldn't add video: {e}")).await,
        }
    }

    fn in_channel<S>(&self, event: &InboundEvent<S>) -> bool {
        self.settings
            .channel_id
            .is_none_or(|channel| event.channel_id == Some(channel))
    }

    /// Appends `video` unless this process is already appending it.
    async fn ingest(&self, video: &VideoRef) -> Result<Ingested> {
        let Some(_guard) = InFlight::claim(&self.in_flight, video) else {
            tracing::info!(%video, "video already being added by another event");
            return Ok(Ingested::Duplicate);
        };

        match self.playlist.append(video).await {
            Ok(result) => match result.details {
                Some(details) if !result.already_present => Ok(Ingested::Added(details)),
                _ => Ok(Ingested::Duplicate),
            },
            Err(e) => {
                self.readiness.record_failure();
                match &e {
                    Error::TooLong { .. } => tracing::info!(%video, error = %e, "rejected video"),
                    _ => tracing::error!(%video, error = %e, "could not add video to playlist"),
                }
                Err(e)
            }
        }
    }

    fn announcement(&self, requester: Option<String>, details: VideoDetails) -> Announcement {
        Announcement {
            requester,
            details,
            playlist_url: self.settings.playlist_url.clone(),
        }
    }
}

/// Marks a video as in flight until dropped.
struct InFlight<'a> {
    set: &'a Mutex<HashSet<VideoRef>>,
    video: VideoRef,
}

impl<'a> InFlight<'a> {
    fn claim(set: &'a Mutex<HashSet<VideoRef>>, video: &VideoRef) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(video.clone());
        inserted.then(|| Self {
            set,
            video: video.clone(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.video);
    }
}

fn too_long_message(limit_seconds: u64) -> String {
    let limit = match limit_seconds {
        60 => "1 minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{s} seconds"),
    };
    format!("Videos longer than {limit} are not allowed on the playlist.")
}

async fn slow_down<S: ReplySink>(sink: &S, wait: Duration) {
    let seconds = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    reply(
        sink,
        &format!("Slow down! You can use /addradio again in {seconds}s."),
    )
    .await;
}

async fn react<S: ReplySink>(sink: &S, reaction: Reaction) {
    if let Err(e) = sink.react(reaction).await {
        tracing::warn!(error = %e, emoji = reaction.emoji(), "could not add reaction");
    }
}

async fn reply<S: ReplySink>(sink: &S, text: &str) {
    if let Err(e) = sink.reply(text).await {
        tracing::warn!(error = %e, "could not send reply");
    }
}

async fn announce<S: ReplySink>(sink: &S, announcement: &Announcement) {
    if let Err(e) = sink.announce(announcement).await {
        tracing::warn!(error = %e, "could not post announcement");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn details(title: &str, channel: &str, seconds: Option<u64>) -> VideoDetails {
        VideoDetails {
            video: VideoRef::parse("dQw4w9WgXcQ").unwrap(),
            title: title.to_string(),
            channel_title: channel.to_string(),
            duration: seconds.map(Duration::from_secs),
            thumbnail_url: None,
        }
    }

    #[test]
    fn announcement_for_command() {
        let announcement = Announcement {
            requester: Some("<@42>".to_string()),
            details: details("Never Gonna Give You Up", "Rick Astley", Some(213)),
            playlist_url: Some("https://youtube.com/playlist?list=PL1".to_string()),
        };
        assert_eq!(
            announcement.text(),
            "Added by <@42>\n\
             Added: Never Gonna Give You Up by Rick Astley (3:33)\n\
             https://youtu.be/dQw4w9WgXcQ\n\
             Playlist: https://youtube.com/playlist?list=PL1"
        );
    }

    #[test]
    fn announcement_with_sparse_metadata() {
        let announcement = Announcement {
            requester: None,
            details: details("", "", None),
            playlist_url: None,
        };
        assert_eq!(
            announcement.text(),
            "Added: dQw4w9WgXcQ\nhttps://youtu.be/dQw4w9WgXcQ"
        );
    }

    #[test]
    fn too_long_wording() {
        assert_eq!(
            too_long_message(600),
            "Videos longer than 10 minutes are not allowed on the playlist."
        );
        assert_eq!(
            too_long_message(60),
            "Videos longer than 1 minute are not allowed on the playlist."
        );
        assert_eq!(
            too_long_message(90),
            "Videos longer than 90 seconds are not allowed on the playlist."
        );
    }

    #[test]
    fn in_flight_claims_are_exclusive() {
        let set = Mutex::new(HashSet::new());
        let video = VideoRef::parse("dQw4w9WgXcQ").unwrap();
        let first = InFlight::claim(&set, &video);
        assert!(first.is_some());
        assert!(InFlight::claim(&set, &video).is_none());
        drop(first);
        assert!(InFlight::claim(&set, &video).is_some());
    }

    #[test]
    fn reaction_glyphs() {
        assert_eq!(Reaction::Added.emoji(), "✅");
        assert_eq!(Reaction::Duplicate.emoji(), "🔁");
        assert_eq!(Reaction::TooLong.emoji(), "⏱️");
        assert_eq!(Reaction::Failed.emoji(), "❌");
    }
}
