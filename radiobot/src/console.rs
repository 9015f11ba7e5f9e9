//! Line-oriented chat transport over stdin/stdout.
//!
//! Every input line is a chat message from a single local user posted in the configured
//! channel; `/addradio <url>` is the slash command. Acknowledgments are written as tagged lines.
//!
//! `/reauth` is for the operator: it drops the credential in use and picks up whatever
//! `radiobot auth` last wrote to the credential file.

use crate::Pipeline;
use crate::coordinator::{Announcement, Author, InboundEvent, Reaction, ReplySink, Trigger};
use crate::credentials::CredentialGuardian;
use crate::error::REAUTH_HINT;
use eyre::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

const COMMAND: &str = "/addradio";
const REAUTH: &str = "/reauth";

/// Replies for console events, serialized onto one writer.
#[derive(Debug)]
pub struct ConsoleSink<W> {
    out: Arc<Mutex<W>>,
}

impl<W> Clone for ConsoleSink<W> {
    fn clone(&self) -> Self {
        Self {
            out: Arc::clone(&self.out),
        }
    }
}

impl<W: AsyncWrite + Unpin + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    async fn line(&self, tag: &str, text: &str) -> eyre::Result<()> {
        let mut out = self.out.lock().await;
        for line in text.lines() {
            out.write_all(format!("[{tag}] {line}\n").as_bytes())
                .await
                .context("write to console")?;
        }
        out.flush().await.context("flush console")
    }
}

impl<W: AsyncWrite + Unpin + Send> ReplySink for ConsoleSink<W> {
    async fn react(&self, reaction: Reaction) -> eyre::Result<()> {
        self.line("reaction", reaction.emoji()).await
    }

    async fn reply(&self, text: &str) -> eyre::Result<()> {
        self.line("reply", text).await
    }

    async fn announce(&self, announcement: &Announcement) -> eyre::Result<()> {
        self.line("announce", &announcement.text()).await
    }
}

/// The one user typing into the console.
pub fn console_author() -> Author {
    Author {
        id: 1,
        mention: "@console".to_string(),
        is_bot: false,
    }
}

/// Maps one input line to an event, or `None` for blank lines.
pub fn parse_line<S>(line: &str, channel_id: Option<u64>, reply: S) -> Option<InboundEvent<S>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (trigger, text) = match line.strip_prefix(COMMAND) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
            (Trigger::Command, rest.trim())
        }
        _ => (Trigger::Passive, line),
    };
    Some(InboundEvent {
        text: text.to_string(),
        trigger,
        channel_id,
        author: console_author(),
        reply,
    })
}

/// Feeds `input` to the coordinator line by line until EOF, handling lines concurrently.
///
/// Returns once every event read has been acknowledged.
pub async fn run<R, W>(pipeline: Pipeline, input: R, output: W) -> eyre::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let sink = ConsoleSink::new(output);
    let channel_id = pipeline.coordinator.settings().channel_id;
    let mut lines = input.lines();
    let mut tasks = JoinSet::new();

    while let Some(line) = lines.next_line().await.context("read console input")? {
        if line.trim() == REAUTH {
            let credentials = Arc::clone(&pipeline.credentials);
            let sink = sink.clone();
            tasks.spawn(async move { reauth(&credentials, &sink).await });
            continue;
        }
        let Some(event) = parse_line(&line, channel_id, sink.clone()) else {
            continue;
        };
        let coordinator = Arc::clone(&pipeline.coordinator);
        tasks.spawn(async move { coordinator.handle(event).await });
    }

    tracing::debug!("console input closed, waiting for pending events");
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "event task failed");
        }
    }
    Ok(())
}

/// Forces re-authentication and reports whether new credentials were found on disk.
async fn reauth<S: ReplySink>(credentials: &CredentialGuardian, sink: &S) {
    tracing::info!("operator requested re-authentication");
    credentials.force_reauth().await;
    let text = match credentials.current().await {
        Ok(_) => "Picked up new YouTube credentials.",
        Err(e) if e.needs_reauth() => REAUTH_HINT,
        Err(e) => {
            tracing::warn!(error = %e, "could not use the stored YouTube credentials");
            "Found new YouTube credentials but could not use them yet; try again shortly."
        }
    };
    if let Err(e) = sink.reply(text).await {
        tracing::warn!(error = %e, "could not send reply");
    }
}
