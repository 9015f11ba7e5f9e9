use clap::{Parser, Subcommand};
use eyre::Context;
use radiobot::config::Config;
use radiobot::console;
use radiobot::coordinator::{InboundEvent, Trigger};
use radiobot::credentials::{CredentialFile, CredentialGuardian};
use radiobot::readiness::ReadinessState;
use radiobot::{health, setup_pipeline};
use std::io::IsTerminal;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Adds YouTube videos posted in chat to a shared playlist.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the health endpoint and process chat lines from stdin (the default).
    Run,
    /// Add a single video, as if `/addradio <url>` had been used.
    Add {
        /// YouTube link to add.
        url: String,
    },
    /// Run the interactive OAuth flow and write the credential file.
    Auth,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(std::io::stdout().is_terminal())
        .init();

    // a missing .env is fine; the environment may be set some other way
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Add { url } => add(config, url).await,
        Command::Auth => auth(config).await,
    }
}

async fn run(config: Config) -> eyre::Result<()> {
    let pipeline = setup_pipeline(&config).await?;

    let listener = health::bind(&config.health_host, config.health_port).await?;
    let health = tokio::spawn(health::serve(listener, pipeline.readiness.clone()));

    tracing::info!("reading chat lines from stdin");
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let console = console::run(pipeline.clone(), stdin, tokio::io::stdout());

    tokio::select! {
        r = console => {
            r.context("console transport")?;
            // stdin closed (e.g. detached container): keep answering health checks
            tracing::info!("stdin closed, serving health checks until interrupted");
            tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
        }
    }
    health.abort();
    Ok(())
}

async fn add(config: Config, url: String) -> eyre::Result<()> {
    let pipeline = setup_pipeline(&config).await?;
    let event = InboundEvent {
        text: url,
        trigger: Trigger::Command,
        channel_id: config.channel_id,
        author: console::console_author(),
        reply: console::ConsoleSink::new(tokio::io::stdout()),
    };
    pipeline.coordinator.handle(event).await;
    Ok(())
}

async fn auth(config: Config) -> eyre::Result<()> {
    let oauth = radiobot::oauth_manager(&config)?;
    let token = oauth
        .authenticate(config.oauth_port)
        .await
        .context("authorize radiobot to YouTube")?;

    // whatever is on disk is about to be replaced, so it is not read first
    let file = CredentialFile::new(&config.credentials_path);
    let path = file.path().to_path_buf();
    let credentials =
        CredentialGuardian::new(None, oauth, Some(file), Arc::new(ReadinessState::new()));
    credentials
        .reauthenticated(token)
        .await
        .context("store YouTube credentials")?;
    println!("Credentials written to {}", path.display());
    println!("A running bot picks them up after `/reauth` or once its current token dies.");
    Ok(())
}
