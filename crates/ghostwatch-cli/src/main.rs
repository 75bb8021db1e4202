mod dispatch;
mod lines;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ghostwatch_core::{GuardConfig, GuardRuntime, SelfMatchPolicy};
use tokio::io::AsyncBufReadExt;

use lines::{emit, InputLine, OutputLine};
use platform::{FileMediaSource, StdoutMessenger};

#[derive(Parser)]
#[command(
    name = "ghostwatch",
    about = "Anti-delete guard driven by JSON lines on stdin"
)]
struct Cli {
    /// Feature switch file (`{"enabled": bool}`).
    #[arg(long, default_value = "data/antidelete.json")]
    config: PathBuf,

    /// Scratch directory for captured media.
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// The agent's own account id (e.g. `254700000001:7@s.whatsapp.net`).
    #[arg(long, default_value = "")]
    self_id: String,

    /// Compare deleter ids by exact account number instead of substring.
    #[arg(long)]
    exact_self_match: bool,

    /// Display offset for notification timestamps, in hours.
    #[arg(long, default_value = "3", allow_negative_numbers = true)]
    utc_offset_hours: i32,

    /// Command prefix for `antidelete`.
    #[arg(long, default_value = ".")]
    prefix: String,

    /// Max archived messages.
    #[arg(long, default_value = "5000")]
    archive_capacity: usize,

    /// Archive entry lifetime in seconds.
    #[arg(long, default_value = "86400")]
    archive_ttl: u64,

    /// Age in seconds after which scratch files are reaped.
    #[arg(long, default_value = "86400")]
    media_max_age: u64,

    /// Seconds shutdown waits for in-flight sends and captures.
    #[arg(long, default_value = "10")]
    shutdown_grace: u64,
}

impl Cli {
    fn guard_config(&self) -> GuardConfig {
        let mut config = GuardConfig::new()
            .feature_config_path(&self.config)
            .self_id(&self.self_id)
            .utc_offset_secs(self.utc_offset_hours.saturating_mul(3600))
            .command_prefix(&self.prefix)
            .archive_capacity(self.archive_capacity)
            .archive_ttl(Duration::from_secs(self.archive_ttl))
            .media_max_age(Duration::from_secs(self.media_max_age))
            .shutdown_grace(Duration::from_secs(self.shutdown_grace));
        if let Some(dir) = &self.scratch_dir {
            config = config.scratch_dir(dir);
        }
        if self.exact_self_match {
            config = config.self_match(SelfMatchPolicy::Exact);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.guard_config();

    eprintln!("ghostwatch v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("Scratch dir: {}", config.scratch_dir.display());
    eprintln!();

    let channels = GuardRuntime::spawn(config, Arc::new(StdoutMessenger), Arc::new(FileMediaSource));
    let handle = channels.handle;

    let dispatcher = tokio::spawn(dispatch::run(
        channels.dispatch,
        handle.clone(),
        cli.prefix.clone(),
    ));
    let mut events = channels.events;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!(?event, "guard event");
        }
    });

    let mut input = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = input.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: InputLine = match serde_json::from_str(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("input: skipping malformed line: {e}");
                continue;
            }
        };
        match parsed {
            InputLine::Message(msg) => handle.submit_message(msg).await?,
            InputLine::Revocation(event) => handle.submit_revocation(event).await?,
            InputLine::Toggle {
                chat_id,
                from_me,
                arg,
            } => handle.toggle(chat_id, from_me, arg).await?,
            InputLine::Metrics => emit(&OutputLine::Metrics(handle.metrics())),
        }
    }

    tracing::info!("stdin closed, shutting down");
    handle.shutdown().await;
    tracing::info!(metrics = ?handle.metrics(), "guard stopped");
    dispatcher.abort();
    Ok(())
}
