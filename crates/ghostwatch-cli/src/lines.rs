use std::io::Write;
use std::path::Path;

use ghostwatch_core::{InboundMessage, MediaKind, MetricsSnapshot, RevocationEvent};
use serde::{Deserialize, Serialize};

/// One line read from stdin.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputLine {
    Message(InboundMessage),
    Revocation(RevocationEvent),
    /// Run the `antidelete` command without going through the dispatcher.
    Toggle {
        chat_id: String,
        #[serde(default)]
        from_me: bool,
        #[serde(default)]
        arg: Option<String>,
    },
    /// Print a counter snapshot.
    Metrics,
}

/// One line written to stdout.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputLine<'a> {
    SendText {
        chat_id: &'a str,
        text: &'a str,
        mentions: &'a [String],
    },
    SendMedia {
        chat_id: &'a str,
        kind: MediaKind,
        path: &'a Path,
        caption: &'a str,
        mentions: &'a [String],
    },
    /// Admitted message handed on to downstream command handling.
    Dispatch { message: &'a InboundMessage },
    Metrics(MetricsSnapshot),
}

/// Write a JSON line to stdout (flushed immediately for piped output).
pub fn emit(line: &OutputLine<'_>) {
    match serde_json::to_string(line) {
        Ok(json) => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            let _ = writeln!(lock, "{json}");
            let _ = lock.flush();
        }
        Err(e) => tracing::warn!("output: cannot encode line: {e}"),
    }
}
