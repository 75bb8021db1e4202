use ghostwatch_core::{GuardHandle, InboundMessage};
use tokio::sync::mpsc;

use crate::lines::{emit, OutputLine};

/// `Some(arg)` if the text is `{prefix}antidelete [arg]`.
pub fn antidelete_command(text: &str, prefix: &str) -> Option<Option<String>> {
    let rest = text.trim().strip_prefix(prefix)?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let name = parts.next()?;
    if !name.eq_ignore_ascii_case("antidelete") {
        return None;
    }
    let arg = parts
        .next()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);
    Some(arg)
}

/// Consume admitted messages: route the toggle command back into the
/// guard, print everything else for downstream handlers.
pub async fn run(
    mut dispatch: mpsc::Receiver<InboundMessage>,
    handle: GuardHandle,
    prefix: String,
) {
    while let Some(msg) = dispatch.recv().await {
        match antidelete_command(msg.content.text(), &prefix) {
            Some(arg) => {
                if let Err(e) = handle.toggle(msg.chat_id.clone(), msg.from_me, arg).await {
                    tracing::warn!("dispatch: {e}");
                    break;
                }
            }
            None => emit(&OutputLine::Dispatch { message: &msg }),
        }
    }
}
