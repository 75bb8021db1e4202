//! Owner-only `antidelete` command surface.
//!
//! The command dispatcher hands over the argument text; the guard replies
//! with status, usage, or the result of the toggle.

/// Parsed `antidelete` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleCommand {
    /// No argument: show status and usage.
    Status,
    Enable,
    Disable,
    Invalid,
}

impl ToggleCommand {
    pub fn parse(arg: Option<&str>) -> Self {
        let Some(arg) = arg.map(str::trim).filter(|a| !a.is_empty()) else {
            return ToggleCommand::Status;
        };
        if arg.eq_ignore_ascii_case("on") {
            ToggleCommand::Enable
        } else if arg.eq_ignore_ascii_case("off") {
            ToggleCommand::Disable
        } else {
            ToggleCommand::Invalid
        }
    }
}

pub const NOT_OWNER_REPLY: &str = "*❌ Only the bot owner can use this command.*";
pub const SAVE_FAILED_REPLY: &str =
    "*❌ Failed to update anti-delete settings. Check logs for details.*";

pub fn invalid_reply(prefix: &str) -> String {
    format!("*❌ Invalid command. Use {prefix}antidelete to see usage.*")
}

pub fn status_reply(enabled: bool, prefix: &str) -> String {
    let status = if enabled { "✅ Enabled" } else { "❌ Disabled" };
    format!(
        "*🔒 ANTIDELETE SETTINGS*\n\n\
         Status: {status}\n\n\
         *Usage:*\n\
         • {prefix}antidelete on - Enable anti-delete\n\
         • {prefix}antidelete off - Disable anti-delete"
    )
}

pub fn updated_reply(enabled: bool) -> String {
    let state = if enabled { "enabled" } else { "disabled" };
    format!("*✅ Anti-delete has been {state}*")
}
