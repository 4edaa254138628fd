use serde::{Deserialize, Serialize};

/// Plain-text line shown above the embed.
pub const CONTENT: &str = "A whitelisted UID just logged in";

/// Embed title.
pub const TITLE: &str = "UID Access Monitor";

/// Embed footer text.
pub const FOOTER: &str = "uid-gate \u{2022} UID Monitor";

/// Embed side-bar colour.
pub const COLOR: u32 = 0x4A90E2;

/// A chat-webhook message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditMessage {
    pub content: String,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub footer: EmbedFooter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl AuditMessage {
    /// Build the notification for an identifier that passed the whitelist
    /// check, stamped with the current UTC time.
    pub fn uid_accepted(uid: &str) -> Self {
        Self {
            content: CONTENT.to_string(),
            embeds: vec![Embed {
                title: TITLE.to_string(),
                description: format!("> **UID:** `{uid}`"),
                color: COLOR,
                footer: EmbedFooter {
                    text: FOOTER.to_string(),
                },
                timestamp: Some(chrono::Utc::now()),
            }],
        }
    }
}
