/// Display signal attached to every command reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The operation did what was asked.
    Success,
    /// Nothing changed (already present / not found).
    Warning,
    /// A negative answer or a failure.
    Error,
    /// Informational output such as a listing.
    Info,
}

impl Severity {
    /// RGB colour used by chat gateways when rendering the reply.
    pub fn color(&self) -> u32 {
        match self {
            Severity::Success => 0x00FF00,
            Severity::Warning => 0xFFFF00,
            Severity::Error => 0xFF0000,
            Severity::Info => 0x0099FF,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Success => "ok",
            Severity::Warning => "warn",
            Severity::Error => "error",
            Severity::Info => "info",
        }
    }
}

/// Rendered outcome of an administrative command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReply {
    pub title: &'static str,
    pub description: String,
    pub severity: Severity,
}

impl CommandReply {
    pub fn new(title: &'static str, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title,
            description: description.into(),
            severity,
        }
    }
}

impl std::fmt::Display for CommandReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{} #{:06X}] {}\n{}",
            self.severity.label(),
            self.severity.color(),
            self.title,
            self.description
        )
    }
}

/// Render a whitelist as one `- uid` line per entry.
pub fn format_uid_list(uids: &[String]) -> String {
    if uids.is_empty() {
        return "Whitelist is empty.".to_string();
    }
    uids.iter()
        .map(|uid| format!("- {uid}"))
        .collect::<Vec<_>>()
        .join("\n")
}
