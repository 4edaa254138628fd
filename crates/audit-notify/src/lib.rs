//! Best-effort audit notifications for the uid-gate project.
//!
//! When a login passes the whitelist check, the pipeline hands the accepted
//! identifier to an [`AuditNotifier`]. The webhook implementation queues a
//! chat message on a bounded channel and a background task posts it, so a
//! slow or failing webhook can never delay a response already decided.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use audit_notify::{AuditNotifier, WebhookNotifier, WebhookWriter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let writer = WebhookWriter::new("https://chat.example/api/webhooks/1/abc", Duration::from_secs(5))?;
//! let (notifier, _handle) = WebhookNotifier::start(writer);
//!
//! notifier.notify("1234567890");
//! # Ok(())
//! # }
//! ```

pub mod message;
pub mod sink;
pub mod writer;

pub use message::{AuditMessage, Embed, EmbedFooter};
pub use sink::{AuditNotifier, WebhookNotifier};
pub use writer::{NotifyError, WebhookWriter};
