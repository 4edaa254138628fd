use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::message::AuditMessage;
use crate::writer::WebhookWriter;

/// Channel buffer size between the pipeline and the delivery task.
const CHANNEL_BUFFER: usize = 256;

/// Receives identifiers that passed the whitelist check.
///
/// `notify` must return immediately: it runs on the response path and may
/// never delay or alter the response already decided.
pub trait AuditNotifier: Send + Sync {
    fn notify(&self, uid: &str);
}

/// A cheap, cloneable handle that queues webhook notifications for a
/// background delivery task.
#[derive(Clone)]
pub struct WebhookNotifier {
    tx: mpsc::Sender<AuditMessage>,
}

impl WebhookNotifier {
    /// Spawn the delivery task and return a `(notifier, join_handle)` pair.
    ///
    /// Must be called from within a Tokio runtime. The task exits once the
    /// last `WebhookNotifier` clone is dropped and the queue is drained.
    pub fn start(writer: WebhookWriter) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<AuditMessage>(CHANNEL_BUFFER);

        let handle = tokio::spawn(async move {
            run_delivery_loop(writer, rx).await;
        });

        (Self { tx }, handle)
    }
}

impl AuditNotifier for WebhookNotifier {
    /// Queue a notification for `uid`. A full queue or a stopped delivery
    /// task drops the notification with a warning.
    fn notify(&self, uid: &str) {
        match self.tx.try_send(AuditMessage::uid_accepted(uid)) {
            Ok(()) => tracing::debug!(uid, "audit notification queued"),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(uid, "audit queue full; notification dropped")
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(uid, "audit delivery task stopped; notification dropped")
            }
        }
    }
}

/// Deliver queued messages one at a time until the channel closes.
/// Failures are logged and the message is discarded.
async fn run_delivery_loop(writer: WebhookWriter, mut rx: mpsc::Receiver<AuditMessage>) {
    while let Some(message) = rx.recv().await {
        match writer.send(&message).await {
            Ok(status) => tracing::debug!(%status, "audit notification delivered"),
            Err(err) => tracing::error!(%err, "audit notification delivery failed"),
        }
    }
    tracing::debug!("audit delivery task shutting down");
}
