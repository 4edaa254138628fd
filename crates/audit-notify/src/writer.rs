use std::time::Duration;

use crate::message::AuditMessage;

/// Longest response body kept in a [`NotifyError::Rejected`] diagnostic.
const MAX_ERROR_BODY: usize = 256;

/// Errors that can occur while delivering a webhook message.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid webhook URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Build(reqwest::Error),

    #[error("webhook request failed: {0}")]
    Request(reqwest::Error),

    #[error("webhook rejected message with HTTP {status}: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Posts [`AuditMessage`] values to a single chat webhook.
///
/// Each call to [`send`](Self::send) is one POST, bounded by the timeout
/// given at construction. There is no retry.
#[derive(Debug, Clone)]
pub struct WebhookWriter {
    url: reqwest::Url,
    http: reqwest::Client,
}

impl WebhookWriter {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let parsed = reqwest::Url::parse(url.trim()).map_err(|e| NotifyError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NotifyError::Build)?;

        Ok(Self { url: parsed, http })
    }

    /// Deliver one message. Any non-2xx status is reported as
    /// [`NotifyError::Rejected`].
    pub async fn send(&self, message: &AuditMessage) -> Result<reqwest::StatusCode, NotifyError> {
        let response = self
            .http
            .post(self.url.clone())
            .json(message)
            .send()
            .await
            .map_err(NotifyError::Request)?;

        let status = response.status();
        if status.is_success() {
            return Ok(status);
        }

        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }

        Err(NotifyError::Rejected { status, body })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::fake_webhook;
    use super::*;

    #[test]
    fn rejects_invalid_url() {
        let err = WebhookWriter::new("::::", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, NotifyError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn send_posts_json_message() {
        let (url, mut bodies) = fake_webhook("200 OK").await;
        let writer = WebhookWriter::new(&url, Duration::from_secs(5)).unwrap();

        let status = writer.send(&AuditMessage::uid_accepted("42")).await.unwrap();
        assert_eq!(status, reqwest::StatusCode::OK);

        let body = bodies.recv().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["embeds"][0]["description"], "> **UID:** `42`");
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let (url, _bodies) = fake_webhook("500 Internal Server Error").await;
        let writer = WebhookWriter::new(&url, Duration::from_secs(5)).unwrap();

        let err = writer.send(&AuditMessage::uid_accepted("42")).await.unwrap_err();
        match err {
            NotifyError::Rejected { status, body } => {
                assert_eq!(status, reqwest::StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "nope");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }
}
