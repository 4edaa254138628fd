use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::result::{Operation, TransformResult, WireRequest, WireResponse};

/// Upper bound on a single round trip to the transformation service.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised while constructing a [`TransformClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid transform service URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Anything that can run an [`Operation`] over a hex-encoded payload.
///
/// Implementations must fold every failure into
/// [`TransformResult::Failure`]; the pipeline relies on never seeing an error.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn post(&self, operation: Operation, payload_hex: &str) -> TransformResult;
}

/// HTTP client for the remote transformation service.
#[derive(Debug, Clone)]
pub struct TransformClient {
    url: reqwest::Url,
    http: reqwest::Client,
    timeout: Duration,
}

impl TransformClient {
    /// Build a client for the service at `url`. Trailing slashes are ignored.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let trimmed = url.trim().trim_end_matches('/');
        let url = reqwest::Url::parse(trimmed).map_err(|e| ClientError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self { url, http, timeout })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Transformer for TransformClient {
    async fn post(&self, operation: Operation, payload_hex: &str) -> TransformResult {
        let body = WireRequest {
            operation,
            data: payload_hex,
        };

        debug!(%operation, payload_len = payload_hex.len(), "calling transform service");

        let response = match self.http.post(self.url.clone()).json(&body).send().await {
            Ok(response) => response,
            Err(err) => {
                let kind = if err.is_timeout() { "timed out" } else { "failed" };
                warn!(%operation, %err, "transform request {kind}");
                return TransformResult::failure(format!("transform request {kind}: {err}"));
            }
        };

        let status = response.status();
        match response.json::<WireResponse>().await {
            Ok(wire) => TransformResult::from(wire),
            Err(err) => {
                warn!(%operation, %status, %err, "malformed transform response");
                TransformResult::failure(format!(
                    "malformed transform response (HTTP {status}): {err}"
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_fixtures::{body_of, read_http_message};
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    /// Serve a single canned response and hand back the raw request text.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_http_message(&mut stream).await;
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
            request
        });

        (format!("http://{addr}/"), handle)
    }

    #[test]
    fn rejects_invalid_url() {
        let err = TransformClient::new("not a url", DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl { .. }));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = TransformClient::new("http://127.0.0.1:9000/api/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:9000/api");
    }

    #[tokio::test]
    async fn posts_operation_and_hex_payload() {
        let (url, server) = serve_once("200 OK", r#"{"success": true, "data": "42"}"#).await;
        let client = TransformClient::new(&url, DEFAULT_TIMEOUT).unwrap();

        let result = client.post(Operation::ExtractIdentifier, "deadbeef").await;
        assert_eq!(result, TransformResult::success("42"));

        let request = server.await.unwrap();
        assert!(request.starts_with("POST "), "unexpected request: {request}");
        let body = body_of(&request);
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json["operation"], "get_uid");
        assert_eq!(json["data"], "deadbeef");
    }

    #[tokio::test]
    async fn service_failure_is_passed_through() {
        let (url, _server) =
            serve_once("200 OK", r#"{"success": false, "message": "bad blob"}"#).await;
        let client = TransformClient::new(&url, DEFAULT_TIMEOUT).unwrap();

        let result = client.post(Operation::TransformRequest, "00").await;
        assert_eq!(result, TransformResult::failure("bad blob"));
    }

    #[tokio::test]
    async fn non_json_response_is_failure() {
        let (url, _server) = serve_once("502 Bad Gateway", "<html>oops</html>").await;
        let client = TransformClient::new(&url, DEFAULT_TIMEOUT).unwrap();

        let result = client.post(Operation::TransformRequest, "00").await;
        match result {
            TransformResult::Failure { message } => {
                assert!(message.contains("malformed"), "unexpected message: {message}");
            }
            other => panic!("expected Failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = TransformClient::new(&format!("http://{addr}"), DEFAULT_TIMEOUT).unwrap();
        let result = client.post(Operation::ExtractIdentifier, "00").await;
        match result {
            TransformResult::Failure { message } => {
                assert!(message.contains("transform request failed"), "unexpected message: {message}");
            }
            other => panic!("expected Failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn slow_service_times_out_as_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(stream);
        });

        let client =
            TransformClient::new(&format!("http://{addr}"), Duration::from_millis(200)).unwrap();
        let result = client.post(Operation::ExtractIdentifier, "00").await;
        match result {
            TransformResult::Failure { message } => {
                assert!(message.contains("timed out"), "unexpected message: {message}");
            }
            other => panic!("expected Failure, got {:?}", other),
        }
    }
}
