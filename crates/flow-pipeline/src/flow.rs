use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};

/// One request/response exchange as seen by the interception hooks.
///
/// A `Flow` lives only for the duration of a single exchange and is owned
/// by the task processing it; hooks get exclusive mutable access.
#[derive(Debug, Clone)]
pub struct Flow {
    /// Unique identifier for this exchange, used in logs.
    pub id: uuid::Uuid,
    pub method: Method,
    /// Request path including any query string.
    pub path: String,
    pub request_body: Bytes,
    /// Set once the backend has answered.
    pub response: Option<FlowResponse>,
}

/// The backend's answer to a [`Flow`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlowResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl Flow {
    pub fn new(method: Method, path: impl Into<String>, request_body: impl Into<Bytes>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            method,
            path: path.into(),
            request_body: request_body.into(),
            response: None,
        }
    }

    /// Attach the backend response, consuming and returning `self` for
    /// builder-style usage.
    pub fn with_response(mut self, status: StatusCode, body: impl Into<Bytes>) -> Self {
        self.set_response(status, body);
        self
    }

    pub fn set_response(&mut self, status: StatusCode, body: impl Into<Bytes>) {
        self.response = Some(FlowResponse {
            status,
            body: body.into(),
        });
    }
}

/// Hook contract between the interception engine and the pipeline.
///
/// Both methods may replace bodies and the response status in place. Neither
/// returns a value or an error: every failure inside a hook must resolve to
/// a defined pass-through or block outcome on the flow itself.
#[async_trait]
pub trait FlowHook: Send + Sync {
    /// Called before the request is forwarded to the backend.
    async fn on_request(&self, flow: &mut Flow);

    /// Called after the backend response has been attached to the flow.
    async fn on_response(&self, flow: &mut Flow);
}
