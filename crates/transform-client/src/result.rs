use serde::{Deserialize, Serialize, Serializer};

/// Operations understood by the remote transformation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Rewrite an outbound login request body.
    TransformRequest,
    /// Pull the client identifier out of a login response body.
    ExtractIdentifier,
}

impl Operation {
    /// Name sent on the wire in the `operation` field.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Operation::TransformRequest => "modify_protobuf",
            Operation::ExtractIdentifier => "get_uid",
        }
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_name())
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Outcome of a single call to the transformation service.
///
/// A failure only ever carries a diagnostic string, never payload data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformResult {
    Success { data: String },
    Failure { message: String },
}

impl TransformResult {
    pub fn success(data: impl Into<String>) -> Self {
        TransformResult::Success { data: data.into() }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        TransformResult::Failure {
            message: message.into(),
        }
    }
}

/// JSON request body sent to the service.
#[derive(Debug, Serialize)]
pub(crate) struct WireRequest<'a> {
    pub operation: Operation,
    pub data: &'a str,
}

/// JSON response body returned by the service.
///
/// Both the success shape (`data`) and the failure shape (`message`) are
/// accepted; which one applies is decided by `success`.
#[derive(Debug, Deserialize)]
pub(crate) struct WireResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl From<WireResponse> for TransformResult {
    fn from(wire: WireResponse) -> Self {
        if !wire.success {
            let message = wire
                .message
                .unwrap_or_else(|| "transform service reported failure".to_string());
            return TransformResult::failure(message);
        }

        match wire.data {
            Some(serde_json::Value::String(s)) => TransformResult::success(s),
            // Identifiers sometimes come back as bare JSON numbers.
            Some(serde_json::Value::Number(n)) => TransformResult::success(n.to_string()),
            Some(other) => TransformResult::failure(format!(
                "transform service returned unsupported data type: {other}"
            )),
            None => TransformResult::failure("transform service reported success without data"),
        }
    }
}
