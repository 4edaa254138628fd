//! # transform-client
//!
//! Stateless wrapper around the remote transformation service that owns all
//! protocol-specific payload handling: rewriting outbound login requests and
//! extracting the client identifier from login responses.
//!
//! The service is consumed over a fixed JSON protocol:
//!
//! ```text
//! POST <api_url>   {"operation": "get_uid", "data": "<hex payload>"}
//!   -> {"success": true,  "data": "<string>"}
//!   -> {"success": false, "message": "<diagnostic>"}
//! ```
//!
//! Every transport or protocol problem is folded into
//! [`TransformResult::Failure`]; callers never see an error.

mod client;
mod result;

pub use client::{ClientError, TransformClient, Transformer, DEFAULT_TIMEOUT};
pub use result::{Operation, TransformResult};
