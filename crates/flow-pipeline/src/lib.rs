//! Login-flow interception for the uid-gate project.
//!
//! An interception engine hands every HTTP exchange to a [`FlowHook`] twice:
//! once before the request is forwarded and once after the backend has
//! answered. [`LoginInterceptor`] is the hook that matters: on the login
//! route it rewrites the outbound body through the remote transformer and
//! gates the inbound response on the whitelist.
//!
//! # Architecture
//!
//! ```text
//! Client  --HTTP-->  Proxy  --HTTP-->  Backend
//!                      |
//!              [LoginInterceptor]
//!               /       |       \
//!     Transformer  WhitelistStore  AuditNotifier
//! ```
//!
//! Policy per leg: the request leg fails open (a broken transformer leaves
//! the body alone), the response leg fails closed (no verified identifier
//! means a 400 rejection).

pub mod filter;
pub mod flow;
pub mod interceptor;
pub mod listener;

// Re-export the primary public types at the crate root for convenience.
pub use filter::{RouteFilter, DEFAULT_TARGET_ROUTE};
pub use flow::{Flow, FlowHook, FlowResponse};
pub use interceptor::{LoginInterceptor, RejectionMessages, Verdict};
pub use listener::{
    Proxy, ProxyConfig, ProxyError, DEFAULT_MAX_BODY_BYTES, DEFAULT_UPSTREAM_TIMEOUT,
};
