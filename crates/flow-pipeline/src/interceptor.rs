use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use tracing::{debug, info, warn};

use audit_notify::AuditNotifier;
use transform_client::{Operation, TransformResult, Transformer};
use whitelist_store::WhitelistStore;

use crate::filter::RouteFilter;
use crate::flow::{Flow, FlowHook};

/// Placeholder replaced by the identifier in [`RejectionMessages::not_whitelisted`].
pub const UID_PLACEHOLDER: &str = "{uid}";

const DEFAULT_GENERIC_REJECTION: &str =
    "[FF0000][B] LOGIN VERIFICATION UNAVAILABLE, PLEASE TRY AGAIN LATER\n";

const DEFAULT_NOT_WHITELISTED: &str = concat!(
    "[1E90FF]\u{250F}",
    "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}",
    "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}",
    "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}",
    "\u{2513}\n",
    "[FFFF00][B] UID [FF0000]{uid} [FFFF00][B] NOT FOUND IN OUR DATABASE\n",
    "[1E90FF]\u{2517}",
    "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}",
    "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}",
    "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}",
    "\u{251B}\n",
);

/// Bodies substituted into blocked login responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionMessages {
    /// Used when no identifier could be verified.
    pub generic: String,
    /// Used when the identifier is not whitelisted; `{uid}` is substituted.
    pub not_whitelisted: String,
}

impl Default for RejectionMessages {
    fn default() -> Self {
        Self {
            generic: DEFAULT_GENERIC_REJECTION.to_string(),
            not_whitelisted: DEFAULT_NOT_WHITELISTED.to_string(),
        }
    }
}

impl RejectionMessages {
    pub fn render_not_whitelisted(&self, uid: &str) -> String {
        self.not_whitelisted.replace(UID_PLACEHOLDER, uid)
    }
}

/// Decision taken on the response leg of a login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The identifier is whitelisted; the response passes unmodified.
    Allow { uid: String },
    /// The identifier was extracted but is not whitelisted.
    NotWhitelisted { uid: String },
    /// No identifier could be verified (transformer or store failure).
    Unverified { reason: String },
}

/// The login-route [`FlowHook`].
///
/// Request leg: hex-encode the body, ask the transformer to rewrite it, and
/// swap in the decoded result. Any failure leaves the body as it was.
///
/// Response leg: ask the transformer for the identifier, check it against
/// the whitelist, and either pass the response through (notifying the audit
/// hook) or replace it with a 400 rejection.
pub struct LoginInterceptor {
    filter: RouteFilter,
    transformer: Arc<dyn Transformer>,
    store: Arc<WhitelistStore>,
    notifier: Option<Arc<dyn AuditNotifier>>,
    messages: RejectionMessages,
}

impl std::fmt::Debug for LoginInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginInterceptor")
            .field("route", &self.filter.route())
            .field("store", &self.store)
            .field("audit", &self.notifier.is_some())
            .finish()
    }
}

impl LoginInterceptor {
    /// Create an interceptor with no audit hook and default rejection bodies.
    pub fn new(
        filter: RouteFilter,
        transformer: Arc<dyn Transformer>,
        store: Arc<WhitelistStore>,
    ) -> Self {
        Self {
            filter,
            transformer,
            store,
            notifier: None,
            messages: RejectionMessages::default(),
        }
    }

    /// Enable the audit hook for accepted identifiers.
    pub fn with_notifier(mut self, notifier: Arc<dyn AuditNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_messages(mut self, messages: RejectionMessages) -> Self {
        self.messages = messages;
        self
    }

    /// Run the request-leg transformation. Returns the replacement body, or
    /// `None` when the original body must be kept.
    pub async fn rewrite_request(&self, body: &[u8]) -> Option<Bytes> {
        let result = self
            .transformer
            .post(Operation::TransformRequest, &hex::encode(body))
            .await;

        let data = match result {
            TransformResult::Success { data } => data,
            TransformResult::Failure { message } => {
                warn!(%message, "request transform failed; forwarding original body");
                return None;
            }
        };

        match hex::decode(data.trim()) {
            Ok(bytes) => Some(Bytes::from(bytes)),
            Err(err) => {
                warn!(%err, "transformed body is not valid hex; forwarding original body");
                None
            }
        }
    }

    /// Decide the response-leg outcome for a login response body.
    pub async fn evaluate_response(&self, body: &[u8]) -> Verdict {
        let result = self
            .transformer
            .post(Operation::ExtractIdentifier, &hex::encode(body))
            .await;

        let uid = match result {
            TransformResult::Success { data } => data,
            TransformResult::Failure { message } => {
                return Verdict::Unverified { reason: message };
            }
        };

        // File I/O under the store lock runs on the blocking pool.
        let store = Arc::clone(&self.store);
        let lookup = uid.clone();
        match tokio::task::spawn_blocking(move || store.exists(&lookup)).await {
            Ok(Ok(true)) => Verdict::Allow { uid },
            Ok(Ok(false)) => Verdict::NotWhitelisted { uid },
            Ok(Err(err)) => Verdict::Unverified {
                reason: format!("whitelist lookup failed: {err}"),
            },
            Err(err) => Verdict::Unverified {
                reason: format!("whitelist lookup task failed: {err}"),
            },
        }
    }

    /// Apply a verdict to the flow's response.
    fn enforce(&self, flow: &mut Flow, verdict: Verdict) {
        let Some(response) = flow.response.as_mut() else {
            return;
        };

        match verdict {
            Verdict::Allow { uid } => {
                info!(flow_id = %flow.id, uid = %uid, "uid whitelisted; login allowed");
                if let Some(notifier) = &self.notifier {
                    notifier.notify(&uid);
                }
            }
            Verdict::NotWhitelisted { uid } => {
                warn!(flow_id = %flow.id, uid = %uid, "uid not whitelisted; login blocked");
                response.status = StatusCode::BAD_REQUEST;
                response.body = Bytes::from(self.messages.render_not_whitelisted(&uid));
            }
            Verdict::Unverified { reason } => {
                warn!(flow_id = %flow.id, %reason, "uid could not be verified; login blocked");
                response.status = StatusCode::BAD_REQUEST;
                response.body = Bytes::from(self.messages.generic.clone());
            }
        }
    }
}

#[async_trait]
impl FlowHook for LoginInterceptor {
    async fn on_request(&self, flow: &mut Flow) {
        if !self.filter.matches(&flow.method, &flow.path) {
            return;
        }

        debug!(flow_id = %flow.id, path = %flow.path, "intercepting login request");

        if let Some(body) = self.rewrite_request(&flow.request_body).await {
            info!(
                flow_id = %flow.id,
                original_len = flow.request_body.len(),
                rewritten_len = body.len(),
                "login request body rewritten"
            );
            flow.request_body = body;
        }
    }

    async fn on_response(&self, flow: &mut Flow) {
        if !self.filter.matches(&flow.method, &flow.path) {
            return;
        }

        let body = match &flow.response {
            Some(response) => response.body.clone(),
            None => return,
        };

        debug!(flow_id = %flow.id, path = %flow.path, "intercepting login response");

        let verdict = self.evaluate_response(&body).await;
        self.enforce(flow, verdict);
    }
}
