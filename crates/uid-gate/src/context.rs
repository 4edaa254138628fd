use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::info;

use audit_notify::{AuditNotifier, WebhookNotifier, WebhookWriter};
use flow_pipeline::{LoginInterceptor, RouteFilter};
use transform_client::TransformClient;
use whitelist_store::WhitelistStore;

use crate::config::Settings;

/// Per-request bound on a single webhook delivery.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the pipeline and the command gateway share, built once at
/// startup and handed out explicitly.
pub struct AppContext {
    pub settings: Settings,
    pub store: Arc<WhitelistStore>,
    pub transformer: Arc<TransformClient>,
    pub notifier: Option<Arc<dyn AuditNotifier>>,
}

impl AppContext {
    /// Open the whitelist and build the transform client. The audit notifier
    /// is attached separately by [`start_notifier`](Self::start_notifier)
    /// because it needs a running runtime.
    pub fn build(settings: Settings) -> anyhow::Result<Self> {
        let store = WhitelistStore::open(&settings.whitelist_path).with_context(|| {
            format!(
                "failed to open whitelist {}",
                settings.whitelist_path.display()
            )
        })?;

        let transformer = TransformClient::new(&settings.api_url, settings.transform_timeout)
            .context("failed to create transform client")?;

        info!(
            whitelist = %settings.whitelist_path.display(),
            api_url = transformer.url(),
            timeout_ms = transformer.timeout().as_millis() as u64,
            "application context ready"
        );

        Ok(Self {
            settings,
            store: Arc::new(store),
            transformer: Arc::new(transformer),
            notifier: None,
        })
    }

    /// Start the webhook delivery task when webhook auditing is enabled.
    /// Returns the task handle, or `None` when auditing is off.
    pub fn start_notifier(&mut self) -> anyhow::Result<Option<JoinHandle<()>>> {
        let Some(url) = self.settings.webhook_url.as_deref() else {
            return Ok(None);
        };

        let writer =
            WebhookWriter::new(url, WEBHOOK_TIMEOUT).context("failed to create webhook writer")?;
        let (notifier, handle) = WebhookNotifier::start(writer);
        self.notifier = Some(Arc::new(notifier));

        info!("webhook audit enabled");
        Ok(Some(handle))
    }

    /// Build the login-route hook from the shared components.
    pub fn build_interceptor(&self) -> LoginInterceptor {
        let interceptor = LoginInterceptor::new(
            RouteFilter::new(self.settings.target_route.clone()),
            self.transformer.clone(),
            Arc::clone(&self.store),
        )
        .with_messages(self.settings.messages.clone());

        match &self.notifier {
            Some(notifier) => interceptor.with_notifier(Arc::clone(notifier)),
            None => interceptor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn settings(dir: &tempfile::TempDir, extra: &str) -> Settings {
        let path = dir.path().join("db").join("uids.json");
        let text = format!(
            r#"{{ "api_url": "http://127.0.0.1:9/api", "whitelist_path": "{}" {extra} }}"#,
            path.display()
        );
        let cfg: Config = serde_yml::from_str(&text).unwrap();
        cfg.validate().unwrap()
    }

    #[test]
    fn build_opens_store_and_client() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::build(settings(&dir, "")).unwrap();

        assert!(ctx.store.path().exists());
        assert!(ctx.store.list().unwrap().is_empty());
        assert_eq!(ctx.transformer.url(), "http://127.0.0.1:9/api");
        assert_eq!(ctx.transformer.timeout(), Duration::from_secs(5));
        assert!(ctx.notifier.is_none());
    }

    #[tokio::test]
    async fn notifier_only_starts_when_enabled() {
        let dir = tempfile::tempdir().unwrap();

        let mut ctx = AppContext::build(settings(&dir, "")).unwrap();
        assert!(ctx.start_notifier().unwrap().is_none());
        assert!(ctx.notifier.is_none());

        let mut ctx = AppContext::build(settings(
            &dir,
            r#", "use_webhook": true, "discord": { "webhook_url": "http://127.0.0.1:9/hook" }"#,
        ))
        .unwrap();
        let handle = ctx.start_notifier().unwrap();
        assert!(handle.is_some());
        assert!(ctx.notifier.is_some());
    }

    #[test]
    fn interceptor_shares_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::build(settings(&dir, "")).unwrap();

        let _interceptor = ctx.build_interceptor();
        assert_eq!(Arc::strong_count(&ctx.store), 2);
    }
}
