mod cli;
mod config;
mod console;
mod context;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use flow_pipeline::{Proxy, ProxyConfig};

use crate::cli::Cli;
use crate::context::AppContext;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, merge CLI overrides, then validate.
    let loaded = config::load(&cli.config)?;
    let config_found = loaded.is_some();
    let mut cfg = loaded.unwrap_or_default();

    if let Some(port) = cli.port {
        cfg.proxy_port = port;
    }
    if let Some(ref api_url) = cli.api_url {
        cfg.api_url = Some(api_url.clone());
    }
    if let Some(ref whitelist) = cli.whitelist {
        cfg.whitelist_path = whitelist.clone();
    }

    let settings = cfg.validate().context("invalid configuration")?;

    // 3. Init tracing-subscriber with JSON format.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    if !config_found {
        warn!(
            path = %cli.config.display(),
            "configuration file not found; using defaults"
        );
    }

    info!(
        config_file = %cli.config.display(),
        listen = %settings.listen_addr,
        route = %settings.target_route,
        use_bot = settings.use_bot,
        use_webhook = settings.webhook_url.is_some(),
        chat_token = settings.discord.bot_token.is_some(),
        guild_id = ?settings.discord.guild_id,
        "uid-gate starting"
    );

    // 4. Build the shared context: whitelist, transform client, audit hook.
    let mut ctx = AppContext::build(settings)?;
    let _notifier_handle = ctx.start_notifier()?;

    // 5. Start the admin console when enabled.
    let _console = if ctx.settings.use_bot {
        Some(console::spawn(Arc::clone(&ctx.store)).context("failed to start admin console")?)
    } else {
        None
    };

    // 6. Set up shutdown signal (ctrl_c + SIGTERM).
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    let shutdown_tx_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm =
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(err) => {
                        error!(%err, "failed to register SIGTERM handler");
                        ctrl_c.await.ok();
                        let _ = shutdown_tx_signal.send(());
                        return;
                    }
                };

            tokio::select! {
                _ = ctrl_c => {
                    info!("received SIGINT (ctrl-c)");
                }
                _ = sigterm.recv() => {
                    info!("received SIGTERM");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            info!("received SIGINT (ctrl-c)");
        }

        let _ = shutdown_tx_signal.send(());
    });

    // 7. Create the intercepting proxy.
    let proxy = Proxy::new(ProxyConfig {
        listen_addr: ctx.settings.listen_addr,
        hook: Arc::new(ctx.build_interceptor()),
        upstream_timeout: ctx.settings.upstream_timeout,
        max_body_bytes: ctx.settings.max_body_bytes,
    });

    info!(
        listen = %ctx.settings.listen_addr,
        upstream_timeout_secs = ctx.settings.upstream_timeout.as_secs(),
        max_body_bytes = ctx.settings.max_body_bytes,
        "starting login proxy"
    );

    // 8. Run until the proxy fails or a shutdown signal arrives.
    let result = tokio::select! {
        r = proxy.run() => r.context("proxy exited"),
        _ = shutdown_rx.recv() => Ok(()),
    };

    info!("uid-gate shutting down");
    result
}
