use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

use flow_pipeline::{
    RejectionMessages, DEFAULT_MAX_BODY_BYTES, DEFAULT_TARGET_ROUTE, DEFAULT_UPSTREAM_TIMEOUT,
};

/// Configuration as written on disk. Every field is optional or defaulted;
/// [`Config::validate`] turns it into [`Settings`].
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    #[serde(default = "default_target_route")]
    pub target_route: String,
    #[serde(default = "default_transform_timeout")]
    pub transform_timeout_secs: u64,
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_whitelist_path")]
    pub whitelist_path: PathBuf,
    #[serde(default)]
    pub use_bot: bool,
    #[serde(default)]
    pub use_webhook: bool,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            proxy_port: default_proxy_port(),
            listen_host: default_listen_host(),
            target_route: default_target_route(),
            transform_timeout_secs: default_transform_timeout(),
            upstream_timeout_secs: default_upstream_timeout(),
            max_body_bytes: default_max_body_bytes(),
            whitelist_path: default_whitelist_path(),
            use_bot: false,
            use_webhook: false,
            discord: DiscordConfig::default(),
            messages: MessagesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Credentials for the chat integration.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DiscordConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Overrides for the bodies of blocked login responses.
#[derive(Debug, Default, Deserialize)]
pub struct MessagesConfig {
    #[serde(default)]
    pub generic_rejection: Option<String>,
    #[serde(default)]
    pub not_whitelisted: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_proxy_port() -> u16 {
    8080
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_target_route() -> String {
    DEFAULT_TARGET_ROUTE.to_string()
}

fn default_transform_timeout() -> u64 {
    5
}

fn default_upstream_timeout() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT.as_secs()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_whitelist_path() -> PathBuf {
    PathBuf::from("database/uids.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Validated settings
// ---------------------------------------------------------------------------

/// Fully validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub listen_addr: SocketAddr,
    pub target_route: String,
    pub transform_timeout: Duration,
    pub upstream_timeout: Duration,
    pub max_body_bytes: usize,
    pub whitelist_path: PathBuf,
    pub use_bot: bool,
    /// Set only when webhook auditing is enabled.
    pub webhook_url: Option<String>,
    pub discord: DiscordConfig,
    pub messages: RejectionMessages,
    pub log_level: String,
}

impl Config {
    pub fn validate(self) -> anyhow::Result<Settings> {
        let api_url = match self.api_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => bail!("`api_url` is required"),
        };
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            bail!("`api_url` must be an http:// or https:// URL, got '{api_url}'");
        }

        let host: IpAddr = self
            .listen_host
            .trim()
            .parse()
            .with_context(|| format!("invalid `listen_host` '{}'", self.listen_host))?;
        let listen_addr = SocketAddr::new(host, self.proxy_port);

        if self.target_route.trim().is_empty() {
            bail!("`target_route` must not be empty");
        }

        if self.transform_timeout_secs == 0 {
            bail!("`transform_timeout_secs` must be greater than zero");
        }
        if self.upstream_timeout_secs == 0 {
            bail!("`upstream_timeout_secs` must be greater than zero");
        }
        if self.max_body_bytes == 0 {
            bail!("`max_body_bytes` must be greater than zero");
        }

        let webhook_url = if self.use_webhook {
            match self.discord.webhook_url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => Some(url.to_string()),
                _ => bail!("`use_webhook` is enabled but `discord.webhook_url` is not set"),
            }
        } else {
            None
        };

        let mut messages = RejectionMessages::default();
        if let Some(generic) = self.messages.generic_rejection {
            messages.generic = generic;
        }
        if let Some(not_whitelisted) = self.messages.not_whitelisted {
            messages.not_whitelisted = not_whitelisted;
        }

        Ok(Settings {
            api_url,
            listen_addr,
            target_route: self.target_route.trim().to_string(),
            transform_timeout: Duration::from_secs(self.transform_timeout_secs),
            upstream_timeout: Duration::from_secs(self.upstream_timeout_secs),
            max_body_bytes: self.max_body_bytes,
            whitelist_path: self.whitelist_path,
            use_bot: self.use_bot,
            webhook_url,
            discord: self.discord,
            messages,
            log_level: self.logging.level,
        })
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML (or JSON) file.
///
/// Returns `None` if the file does not exist; the caller falls back to
/// defaults and reports it once logging is up. `api_url` must then come from
/// the command line.
pub fn load(path: &Path) -> anyhow::Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    let config: Config = serde_yml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Config {
        serde_yml::from_str(text).unwrap()
    }

    #[test]
    fn json_config_with_defaults() {
        let cfg = parse(r#"{ "api_url": "http://127.0.0.1:5000/api" }"#);
        let settings = cfg.validate().unwrap();

        assert_eq!(settings.api_url, "http://127.0.0.1:5000/api");
        assert_eq!(settings.listen_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(settings.target_route, "/MajorLogin");
        assert_eq!(settings.transform_timeout, Duration::from_secs(5));
        assert_eq!(settings.upstream_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_body_bytes, 8 * 1024 * 1024);
        assert_eq!(settings.whitelist_path, PathBuf::from("database/uids.json"));
        assert!(!settings.use_bot);
        assert!(settings.webhook_url.is_none());
        assert_eq!(settings.messages, RejectionMessages::default());
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn full_json_config() {
        let cfg = parse(
            r#"{
                "api_url": "https://transform.example/api",
                "proxy_port": 9000,
                "use_bot": true,
                "use_webhook": true,
                "discord": {
                    "bot_token": "token",
                    "guild_id": 1234567890,
                    "webhook_url": "https://chat.example/hook"
                }
            }"#,
        );
        let settings = cfg.validate().unwrap();

        assert_eq!(settings.listen_addr.port(), 9000);
        assert!(settings.use_bot);
        assert_eq!(
            settings.webhook_url.as_deref(),
            Some("https://chat.example/hook")
        );
        assert_eq!(settings.discord.guild_id, Some(1234567890));
        assert_eq!(settings.discord.bot_token.as_deref(), Some("token"));
    }

    #[test]
    fn yaml_config_with_overrides() {
        let cfg = parse(
            "api_url: http://localhost:5000/api\n\
             listen_host: 127.0.0.1\n\
             target_route: /auth/login\n\
             transform_timeout_secs: 2\n\
             whitelist_path: data/allow.json\n\
             messages:\n  \
               generic_rejection: try later\n  \
               not_whitelisted: \"{uid} denied\"\n\
             logging:\n  \
               level: debug\n",
        );
        let settings = cfg.validate().unwrap();

        assert_eq!(settings.listen_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(settings.target_route, "/auth/login");
        assert_eq!(settings.transform_timeout, Duration::from_secs(2));
        assert_eq!(settings.whitelist_path, PathBuf::from("data/allow.json"));
        assert_eq!(settings.messages.generic, "try later");
        assert_eq!(settings.messages.render_not_whitelisted("7"), "7 denied");
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn missing_api_url_is_rejected() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("api_url"));

        let err = parse(r#"{ "api_url": "  " }"#).validate().unwrap_err();
        assert!(err.to_string().contains("api_url"));
    }

    #[test]
    fn non_http_api_url_is_rejected() {
        let err = parse(r#"{ "api_url": "ftp://host/api" }"#)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn webhook_requires_url() {
        let err = parse(r#"{ "api_url": "http://h/api", "use_webhook": true }"#)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("webhook_url"));
    }

    #[test]
    fn webhook_url_ignored_when_disabled() {
        let settings = parse(
            r#"{ "api_url": "http://h/api", "discord": { "webhook_url": "http://hook" } }"#,
        )
        .validate()
        .unwrap();
        assert!(settings.webhook_url.is_none());
    }

    #[test]
    fn empty_route_and_zero_timeout_are_rejected() {
        let err = parse(r#"{ "api_url": "http://h/api", "target_route": "" }"#)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("target_route"));

        let err = parse(r#"{ "api_url": "http://h/api", "transform_timeout_secs": 0 }"#)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("transform_timeout_secs"));

        let err = parse(r#"{ "api_url": "http://h/api", "upstream_timeout_secs": 0 }"#)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("upstream_timeout_secs"));

        let err = parse(r#"{ "api_url": "http://h/api", "max_body_bytes": 0 }"#)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("max_body_bytes"));
    }

    #[test]
    fn bad_listen_host_is_rejected() {
        let err = parse(r#"{ "api_url": "http://h/api", "listen_host": "not-an-ip" }"#)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("listen_host"));
    }

    #[test]
    fn load_missing_file_reports_absence() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.json")).unwrap().is_none());

        let cfg = Config::default();
        assert!(cfg.api_url.is_none());
        assert_eq!(cfg.proxy_port, 8080);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "api_url": "http://h/api", "proxy_port": 1234 }"#).unwrap();

        let cfg = load(&path).unwrap().unwrap();
        assert_eq!(cfg.api_url.as_deref(), Some("http://h/api"));
        assert_eq!(cfg.proxy_port, 1234);
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "proxy_port: [not, a, port]").unwrap();

        let err = load(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse config file"));
    }
}
