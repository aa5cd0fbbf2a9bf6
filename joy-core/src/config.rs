//! # Configuration
//!
//! Two layers, same as the rest of the workspace:
//!
//! - [`JoyConfig`]: a plain string key/value store with dotted keys
//!   (`uploadjoy.secret`, `uploadjoy.infra_url`, ...). It can be filled from
//!   the environment with [`JoyConfig::load_env`], where
//!   `UPLOADJOY__INFRA_URL` becomes `uploadjoy.infra_url`.
//! - [`HandlerConfig`]: the typed view the request handler needs, read from
//!   a [`JoyConfigSnapshot`] or straight from the process environment with
//!   [`HandlerConfig::from_env`].
//!
//! ```rust
//! use joy_core::config::HandlerConfig;
//!
//! let config = HandlerConfig::new("sk_live_123")
//!     .with_callback_url("https://example.com/api/uploadjoy")
//!     .with_dev_mode(true);
//!
//! assert_eq!(config.infra_url, "https://www.uploadjoy.com");
//! ```

use std::collections::HashMap;
use std::env;

use anyhow::{anyhow, Result};

pub const DEFAULT_INFRA_URL: &str = "https://www.uploadjoy.com";

pub const KEY_SECRET: &str = "uploadjoy.secret";
pub const KEY_INFRA_URL: &str = "uploadjoy.infra_url";
pub const KEY_CALLBACK_URL: &str = "uploadjoy.callback_url";
pub const KEY_ENV: &str = "uploadjoy.env";
pub const KEY_DEBUG: &str = "uploadjoy.debug";
pub const KEY_VERIFY_SIGNATURES: &str = "uploadjoy.verify_signatures";

#[derive(Debug, Default)]
pub struct JoyConfig {
    values: HashMap<String, String>,
}

impl JoyConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy every `PREFIX__A__B` variable into `<prefix>.a.b`.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_pairs(prefix, env::vars());
    }

    fn load_pairs<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{prefix}__");
        let namespace = prefix.to_lowercase();
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(&marker) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(format!("{namespace}.{normalized}"), value);
            }
        }
    }

    pub fn snapshot(&self) -> JoyConfigSnapshot {
        JoyConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct JoyConfigSnapshot {
    map: HashMap<String, String>,
}

impl JoyConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| match v.trim() {
            "1" => Some(true),
            "0" => Some(false),
            other => other.to_ascii_lowercase().parse::<bool>().ok(),
        })
    }
}

/// Everything the request handler needs from its environment.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Bearer token for the storage API; also the webhook signing key.
    pub secret: String,

    /// Base URL of the storage API (`prepareUpload`, `pollUpload`).
    pub infra_url: String,

    /// Where the storage backend should deliver completion webhooks.
    pub callback_url: String,

    /// Enables the dev-server simulation hook.
    pub is_dev: bool,

    /// Verbose verification logging.
    pub debug: bool,

    /// Reject completion webhooks without a valid signature.
    pub verify_signatures: bool,
}

impl HandlerConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self {
            secret: secret.into(),
            infra_url: DEFAULT_INFRA_URL.to_string(),
            callback_url: default_callback_url(None, None),
            is_dev: false,
            debug: false,
            verify_signatures: true,
        }
    }

    pub fn with_infra_url<S: Into<String>>(mut self, url: S) -> Self {
        self.infra_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_callback_url<S: Into<String>>(mut self, url: S) -> Self {
        self.callback_url = url.into();
        self
    }

    pub fn with_dev_mode(mut self, is_dev: bool) -> Self {
        self.is_dev = is_dev;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_signature_verification(mut self, enabled: bool) -> Self {
        self.verify_signatures = enabled;
        self
    }

    /// Build from a config snapshot. `uploadjoy.secret` is required.
    pub fn from_snapshot(snapshot: &JoyConfigSnapshot) -> Result<Self> {
        let secret = snapshot
            .get_string(KEY_SECRET)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("{KEY_SECRET} is not configured"))?;

        let mut config = Self::new(secret);
        if let Some(url) = snapshot.get_string(KEY_INFRA_URL) {
            config = config.with_infra_url(url);
        }
        if let Some(url) = snapshot.get_string(KEY_CALLBACK_URL) {
            config = config.with_callback_url(url);
        }
        config.is_dev = snapshot.get(KEY_ENV) == Some("development");
        config.debug = snapshot.get_bool(KEY_DEBUG).unwrap_or(false);
        config.verify_signatures = snapshot.get_bool(KEY_VERIFY_SIGNATURES).unwrap_or(true);
        Ok(config)
    }

    /// Read the process environment.
    ///
    /// `UPLOADJOY_SECRET` is required. `CUSTOM_INFRA_URL`,
    /// `UPLOADJOY_CALLBACK_URL` (else `VERCEL_URL` / `PORT`), `UPLOADJOY_ENV`,
    /// `UPLOADJOY_DEBUG` and `UPLOADJOY_VERIFY_SIGNATURES` are optional, and
    /// `UPLOADJOY__*` variables override all of them.
    pub fn from_env() -> Result<Self> {
        let mut config = JoyConfig::new();

        let secret = env::var("UPLOADJOY_SECRET").unwrap_or_default();
        let infra_url =
            env::var("CUSTOM_INFRA_URL").unwrap_or_else(|_| DEFAULT_INFRA_URL.to_string());
        let callback_url = env::var("UPLOADJOY_CALLBACK_URL").unwrap_or_else(|_| {
            default_callback_url(env::var("VERCEL_URL").ok(), env::var("PORT").ok())
        });
        let mode = env::var("UPLOADJOY_ENV").unwrap_or_else(|_| "production".to_string());

        config.set(KEY_SECRET, secret);
        config.set(KEY_INFRA_URL, infra_url);
        config.set(KEY_CALLBACK_URL, callback_url);
        config.set(KEY_ENV, mode);
        if let Ok(debug) = env::var("UPLOADJOY_DEBUG") {
            config.set(KEY_DEBUG, debug);
        }
        if let Ok(verify) = env::var("UPLOADJOY_VERIFY_SIGNATURES") {
            config.set(KEY_VERIFY_SIGNATURES, verify);
        }

        config.load_env("UPLOADJOY");
        Self::from_snapshot(&config.snapshot())
    }
}

/// `https://$VERCEL_URL/api/uploadjoy`, else `http://localhost:$PORT/api/uploadjoy`.
pub fn default_callback_url(vercel_url: Option<String>, port: Option<String>) -> String {
    match vercel_url.filter(|v| !v.is_empty()) {
        Some(host) => format!("https://{host}/api/uploadjoy"),
        None => {
            let port = port.unwrap_or_else(|| "3000".to_string());
            format!("http://localhost:{port}/api/uploadjoy")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_style_keys_are_normalized() {
        let mut config = JoyConfig::new();
        config.load_pairs(
            "UPLOADJOY",
            vec![
                ("UPLOADJOY__INFRA_URL".to_string(), "http://infra.local".to_string()),
                ("UPLOADJOY_SECRET".to_string(), "ignored".to_string()),
                ("PATH".to_string(), "/bin".to_string()),
            ],
        );
        assert_eq!(config.get("uploadjoy.infra_url"), Some("http://infra.local"));
        assert!(!config.has("uploadjoy.secret"));
    }

    #[test]
    fn snapshot_builds_handler_config() {
        let mut config = JoyConfig::new();
        config.set(KEY_SECRET, "sk_test");
        config.set(KEY_INFRA_URL, "http://infra.local/");
        config.set(KEY_ENV, "development");
        config.set(KEY_DEBUG, "1");

        let handler = HandlerConfig::from_snapshot(&config.snapshot()).unwrap();
        assert_eq!(handler.infra_url, "http://infra.local");
        assert!(handler.is_dev);
        assert!(handler.debug);
        assert!(handler.verify_signatures);
        assert_eq!(handler.callback_url, "http://localhost:3000/api/uploadjoy");
    }

    #[test]
    fn missing_secret_is_an_error() {
        let snapshot = JoyConfig::new().snapshot();
        assert!(HandlerConfig::from_snapshot(&snapshot).is_err());
    }

    #[test]
    fn callback_url_prefers_vercel() {
        assert_eq!(
            default_callback_url(Some("app.vercel.app".into()), Some("8080".into())),
            "https://app.vercel.app/api/uploadjoy"
        );
        assert_eq!(
            default_callback_url(None, Some("8080".into())),
            "http://localhost:8080/api/uploadjoy"
        );
    }
}
