//! read configuration from a file, the environment or explicit values

use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::errors::Error;
use crate::request::has_scheme;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_TOKEN_REFRESH_INTERVAL_MS: u64 = 120_000;
pub const DEFAULT_QUEUE_WAIT_TIMEOUT_MS: u64 = 35_000;
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh/";
pub const DEFAULT_VERIFY_PATH: &str = "/auth/verify/";
pub const DEFAULT_LOGOUT_PATH: &str = "/auth/logout/";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_token_refresh_interval_ms")]
    pub token_refresh_interval_ms: u64,
    #[serde(default = "default_queue_wait_timeout_ms")]
    pub queue_wait_timeout_ms: u64,
    #[serde(default = "default_login_route")]
    pub login_route: String,
    #[serde(default)]
    pub debug_auth: bool,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_verify_path")]
    pub verify_path: String,
    #[serde(default = "default_logout_path")]
    pub logout_path: String,
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_token_refresh_interval_ms() -> u64 {
    DEFAULT_TOKEN_REFRESH_INTERVAL_MS
}

fn default_queue_wait_timeout_ms() -> u64 {
    DEFAULT_QUEUE_WAIT_TIMEOUT_MS
}

fn default_login_route() -> String {
    DEFAULT_LOGIN_ROUTE.to_string()
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

fn default_verify_path() -> String {
    DEFAULT_VERIFY_PATH.to_string()
}

fn default_logout_path() -> String {
    DEFAULT_LOGOUT_PATH.to_string()
}

impl Config {
    /// Configuration with every optional field at its default.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            token_refresh_interval_ms: DEFAULT_TOKEN_REFRESH_INTERVAL_MS,
            queue_wait_timeout_ms: DEFAULT_QUEUE_WAIT_TIMEOUT_MS,
            login_route: default_login_route(),
            debug_auth: false,
            refresh_path: default_refresh_path(),
            verify_path: default_verify_path(),
            logout_path: default_logout_path(),
        }
    }

    pub fn from_values(
        base_url: impl Into<String>,
        request_timeout_ms: Option<u64>,
        token_refresh_interval_ms: Option<u64>,
        login_route: Option<String>,
        debug_auth: bool,
    ) -> Self {
        let mut cfg = Self::new(base_url);
        if let Some(ms) = request_timeout_ms {
            cfg.request_timeout_ms = ms;
        }
        if let Some(ms) = token_refresh_interval_ms {
            cfg.token_refresh_interval_ms = ms;
        }
        if let Some(route) = login_route {
            cfg.login_route = route;
        }
        cfg.debug_auth = debug_auth;
        cfg
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let cfg: Config = serde_json::from_str(&contents)?;
        Ok(cfg)
    }

    /// Reads the configuration from process environment variables.
    ///
    /// # ENV Vars
    /// * `API_URL` - Base URL of the REST backend (required)
    /// * `API_TIMEOUT_MS` - Whole-request timeout
    /// * `TOKEN_REFRESH_INTERVAL_MS` - Refresh check interval; the refresh throttle is half of it
    /// * `QUEUE_WAIT_TIMEOUT_MS` - How long a queued request waits for an in-flight refresh
    /// * `LOGIN_ROUTE` - Redirect target when the session cannot be recovered
    /// * `DEBUG_AUTH` - `true`/`1` to log auth events at INFO
    /// * `AUTH_REFRESH_PATH`, `AUTH_VERIFY_PATH`, `AUTH_LOGOUT_PATH` - Auth endpoint overrides
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an injectable variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url =
            lookup("API_URL").ok_or_else(|| Error::Config("Missing API_URL env var".to_string()))?;
        let mut cfg = Self::new(base_url);
        if let Some(v) = lookup("API_TIMEOUT_MS") {
            cfg.request_timeout_ms = parse_millis("API_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("TOKEN_REFRESH_INTERVAL_MS") {
            cfg.token_refresh_interval_ms = parse_millis("TOKEN_REFRESH_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("QUEUE_WAIT_TIMEOUT_MS") {
            cfg.queue_wait_timeout_ms = parse_millis("QUEUE_WAIT_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("LOGIN_ROUTE") {
            cfg.login_route = v;
        }
        if let Some(v) = lookup("DEBUG_AUTH") {
            cfg.debug_auth = matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = lookup("AUTH_REFRESH_PATH") {
            cfg.refresh_path = v;
        }
        if let Some(v) = lookup("AUTH_VERIFY_PATH") {
            cfg.verify_path = v;
        }
        if let Some(v) = lookup("AUTH_LOGOUT_PATH") {
            cfg.logout_path = v;
        }
        Ok(cfg)
    }

    /// Parses the base URL, defaulting the scheme to https when it is missing.
    pub fn base(&self) -> Result<Url, Error> {
        let raw = self.base_url.trim();
        let with_scheme = if has_scheme(raw) {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };
        Url::parse(&with_scheme)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", with_scheme, e)))
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.base()?;
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("Request timeout must be > 0".into()));
        }
        if self.token_refresh_interval_ms == 0 {
            return Err(Error::Config("Token refresh interval must be > 0".into()));
        }
        if self.queue_wait_timeout_ms == 0 {
            return Err(Error::Config("Queue wait timeout must be > 0".into()));
        }
        for (name, path) in [
            ("refresh_path", &self.refresh_path),
            ("verify_path", &self.verify_path),
            ("logout_path", &self.logout_path),
        ] {
            if path.trim_matches('/').is_empty() {
                return Err(Error::Config(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn token_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.token_refresh_interval_ms)
    }

    pub fn queue_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_wait_timeout_ms)
    }
}

fn parse_millis(key: &str, value: &str) -> Result<u64, Error> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} must be a number of milliseconds, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn env_defaults_apply() {
        let cfg = Config::from_lookup(lookup(&[("API_URL", "http://localhost:8000/api")])).unwrap();
        assert_eq!(cfg.request_timeout_ms, 30_000);
        assert_eq!(cfg.login_route, "/login");
        assert_eq!(cfg.refresh_path, "/auth/refresh/");
        assert!(!cfg.debug_auth);
    }

    #[test]
    fn env_overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup(&[
            ("API_URL", "http://localhost:8000/api"),
            ("API_TIMEOUT_MS", "5000"),
            ("TOKEN_REFRESH_INTERVAL_MS", "60000"),
            ("DEBUG_AUTH", "true"),
            ("LOGIN_ROUTE", "/signin"),
        ]))
        .unwrap();
        assert_eq!(cfg.request_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.token_refresh_interval(), Duration::from_secs(60));
        assert!(cfg.debug_auth);
        assert_eq!(cfg.login_route, "/signin");
    }

    #[test]
    fn missing_base_url_is_config_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("API_URL")));
    }

    #[test]
    fn non_numeric_timeout_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("API_URL", "http://localhost"),
            ("API_TIMEOUT_MS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn base_without_scheme_defaults_to_https() {
        let cfg = Config::new("api.example.com");
        assert_eq!(cfg.base().unwrap().scheme(), "https");
    }

    #[test]
    fn zero_interval_fails_validation() {
        let mut cfg = Config::new("http://localhost");
        cfg.token_refresh_interval_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_queue_wait_fails_validation() {
        let mut cfg = Config::new("http://localhost");
        cfg.queue_wait_timeout_ms = 0;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("Queue wait timeout")));
    }

    #[test]
    fn base_without_scheme_but_url_in_query_defaults_to_https() {
        let cfg = Config::new("api.example.com/?next=https://other.example.com");
        let base = cfg.base().unwrap();
        assert_eq!(base.scheme(), "https");
        assert_eq!(base.host_str(), Some("api.example.com"));
    }

    #[test]
    fn json_file_fills_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"base_url": "http://localhost"}"#).unwrap();
        assert_eq!(cfg.queue_wait_timeout_ms, DEFAULT_QUEUE_WAIT_TIMEOUT_MS);
        assert_eq!(cfg.logout_path, "/auth/logout/");
    }
}
