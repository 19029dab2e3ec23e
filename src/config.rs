use std::{env, path::PathBuf, time::Duration};

use crate::error::ConfigError;

/// Request timeout used by the portal client unless `PORTAL_TIMEOUT_MS` says otherwise.
pub const DEFAULT_TIMEOUT_MS: u64 = 45_000;

/// GateConfig
///
/// Holds the client's configuration. Loaded once at startup and then shared by the
/// transport, the endpoint classifier and the session store. The strict-endpoint list
/// lives here so that adding a 1C endpoint that rejects extra query keys is a
/// deployment change, not a code change.
#[derive(Clone, Debug)]
pub struct GateConfig {
    // Runtime environment marker. Controls log format and which variables are mandatory.
    pub env: Env,
    // Absolute base URL every request path is joined onto.
    pub api_base_url: String,
    // Optional leading path segment stripped before endpoint classification.
    pub api_prefix: String,
    // Per-request timeout applied by the transport.
    pub timeout: Duration,
    // Segment patterns of endpoints that must receive no auth material.
    pub strict_endpoints: Vec<String>,
    // The only query parameter strict endpoints accept.
    pub strict_query_param: String,
    // Directory holding the persisted session record.
    pub session_dir: PathBuf,
}

/// Env
///
/// Runtime context. `Local` is lenient and logs human-readable output,
/// `Production` requires an explicit API base URL and logs JSON.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for GateConfig {
    /// Test-friendly configuration that needs no environment variables.
    fn default() -> Self {
        Self {
            env: Env::Local,
            api_base_url: "http://localhost:8081/api".to_string(),
            api_prefix: "/api".to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            strict_endpoints: vec!["Dogovor".to_string()],
            strict_query_param: "nomer".to_string(),
            session_dir: default_session_dir(),
        }
    }
}

impl GateConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. Every variable except
    /// `PORTAL_API_BASE_URL` in production has a fallback; a malformed value is an
    /// error rather than a silent default.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let defaults = Self::default();

        let api_base_url = match (env, env::var("PORTAL_API_BASE_URL")) {
            (_, Ok(url)) if !url.trim().is_empty() => url.trim().to_string(),
            (Env::Production, _) => return Err(ConfigError::Missing("PORTAL_API_BASE_URL")),
            (Env::Local, _) => defaults.api_base_url,
        };

        let timeout = match env::var("PORTAL_TIMEOUT_MS") {
            Ok(raw) => {
                let millis = raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|millis| *millis > 0)
                    .ok_or_else(|| ConfigError::Invalid {
                        var: "PORTAL_TIMEOUT_MS",
                        value: raw.clone(),
                    })?;
                Duration::from_millis(millis)
            }
            Err(_) => defaults.timeout,
        };

        let strict_endpoints = match env::var("PORTAL_STRICT_ENDPOINTS") {
            Ok(raw) => parse_list(&raw),
            Err(_) => defaults.strict_endpoints,
        };

        Ok(Self {
            env,
            api_base_url,
            api_prefix: env::var("PORTAL_API_PREFIX").unwrap_or(defaults.api_prefix),
            timeout,
            strict_endpoints,
            strict_query_param: env::var("PORTAL_STRICT_QUERY_PARAM")
                .ok()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or(defaults.strict_query_param),
            session_dir: env::var("PORTAL_SESSION_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_dir),
        })
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn default_session_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join("portal-gate")
}
