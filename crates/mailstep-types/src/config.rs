//! Service configuration types for mailstep.
//!
//! `RelayConfig` represents `mailstep.toml`. Every field has a default so an
//! empty file (or no file at all) yields a usable configuration apart from
//! the secrets, which normally arrive through the environment.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub mail: MailApiConfig,
    #[serde(default)]
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub activity: ActivityStoreConfig,
}

impl RelayConfig {
    /// Longest an execution can run before it settles: one token exchange,
    /// `max_attempts` sends and a capped backoff between consecutive sends.
    ///
    /// Must stay below `dispatch.response_budget`.
    pub fn worst_case_execution(&self) -> Duration {
        let attempts = self.dispatch.max_attempts.max(1);
        let requests = self.mail.request_timeout().saturating_mul(attempts.saturating_add(1));
        let backoffs = self.dispatch.max_backoff().saturating_mul(attempts - 1);
        requests.saturating_add(backoffs)
    }
}

/// HTTP listener and static asset settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory holding the activity configuration UI assets.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    /// Origins allowed to frame the configuration UI (CSP `frame-ancestors`).
    #[serde(default = "default_frame_ancestors")]
    pub frame_ancestors: Vec<String>,
    /// Remaining Content-Security-Policy source lists for the UI.
    #[serde(default)]
    pub csp: ContentSecurityConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_static_dir() -> String {
    "public".to_string()
}

fn default_frame_ancestors() -> Vec<String> {
    sources(&["https://*.marketingcloudapps.com", "https://*.salesforce.com"])
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            frame_ancestors: default_frame_ancestors(),
            csp: ContentSecurityConfig::default(),
        }
    }
}

/// Per-directive CSP sources. `'self'` is always allowed in addition to
/// the listed sources; `default-src`, `object-src` and `form-action` are
/// fixed.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentSecurityConfig {
    #[serde(default = "default_script_src")]
    pub script_src: Vec<String>,
    #[serde(default = "default_style_src")]
    pub style_src: Vec<String>,
    #[serde(default = "default_img_src")]
    pub img_src: Vec<String>,
    #[serde(default = "default_connect_src")]
    pub connect_src: Vec<String>,
    #[serde(default = "default_font_src")]
    pub font_src: Vec<String>,
    #[serde(default = "default_upgrade_insecure_requests")]
    pub upgrade_insecure_requests: bool,
}

fn sources(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_script_src() -> Vec<String> {
    sources(&[
        "https://*.marketingcloudapps.com",
        "https://*.exacttarget.com",
        "https://*.postgrid.com",
        "https://*.salesforce.com",
        "https://code.jquery.com",
        "https://cdnjs.cloudflare.com",
        "https://cdn.jsdelivr.net",
    ])
}

fn default_style_src() -> Vec<String> {
    sources(&[
        "https://*.marketingcloudapps.com",
        "https://fonts.googleapis.com",
        "https://cdnjs.cloudflare.com",
    ])
}

fn default_img_src() -> Vec<String> {
    sources(&[
        "data:",
        "blob:",
        "https://*.marketingcloudapps.com",
        "https://*.postgrid.com",
    ])
}

fn default_connect_src() -> Vec<String> {
    sources(&["https://*.marketingcloudapps.com", "https://api.postgrid.com"])
}

fn default_font_src() -> Vec<String> {
    sources(&["https://fonts.gstatic.com", "https://cdnjs.cloudflare.com"])
}

fn default_upgrade_insecure_requests() -> bool {
    true
}

impl Default for ContentSecurityConfig {
    fn default() -> Self {
        Self {
            script_src: default_script_src(),
            style_src: default_style_src(),
            img_src: default_img_src(),
            connect_src: default_connect_src(),
            font_src: default_font_src(),
            upgrade_insecure_requests: default_upgrade_insecure_requests(),
        }
    }
}

/// Settings for verifying orchestrator callback tokens.
#[derive(Debug, Deserialize)]
pub struct OrchestratorConfig {
    /// Shared HS256 signing secret.
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub jwt_secret: Option<SecretString>,
    /// Accepted distance between a token's `iat` and now.
    #[serde(default = "default_max_clock_skew_secs")]
    pub max_clock_skew_secs: u64,
}

fn default_max_clock_skew_secs() -> u64 {
    300
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            max_clock_skew_secs: default_max_clock_skew_secs(),
        }
    }
}

impl OrchestratorConfig {
    pub fn max_clock_skew(&self) -> Duration {
        Duration::from_secs(self.max_clock_skew_secs)
    }
}

/// Downstream mail-delivery API endpoints and client credentials.
#[derive(Debug, Deserialize)]
pub struct MailApiConfig {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub token_url: String,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub client_id: Option<SecretString>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub client_secret: Option<SecretString>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default = "default_send_path")]
    pub send_path: String,
    #[serde(default = "default_template_path")]
    pub template_path: String,
    /// Per-request timeout for token and send calls.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_send_path() -> String {
    "/messages".to_string()
}

fn default_template_path() -> String {
    "/templates".to_string()
}

fn default_request_timeout_ms() -> u64 {
    3_000
}

impl Default for MailApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token_url: String::new(),
            client_id: None,
            client_secret: None,
            scope: None,
            account_id: None,
            send_path: default_send_path(),
            template_path: default_template_path(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl MailApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Credential cache tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialConfig {
    /// A cached token is refreshed once it has less than this left.
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,
}

fn default_refresh_margin_secs() -> u64 {
    60
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            refresh_margin_secs: default_refresh_margin_secs(),
        }
    }
}

impl CredentialConfig {
    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }
}

/// Execution dispatcher retry and deduplication settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Total send attempts per execution, first attempt included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// How long an execute callback waits before answering `pending`.
    #[serde(default = "default_response_budget_ms")]
    pub response_budget_ms: u64,
    /// How long completed outcomes are kept for deduplication.
    #[serde(default = "default_dedup_retention_secs")]
    pub dedup_retention_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    250
}

fn default_max_backoff_ms() -> u64 {
    1_000
}

fn default_response_budget_ms() -> u64 {
    20_000
}

fn default_dedup_retention_secs() -> u64 {
    900
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            response_budget_ms: default_response_budget_ms(),
            dedup_retention_secs: default_dedup_retention_secs(),
        }
    }
}

impl DispatchConfig {
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn response_budget(&self) -> Duration {
        Duration::from_millis(self.response_budget_ms)
    }

    pub fn dedup_retention(&self) -> Duration {
        Duration::from_secs(self.dedup_retention_secs)
    }
}

/// Activity configuration store settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityStoreConfig {
    /// Template references accepted at validate time. Empty accepts any.
    #[serde(default)]
    pub known_templates: Vec<String>,
    /// JSON snapshot file for durable activity records.
    #[serde(default)]
    pub data_file: Option<String>,
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}
