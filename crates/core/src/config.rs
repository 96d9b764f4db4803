use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub worker: WorkerConfig,
    pub http: HttpConfig,
    pub retry: RetryConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FEEDPOLL_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("FEEDPOLL_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            worker: WorkerConfig::from_env_profiled(p),
            http: HttpConfig::from_env_profiled(p),
            retry: RetryConfig::from_env_profiled(p),
            notify: NotifyConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// SMTP settings for the active profile. Only the notification path needs
    /// these, so a missing key is reported to the caller instead of failing
    /// config loading as a whole.
    pub fn smtp(&self) -> Result<SmtpConfig, ConfigError> {
        let p = self.profile.clone();
        SmtpConfig::from_lookup(|key: &str| profiled_env_opt(&p, key))
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  worker:  concurrency={}, idle_poll_ms={}, poll_interval_secs={}",
            self.worker.concurrency,
            self.worker.idle_poll_ms,
            self.worker.poll_interval_secs
        );
        tracing::info!(
            "  http:    timeout_secs={}, user_agent={}",
            self.http.timeout_secs,
            self.http.user_agent
        );
        tracing::info!(
            "  retry:   base_backoff_ms={}, max_backoff_ms={}",
            self.retry.base_backoff_ms,
            self.retry.max_backoff_ms
        );
        tracing::info!(
            "  notify:  subject_template={}, body_template_path={}",
            if self.notify.subject_template.is_some() { "custom" } else { "default" },
            self.notify
                .body_template_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "default".to_string())
        );
    }
}

// ── Worker ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Size of the fixed worker pool.
    pub concurrency: u32,
    /// Sleep between queue polls when nothing is ready.
    pub idle_poll_ms: u64,
    /// Interval for re-enqueueing every publisher. 0 = run once.
    pub poll_interval_secs: u64,
}

impl WorkerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            concurrency: profiled_env_u32(p, "WORKER_CONCURRENCY", 4).max(1),
            idle_poll_ms: profiled_env_u64(p, "WORKER_IDLE_POLL_MS", 250),
            poll_interval_secs: profiled_env_u64(p, "POLL_INTERVAL_SECS", 300),
        }
    }
}

// ── HTTP ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl HttpConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            timeout_secs: profiled_env_u64(p, "HTTP_TIMEOUT_SECS", 30),
            user_agent: profiled_env_or(
                p,
                "HTTP_USER_AGENT",
                concat!("feedpoll/", env!("CARGO_PKG_VERSION")),
            ),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("feedpoll/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// ── Retry ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl RetryConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_backoff_ms: profiled_env_u64(p, "RETRY_BASE_BACKOFF_MS", 1000),
            max_backoff_ms: profiled_env_u64(p, "RETRY_MAX_BACKOFF_MS", 60_000),
        }
    }
}

// ── Notification templates ────────────────────────────────

/// Overrides for the failure email. Unset fields keep the built-in template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub subject_template: Option<String>,
    /// File holding the HTML body template.
    pub body_template_path: Option<PathBuf>,
}

impl NotifyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            subject_template: profiled_env_opt(p, "NOTIFY_SUBJECT_TEMPLATE"),
            body_template_path: profiled_env_opt(p, "NOTIFY_BODY_TEMPLATE_PATH").map(PathBuf::from),
        }
    }
}

// ── SMTP ──────────────────────────────────────────────────────

/// How the SMTP connection negotiates TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartTlsPolicy {
    /// Upgrade with STARTTLS when the server offers it.
    Auto,
    /// Refuse to send unless STARTTLS succeeds.
    Always,
    /// Plaintext connection.
    Never,
}

impl std::str::FromStr for StartTlsPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "true" => Ok(Self::Auto),
            "always" | "required" => Ok(Self::Always),
            "never" | "false" => Ok(Self::Never),
            other => Err(ConfigError::Invalid {
                key: "SMTP_STARTTLS".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub from_address: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Name announced in EHLO.
    pub domain: String,
    pub starttls: StartTlsPolicy,
}

impl SmtpConfig {
    /// Build from an arbitrary key lookup. Every key except `SMTP_STARTTLS`
    /// is required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::Missing(key.to_string()));

        let port_raw = required("SMTP_PORT")?;
        let port = port_raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
            key: "SMTP_PORT".to_string(),
            value: port_raw.clone(),
        })?;

        let starttls = match lookup("SMTP_STARTTLS") {
            Some(v) => v.parse()?,
            None => StartTlsPolicy::Auto,
        };

        Ok(Self {
            from_address: required("SMTP_FROM_ADDRESS")?,
            host: required("SMTP_ADDRESS")?,
            port,
            username: required("SMTP_USER_NAME")?,
            password: required("SMTP_PASSWORD")?,
            domain: required("SMTP_DOMAIN")?,
            starttls,
        })
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("from_address", &self.from_address)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .field("starttls", &self.starttls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn smtp_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SMTP_FROM_ADDRESS", "alerts@feeds.example"),
            ("SMTP_ADDRESS", "smtp.feeds.example"),
            ("SMTP_PORT", "587"),
            ("SMTP_USER_NAME", "mailer"),
            ("SMTP_PASSWORD", "hunter2"),
            ("SMTP_DOMAIN", "feeds.example"),
        ])
    }

    fn lookup<'a>(map: &'a HashMap<&'static str, &'static str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn smtp_from_complete_env() {
        let env = smtp_env();
        let cfg = SmtpConfig::from_lookup(lookup(&env)).unwrap();
        assert_eq!(cfg.host, "smtp.feeds.example");
        assert_eq!(cfg.port, 587);
        assert_eq!(cfg.starttls, StartTlsPolicy::Auto);
    }

    #[test]
    fn smtp_missing_key_is_reported_by_name() {
        let mut env = smtp_env();
        env.remove("SMTP_DOMAIN");
        let err = SmtpConfig::from_lookup(lookup(&env)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("SMTP_DOMAIN".to_string()));
    }

    #[test]
    fn smtp_bad_port() {
        let mut env = smtp_env();
        env.insert("SMTP_PORT", "smtp");
        let err = SmtpConfig::from_lookup(lookup(&env)).unwrap_err();
        assert!(err.to_string().contains("SMTP_PORT"), "got: {err}");
    }

    #[test]
    fn smtp_starttls_policy_parsing() {
        let mut env = smtp_env();
        env.insert("SMTP_STARTTLS", "never");
        let cfg = SmtpConfig::from_lookup(lookup(&env)).unwrap();
        assert_eq!(cfg.starttls, StartTlsPolicy::Never);

        assert_eq!("ALWAYS".parse::<StartTlsPolicy>().unwrap(), StartTlsPolicy::Always);
        assert!("sometimes".parse::<StartTlsPolicy>().is_err());
    }

    #[test]
    fn smtp_debug_redacts_password() {
        let env = smtp_env();
        let cfg = SmtpConfig::from_lookup(lookup(&env)).unwrap();
        let dbg = format!("{:?}", cfg);
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn smtp_serialization_omits_password() {
        let env = smtp_env();
        let cfg = SmtpConfig::from_lookup(lookup(&env)).unwrap();
        let json = serde_json::to_value(&cfg).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["username"], "mailer");
        assert!(!json.to_string().contains("hunter2"));
    }

    #[test]
    fn notify_overrides_follow_profile() {
        std::env::set_var("NOTIFYTEST_NOTIFY_SUBJECT_TEMPLATE", "Feed {{ publisher.id }} down");
        std::env::set_var("NOTIFYTEST_NOTIFY_BODY_TEMPLATE_PATH", "/etc/feedpoll/body.html");
        let cfg = Config::for_profile("notifytest");
        assert_eq!(
            cfg.notify.subject_template.as_deref(),
            Some("Feed {{ publisher.id }} down")
        );
        assert_eq!(
            cfg.notify.body_template_path,
            Some(PathBuf::from("/etc/feedpoll/body.html"))
        );
    }

    #[test]
    fn profile_label_defaults() {
        let cfg = Config::for_profile("");
        assert_eq!(cfg.profile_label(), "default");
        let cfg = Config::for_profile("prod");
        assert_eq!(cfg.profile_label(), "PROD");
    }
}
