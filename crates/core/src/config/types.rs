use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub cron: CronConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("faretrack.db")
}

/// Upstream pricing provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider API base URL (e.g., "https://api.example-provider.com")
    pub base_url: String,
    /// Provider account username
    pub username: String,
    /// Provider account password
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u32,
    /// Refresh the auth token this many seconds before it expires (default: 60)
    #[serde(default = "default_token_margin")]
    pub token_safety_margin_secs: u32,
}

fn default_provider_timeout() -> u32 {
    30
}

fn default_token_margin() -> u32 {
    60
}

/// Requote bot process configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    /// Program to execute (default: "node")
    #[serde(default = "default_bot_program")]
    pub program: String,
    /// Arguments passed to the program
    #[serde(default = "default_bot_args")]
    pub args: Vec<String>,
    /// Working directory for the bot process
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Hard wall-clock timeout for one supervised run in seconds (default: 600)
    #[serde(default = "default_bot_timeout")]
    pub timeout_secs: u64,
    /// Buffer size for the progress event channel (default: 256)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            program: default_bot_program(),
            args: default_bot_args(),
            working_dir: None,
            timeout_secs: default_bot_timeout(),
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_bot_program() -> String {
    "node".to_string()
}

fn default_bot_args() -> Vec<String> {
    vec!["bot/requote.js".to_string()]
}

fn default_bot_timeout() -> u64 {
    600
}

fn default_event_buffer() -> usize {
    256
}

/// Price refresh batch job configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshConfig {
    /// Maximum number of packages refreshed per batch (default: 20)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Delay between packages in milliseconds, an upstream rate-limit control (default: 500)
    #[serde(default = "default_item_delay")]
    pub item_delay_ms: u64,
    /// Absolute variance percentage at or beyond which a change needs manual review (default: 5.0)
    #[serde(default = "default_manual_threshold")]
    pub manual_threshold_pct: f64,
    /// Dispatch a price-change notification from the batch loop (default: true)
    #[serde(default = "default_true")]
    pub notify_on_price_change: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            item_delay_ms: default_item_delay(),
            manual_threshold_pct: default_manual_threshold(),
            notify_on_price_change: default_true(),
        }
    }
}

fn default_batch_size() -> usize {
    20
}

fn default_item_delay() -> u64 {
    500
}

fn default_manual_threshold() -> f64 {
    5.0
}

fn default_true() -> bool {
    true
}

/// Notification gate configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifierConfig {
    /// Global channel enable flag (default: false)
    #[serde(default)]
    pub enabled: bool,
    /// Webhook endpoint for the notification channel
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Webhook request timeout in seconds (default: 10)
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u32,
    /// Per-type toggle: price change notifications (default: true)
    #[serde(default = "default_true")]
    pub notify_price_change: bool,
    /// Per-type toggle: manual quote notifications (default: true)
    #[serde(default = "default_true")]
    pub notify_manual_quote: bool,
    /// Per-type toggle: ad underperformance notifications (default: true)
    #[serde(default = "default_true")]
    pub notify_underperformance: bool,
    /// Minimum absolute price change percentage worth notifying (default: 5.0)
    #[serde(default = "default_manual_threshold")]
    pub price_change_threshold_pct: f64,
    /// CTR floor for underperformance checks, percent (default: 1.0)
    #[serde(default = "default_ctr_floor")]
    pub ctr_floor_pct: f64,
    /// CPL ceiling for underperformance checks (default: 50.0)
    #[serde(default = "default_cpl_ceiling")]
    pub cpl_ceiling: f64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            timeout_secs: default_webhook_timeout(),
            notify_price_change: default_true(),
            notify_manual_quote: default_true(),
            notify_underperformance: default_true(),
            price_change_threshold_pct: default_manual_threshold(),
            ctr_floor_pct: default_ctr_floor(),
            cpl_ceiling: default_cpl_ceiling(),
        }
    }
}

fn default_webhook_timeout() -> u32 {
    10
}

fn default_ctr_floor() -> f64 {
    1.0
}

fn default_cpl_ceiling() -> f64 {
    50.0
}

/// Cron endpoint configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CronConfig {
    /// Shared secret required as a bearer token on cron endpoints.
    /// Unset means the endpoint is misconfigured and answers 500.
    #[serde(default)]
    pub secret: Option<String>,
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub provider: SanitizedProviderConfig,
    pub bot: BotConfig,
    pub refresh: RefreshConfig,
    pub notifier: SanitizedNotifierConfig,
    pub cron: SanitizedCronConfig,
}

/// Sanitized provider config (credentials hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProviderConfig {
    pub base_url: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u32,
}

/// Sanitized notifier config (webhook URL hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNotifierConfig {
    pub enabled: bool,
    pub webhook_configured: bool,
    pub notify_price_change: bool,
    pub notify_manual_quote: bool,
    pub notify_underperformance: bool,
    pub price_change_threshold_pct: f64,
    pub ctr_floor_pct: f64,
    pub cpl_ceiling: f64,
}

/// Sanitized cron config (secret hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCronConfig {
    pub secret_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            provider: SanitizedProviderConfig {
                base_url: config.provider.base_url.clone(),
                username: config.provider.username.clone(),
                password_configured: !config.provider.password.is_empty(),
                timeout_secs: config.provider.timeout_secs,
            },
            bot: config.bot.clone(),
            refresh: config.refresh.clone(),
            notifier: SanitizedNotifierConfig {
                enabled: config.notifier.enabled,
                webhook_configured: config.notifier.webhook_url.is_some(),
                notify_price_change: config.notifier.notify_price_change,
                notify_manual_quote: config.notifier.notify_manual_quote,
                notify_underperformance: config.notifier.notify_underperformance,
                price_change_threshold_pct: config.notifier.price_change_threshold_pct,
                ctr_floor_pct: config.notifier.ctr_floor_pct,
                cpl_ceiling: config.notifier.cpl_ceiling,
            },
            cron: SanitizedCronConfig {
                secret_configured: config.cron.secret.is_some(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            provider: ProviderConfig {
                base_url: "https://api.example.com".to_string(),
                username: "agency".to_string(),
                password: "hunter2".to_string(),
                timeout_secs: 30,
                token_safety_margin_secs: 60,
            },
            bot: BotConfig::default(),
            refresh: RefreshConfig::default(),
            notifier: NotifierConfig {
                enabled: true,
                webhook_url: Some("https://hooks.example.com/abc".to_string()),
                ..NotifierConfig::default()
            },
            cron: CronConfig {
                secret: Some("s3cret".to_string()),
            },
        }
    }

    #[test]
    fn test_sanitized_config_redacts_secrets() {
        let config = test_config();
        let sanitized = SanitizedConfig::from(&config);

        assert!(sanitized.provider.password_configured);
        assert!(sanitized.notifier.webhook_configured);
        assert!(sanitized.cron.secret_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("hooks.example.com"));
        assert!(!json.contains("s3cret"));
    }

    #[test]
    fn test_defaults() {
        let refresh = RefreshConfig::default();
        assert_eq!(refresh.batch_size, 20);
        assert_eq!(refresh.item_delay_ms, 500);
        assert!((refresh.manual_threshold_pct - 5.0).abs() < f64::EPSILON);

        let bot = BotConfig::default();
        assert_eq!(bot.timeout_secs, 600);

        let notifier = NotifierConfig::default();
        assert!(!notifier.enabled);
        assert!(notifier.notify_price_change);
    }
}
