use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Provider base URL and credentials are non-empty
/// - Notifier has a webhook URL when enabled
/// - Thresholds are non-negative
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Provider validation
    if config.provider.base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "provider.base_url cannot be empty".to_string(),
        ));
    }
    if config.provider.username.is_empty() || config.provider.password.is_empty() {
        return Err(ConfigError::ValidationError(
            "provider credentials cannot be empty".to_string(),
        ));
    }

    // Notifier validation
    if config.notifier.enabled && config.notifier.webhook_url.is_none() {
        return Err(ConfigError::ValidationError(
            "notifier.webhook_url is required when notifier.enabled = true".to_string(),
        ));
    }
    if config.notifier.price_change_threshold_pct < 0.0 {
        return Err(ConfigError::ValidationError(
            "notifier.price_change_threshold_pct cannot be negative".to_string(),
        ));
    }

    // Refresh validation
    if config.refresh.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "refresh.batch_size cannot be 0".to_string(),
        ));
    }
    if config.refresh.manual_threshold_pct < 0.0 {
        return Err(ConfigError::ValidationError(
            "refresh.manual_threshold_pct cannot be negative".to_string(),
        ));
    }

    // Bot validation
    if config.bot.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "bot.timeout_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        BotConfig, CronConfig, DatabaseConfig, NotifierConfig, ProviderConfig, RefreshConfig,
        ServerConfig,
    };

    fn valid_config() -> Config {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            provider: ProviderConfig {
                base_url: "https://api.example.com".to_string(),
                username: "agency".to_string(),
                password: "pw".to_string(),
                timeout_secs: 30,
                token_safety_margin_secs: 60,
            },
            bot: BotConfig::default(),
            refresh: RefreshConfig::default(),
            notifier: NotifierConfig::default(),
            cron: CronConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = valid_config();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_empty_credentials_fails() {
        let mut config = valid_config();
        config.provider.password = String::new();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_notifier_enabled_without_webhook_fails() {
        let mut config = valid_config();
        config.notifier.enabled = true;
        config.notifier.webhook_url = None;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_notifier_enabled_with_webhook_ok() {
        let mut config = valid_config();
        config.notifier.enabled = true;
        config.notifier.webhook_url = Some("https://hooks.example.com/x".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_batch_size_fails() {
        let mut config = valid_config();
        config.refresh.batch_size = 0;
        assert!(validate_config(&config).is_err());
    }
}
