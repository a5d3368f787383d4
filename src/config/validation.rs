use crate::config::types::{Config, CrawlerConfig, OutputConfig, SessionConfig, TargetConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_target_config(&config.target)?;
    validate_session_config(&config.session)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the identifier range and pacing settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    match config.end_id {
        None => {
            return Err(ConfigError::Validation(
                "end-id is required (set it in [crawler] or pass --end)".to_string(),
            ))
        }
        Some(0) => {
            return Err(ConfigError::Validation(
                "end-id must be >= 1, got 0".to_string(),
            ))
        }
        Some(_) => {}
    }

    if config.start_id == Some(0) {
        return Err(ConfigError::Validation(
            "start-id must be >= 1, got 0".to_string(),
        ));
    }

    if !config.delay_min.is_finite() || !config.delay_max.is_finite() {
        return Err(ConfigError::Validation(
            "delay-min and delay-max must be finite".to_string(),
        ));
    }

    if config.delay_min < 0.0 {
        return Err(ConfigError::Validation(format!(
            "delay-min must be >= 0, got {}",
            config.delay_min
        )));
    }

    if config.delay_max < config.delay_min {
        return Err(ConfigError::Validation(format!(
            "delay-max ({}) must be >= delay-min ({})",
            config.delay_max, config.delay_min
        )));
    }

    if config.summary_every < 1 {
        return Err(ConfigError::Validation(
            "summary-every must be >= 1, got 0".to_string(),
        ));
    }

    if config.fetch_timeout_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "fetch-timeout-ms must be >= 100ms, got {}ms",
            config.fetch_timeout_ms
        )));
    }

    Ok(())
}

/// Validates the storefront settings
fn validate_target_config(config: &TargetConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' must use http or https",
            config.base_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url '{}' has no host",
            config.base_url
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the session settings
fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "session path cannot be empty".to_string(),
        ));
    }

    if let Some(command) = &config.solve_command {
        if command.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "solve-command must name a program".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.csv_path.is_empty() {
        return Err(ConfigError::Validation(
            "csv-path cannot be empty".to_string(),
        ));
    }

    if config.progress_path.is_empty() {
        return Err(ConfigError::Validation(
            "progress-path cannot be empty".to_string(),
        ));
    }

    if config.progress_path == config.csv_path {
        return Err(ConfigError::Validation(
            "progress-path and csv-path must differ".to_string(),
        ));
    }

    Ok(())
}
