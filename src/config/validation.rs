use crate::config::types::{
    Config, LimitsConfig, OutputConfig, PageSpeedConfig, PipelineConfig, SearchConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_pagespeed_config(&config.pagespeed)?;
    validate_limits_config(&config.limits)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates search configuration
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    validate_endpoint("search.endpoint", &config.endpoint)?;

    if config.page_size < 1 || config.page_size > 10 {
        return Err(ConfigError::Validation(format!(
            "search.page-size must be between 1 and 10, got {}",
            config.page_size
        )));
    }

    if config.max_results < 1 || config.max_results > 100 {
        return Err(ConfigError::Validation(format!(
            "search.max-results must be between 1 and 100, got {}",
            config.max_results
        )));
    }

    Ok(())
}

/// Validates PageSpeed configuration
fn validate_pagespeed_config(config: &PageSpeedConfig) -> Result<(), ConfigError> {
    validate_endpoint("pagespeed.endpoint", &config.endpoint)?;

    if config.strategy != "mobile" && config.strategy != "desktop" {
        return Err(ConfigError::Validation(format!(
            "pagespeed.strategy must be 'mobile' or 'desktop', got '{}'",
            config.strategy
        )));
    }

    Ok(())
}

/// Validates daily quotas
fn validate_limits_config(config: &LimitsConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("search-queries-per-day", config.search_queries_per_day),
        ("pagespeed-queries-per-day", config.pagespeed_queries_per_day),
        ("fingerprint-checks-per-day", config.fingerprint_checks_per_day),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "limits.{} must be >= 1, got {}",
                name, value
            )));
        }
    }

    Ok(())
}

/// Validates pipeline configuration
fn validate_pipeline_config(config: &PipelineConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 16 {
        return Err(ConfigError::Validation(format!(
            "pipeline.concurrency must be between 1 and 16, got {}",
            config.concurrency
        )));
    }

    if config.call_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "pipeline.call-timeout-secs must be >= 1, got {}",
            config.call_timeout_secs
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Endpoints must be absolute http(s) URLs
fn validate_endpoint(name: &str, endpoint: &str) -> Result<(), ConfigError> {
    let url = Url::parse(endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::Validation(format!(
            "{} must use http or https, got '{}'",
            name,
            url.scheme()
        )));
    }

    Ok(())
}
