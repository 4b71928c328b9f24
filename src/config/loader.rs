//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, LogFormat};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a TOML document without validating it.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load a TOML file, apply `GATEWAY_*` overrides, and validate the result.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    finalize(config)
}

/// Apply environment overrides to `config` and validate it.
pub fn finalize(mut config: GatewayConfig) -> Result<GatewayConfig, ConfigError> {
    let mut errors = apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    if let Err(found) = validate_config(&config) {
        errors.extend(found);
    }

    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::Validation(errors))
    }
}

fn parse_var<T: std::str::FromStr>(
    key: &str,
    raw: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(ValidationError::new(key, format!("cannot parse '{raw}'")));
            None
        }
    }
}

/// Overlay `GATEWAY_*` variables onto `config`.
///
/// `lookup` resolves a variable name; production passes `std::env::var`.
/// Unparsable values are reported and leave the field untouched.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Vec<ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    if let Some(v) = lookup("GATEWAY_BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = lookup("GATEWAY_UPSTREAM_URL") {
        config.upstream.url = v;
    }
    if let Some(v) = lookup("GATEWAY_UPSTREAM_API_KEY") {
        config.upstream.api_key = v;
    }
    if let Some(v) = lookup("GATEWAY_UPSTREAM_MODEL") {
        config.upstream.model = v;
    }
    if let Some(v) = lookup("GATEWAY_RATE_LIMIT_MAX_REQUESTS") {
        if let Some(n) = parse_var("GATEWAY_RATE_LIMIT_MAX_REQUESTS", &v, &mut errors) {
            config.rate_limit.max_requests = n;
        }
    }
    if let Some(v) = lookup("GATEWAY_RATE_LIMIT_WINDOW_MS") {
        if let Some(n) = parse_var("GATEWAY_RATE_LIMIT_WINDOW_MS", &v, &mut errors) {
            config.rate_limit.window_ms = n;
        }
    }
    if let Some(v) = lookup("GATEWAY_RETRY_MAX_ATTEMPTS") {
        if let Some(n) = parse_var("GATEWAY_RETRY_MAX_ATTEMPTS", &v, &mut errors) {
            config.retry.max_attempts = n;
        }
    }
    if let Some(v) = lookup("GATEWAY_LOG_LEVEL") {
        config.observability.log_level = v;
    }
    if let Some(v) = lookup("GATEWAY_LOG_FORMAT") {
        match v.to_ascii_lowercase().as_str() {
            "json" => config.observability.log_format = LogFormat::Json,
            "pretty" => config.observability.log_format = LogFormat::Pretty,
            _ => errors.push(ValidationError::new(
                "GATEWAY_LOG_FORMAT",
                format!("expected 'json' or 'pretty', got '{v}'"),
            )),
        }
    }
    if let Some(v) = lookup("GATEWAY_ADMIN_API_KEY") {
        config.admin.api_key = v;
    }

    errors
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = parse_config("[rate_limit]\nmax_requests = 10\n").unwrap();
        let errors = apply_env_overrides(
            &mut config,
            env(&[
                ("GATEWAY_RATE_LIMIT_MAX_REQUESTS", "25"),
                ("GATEWAY_UPSTREAM_URL", "https://llm.internal/format"),
                ("GATEWAY_LOG_FORMAT", "JSON"),
            ]),
        );

        assert!(errors.is_empty());
        assert_eq!(config.rate_limit.max_requests, 25);
        assert_eq!(config.upstream.url, "https://llm.internal/format");
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_bad_numeric_override_is_reported() {
        let mut config = GatewayConfig::default();
        let errors = apply_env_overrides(
            &mut config,
            env(&[("GATEWAY_RATE_LIMIT_WINDOW_MS", "soon")]),
        );

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "GATEWAY_RATE_LIMIT_WINDOW_MS");
        assert_eq!(config.rate_limit.window_ms, 60_000);
    }

    #[test]
    fn test_load_config_from_file() {
        let path = std::env::temp_dir().join(format!("gateway-{}.toml", std::process::id()));
        fs::write(
            &path,
            "[circuit_breaker]\nfailure_threshold = 3\nrecovery_timeout_ms = 5000\n",
        )
        .unwrap();

        let config = load_config(&path);
        let _ = fs::remove_file(&path);

        let breaker = config.unwrap().circuit_breaker.to_breaker_config();
        assert_eq!(breaker.failure_threshold, 3);
        assert_eq!(breaker.recovery_timeout.as_millis(), 5000);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/gateway.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_parse_error_surfaces() {
        let err = parse_config("[retry\nmax_attempts = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_display_joins_all() {
        let err = ConfigError::Validation(vec![
            ValidationError::new("a", "bad"),
            ValidationError::new("b", "worse"),
        ]);
        assert_eq!(err.to_string(), "Validation failed: a: bad, b: worse");
    }
}
