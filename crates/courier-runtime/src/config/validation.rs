//! Semantic checks that deserialization alone cannot express.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CourierConfig, DispatchConfig, LogOutput, LoggingConfig};

/// Validates a loaded configuration, reporting the first offending field.
pub fn validate_config(config: &CourierConfig) -> ConfigResult<()> {
    check_logging(&config.logging)?;
    check_dispatch(&config.dispatch)
}

fn check_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::invalid(
            "logging.file_path",
            "required when output is `file`",
        ));
    }

    match logging.filters.keys().find(|t| t.trim().is_empty()) {
        Some(target) => Err(ConfigError::invalid(
            "logging.filters",
            format!("empty target {target:?}"),
        )),
        None => Ok(()),
    }
}

fn check_dispatch(dispatch: &DispatchConfig) -> ConfigResult<()> {
    let zero = match dispatch {
        DispatchConfig {
            max_concurrency: 0, ..
        } => "dispatch.max_concurrency",
        DispatchConfig {
            dispatch_timeout_ms: Some(0),
            ..
        } => "dispatch.dispatch_timeout_ms",
        DispatchConfig {
            shutdown_grace_ms: 0,
            ..
        } => "dispatch.shutdown_grace_ms",
        _ => return Ok(()),
    };
    Err(ConfigError::invalid(zero, "must be greater than 0"))
}

#[cfg(test)]
mod tests {
    use super::super::schema::LogLevel;
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = CourierConfig::default();
        config.logging.output = LogOutput::File;
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.field(), Some("logging.file_path"));

        config.logging.file_path = Some("courier.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_filter_target() {
        let mut config = CourierConfig::default();
        config.logging.filters.insert(" ".to_string(), LogLevel::Debug);
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.to_string(), r#"invalid `logging.filters`: empty target " ""#);
    }

    #[test]
    fn test_zero_dispatch_limits() {
        let cases: [(fn(&mut DispatchConfig), &str); 3] = [
            (|d| d.max_concurrency = 0, "dispatch.max_concurrency"),
            (|d| d.dispatch_timeout_ms = Some(0), "dispatch.dispatch_timeout_ms"),
            (|d| d.shutdown_grace_ms = 0, "dispatch.shutdown_grace_ms"),
        ];

        for (mutate, field) in cases {
            let mut config = CourierConfig::default();
            mutate(&mut config.dispatch);
            let err = validate_config(&config).unwrap_err();
            assert_eq!(err.field(), Some(field));
        }
    }
}
