use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("TRIAGE_").split("_"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Validate a loaded configuration.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.classifier.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "classifier.url must not be empty".to_string(),
        ));
    }
    if !config.classifier.url.starts_with("http://") && !config.classifier.url.starts_with("https://")
    {
        return Err(ConfigError::ValidationError(format!(
            "classifier.url must be an http(s) URL: {}",
            config.classifier.url
        )));
    }
    if config.classifier.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "classifier.timeout_secs must be positive".to_string(),
        ));
    }
    if config.triage.workers == 0 {
        return Err(ConfigError::ValidationError(
            "triage.workers must be positive".to_string(),
        ));
    }
    if config.triage.queue_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "triage.queue_capacity must be positive".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[classifier]
url = "http://localhost:8000"

[server]
port = 9000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.classifier.url, "http://localhost:8000");
        assert_eq!(config.classifier.timeout_secs, 30);
        assert_eq!(config.triage.workers, 5);
    }

    #[test]
    fn test_load_config_from_str_missing_classifier() {
        let toml = r#"
[server]
port = 8080
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[classifier]
url = "http://classifier:8000"
timeout_secs = 10

[server]
host = "127.0.0.1"
port = 3000

[triage]
workers = 2
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.classifier.timeout_secs, 10);
        assert_eq!(config.triage.workers, 2);
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let toml = r#"
[classifier]
url = "localhost:8000"
"#;
        let config = load_config_from_str(toml).unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let toml = r#"
[classifier]
url = "http://localhost:8000"

[triage]
workers = 0
"#;
        let config = load_config_from_str(toml).unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let toml = r#"
[classifier]
url = "http://localhost:8000"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert!(validate_config(&config).is_ok());
    }
}
