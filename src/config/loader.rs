/// Configuration loading from TOML file
use std::path::Path;

use tracing::info;

use crate::error::{KlineError, Result};
use crate::types::Config;

/// Load and validate the config file; defaults are used when it does not exist
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();

    if !path.exists() {
        info!("No config file at {} - using defaults", path.display());
        let config = Config::default();
        validate_config(&config)?;
        return Ok(config);
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| KlineError::ConfigError(format!("Failed to read config file: {}", e)))?;

    parse_config(&content)
}

/// Parse and validate TOML config content
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)
        .map_err(|e| KlineError::ConfigError(format!("Failed to parse config: {}", e)))?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<()> {
    // Conduit capacities (tokio channels panic on zero)
    if config.tick_buffer == 0 {
        return Err(KlineError::ConfigError("tick_buffer must be > 0".to_string()));
    }

    if config.bar_buffer == 0 {
        return Err(KlineError::ConfigError("bar_buffer must be > 0".to_string()));
    }

    if config.log_level.trim().is_empty() {
        return Err(KlineError::ConfigError("log_level is empty".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Interval;
    use crate::types::{OverflowPolicy, WindowEndPolicy};
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            interval = "5m"
            window_end = "wall_clock"
            align_to_boundary = false
            tick_buffer = 500
            bar_buffer = 10
            overflow = "reject"
            log_level = "debug"
            log_json = true
            output_path = "bars.jsonl"
            "#,
        )
        .unwrap();

        assert_eq!(config.interval, Interval::FIVE_MINUTES);
        assert_eq!(config.window_end, WindowEndPolicy::WallClock);
        assert!(!config.align_to_boundary);
        assert_eq!(config.tick_buffer, 500);
        assert_eq!(config.bar_buffer, 10);
        assert_eq!(config.overflow, OverflowPolicy::Reject);
        assert!(config.log_json);
        assert_eq!(config.output_path.unwrap().to_str(), Some("bars.jsonl"));
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = parse_config("interval = \"1h\"").unwrap();

        assert_eq!(config.interval, Interval::ONE_HOUR);
        assert_eq!(config.tick_buffer, 1000);
        assert_eq!(config.bar_buffer, 100);
        assert_eq!(config.window_end, WindowEndPolicy::Nominal);
        assert_eq!(config.overflow, OverflowPolicy::Block);
        assert!(config.align_to_boundary);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(parse_config("tick_buffer = 0").is_err());
        assert!(parse_config("bar_buffer = 0").is_err());
        assert!(parse_config("interval = \"0s\"").is_err());
        assert!(parse_config("window_end = \"sometimes\"").is_err());
    }

    #[test]
    fn test_oversized_interval_rejected() {
        let err = parse_config("interval = \"100000000d\"").unwrap_err();

        assert_eq!(err.error_code(), "CFG_001");
        assert!(err.to_string().contains("interval too large"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "interval = \"15m\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.interval, Interval::FIFTEEN_MINUTES);

        let missing = load_config(file.path().with_extension("missing")).unwrap();
        assert_eq!(missing.interval, Interval::ONE_MINUTE);
    }
}
