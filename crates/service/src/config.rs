//! Service configuration loaded from environment variables.

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,

    /// One JSON object per line.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Service configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `ALLOCATION_MAX_ATTEMPTS`: attempts per handler on concurrency conflicts (default: `3`)
/// - `ALLOCATION_STOCK_ALERT_ADDRESS`: out-of-stock recipient (default: `"stock@made.com"`)
/// - `ALLOCATION_PUBLISH_TOPIC`: topic for allocated lines (default: `"line_allocated"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,
    pub max_attempts: u32,
    pub stock_alert_address: String,
    pub publish_topic: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: std::env::var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or(defaults.log_format),
            max_attempts: std::env::var("ALLOCATION_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
            stock_alert_address: std::env::var("ALLOCATION_STOCK_ALERT_ADDRESS")
                .unwrap_or(defaults.stock_alert_address),
            publish_topic: std::env::var("ALLOCATION_PUBLISH_TOPIC")
                .unwrap_or(defaults.publish_topic),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            max_attempts: 3,
            stock_alert_address: "stock@made.com".to_string(),
            publish_topic: "line_allocated".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    const VARS: [&str; 5] = [
        "RUST_LOG",
        "LOG_FORMAT",
        "ALLOCATION_MAX_ATTEMPTS",
        "ALLOCATION_STOCK_ALERT_ADDRESS",
        "ALLOCATION_PUBLISH_TOPIC",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: env tests run serially.
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.stock_alert_address, "stock@made.com");
        assert_eq!(config.publish_topic, "line_allocated");
    }

    #[test]
    #[serial]
    fn test_from_env_without_variables_uses_defaults() {
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.stock_alert_address, "stock@made.com");
    }

    #[test]
    #[serial]
    fn test_from_env_reads_variables() {
        clear_env();
        // SAFETY: env tests run serially.
        unsafe {
            std::env::set_var("RUST_LOG", "debug");
            std::env::set_var("LOG_FORMAT", "JSON");
            std::env::set_var("ALLOCATION_MAX_ATTEMPTS", "5");
            std::env::set_var("ALLOCATION_STOCK_ALERT_ADDRESS", "alerts@example.com");
            std::env::set_var("ALLOCATION_PUBLISH_TOPIC", "allocations");
        }

        let config = Config::from_env();
        clear_env();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.stock_alert_address, "alerts@example.com");
        assert_eq!(config.publish_topic, "allocations");
    }

    #[test]
    #[serial]
    fn test_invalid_attempts_fall_back_to_default() {
        clear_env();
        // SAFETY: env tests run serially.
        unsafe { std::env::set_var("ALLOCATION_MAX_ATTEMPTS", "0") };
        assert_eq!(Config::from_env().max_attempts, 3);

        // SAFETY: env tests run serially.
        unsafe { std::env::set_var("ALLOCATION_MAX_ATTEMPTS", "many") };
        assert_eq!(Config::from_env().max_attempts, 3);
        clear_env();
    }
}
