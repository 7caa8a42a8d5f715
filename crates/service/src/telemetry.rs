//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

use crate::config::{Config, LogFormat};

/// Installs the global tracing subscriber.
///
/// The filter comes from `config.log_level`; an unparsable directive falls
/// back to `info`. Fails if a global subscriber is already installed.
pub fn init_tracing(config: &Config) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_initialisation_fails() {
        let config = Config::default();
        let _ = init_tracing(&config);

        assert!(init_tracing(&config).is_err());
    }
}
