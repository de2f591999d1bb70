//! Process-wide `tracing` setup.

use tracing_subscriber::EnvFilter;

use crate::infrastructure::config::LoggingConfig;

/// Installs a formatted `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.console_level`; an unparsable
/// level falls back to `info`.  Returns `false` if a global subscriber was
/// already installed, in which case nothing changes.
pub fn init_logging(config: &LoggingConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(config))
        .try_init()
        .is_ok()
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.console_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_already_installed() {
        let config = LoggingConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }

    #[test]
    fn test_filter_accepts_module_directives() {
        let config = LoggingConfig {
            console_level: "wasim_client=debug,warn".to_string(),
            ..LoggingConfig::default()
        };
        let filter = build_filter(&config);
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(filter.to_string().contains("wasim_client=debug"));
        }
    }
}
