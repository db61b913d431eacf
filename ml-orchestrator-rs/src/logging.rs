//! # Structured Logging
//!
//! Installs a global `tracing` subscriber. `RUST_LOG` overrides the
//! configured level.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{ConfigProvider, ConfigProviderExt};
use crate::error::{Result, ServiceError};

static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configuration for the logging system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// The log level to use (trace, debug, info, warn, error)
    pub level: String,
    /// The service name attached to the startup record
    pub service_name: String,
    /// Emit one JSON object per event instead of human readable lines
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "ml-orchestrator".to_string(),
            json_format: true,
        }
    }
}

impl LoggingConfig {
    /// Reads `log_level` and `log_format` (`json` or `text`)
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Self {
        let defaults = Self::default();
        let json_format = match provider.get_optional("log_format") {
            Some(format) => !format.eq_ignore_ascii_case("text"),
            None => defaults.json_format,
        };
        Self {
            level: provider.get_string_or("log_level", &defaults.level),
            service_name: defaults.service_name,
            json_format,
        }
    }
}

/// Initializes the structured logging system.
///
/// Calling this more than once is a no-op.
pub fn init_logging(config: Option<LoggingConfig>) -> Result<()> {
    if LOGGING_INITIALIZED.load(Ordering::SeqCst) {
        return Ok(());
    }

    let config = config.unwrap_or_default();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hyper=warn,reqwest=warn", config.level)));

    let json_layer = config.json_format.then(|| {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_target(true)
            .with_span_list(true)
    });
    let text_layer = (!config.json_format).then(|| fmt::layer().with_target(true));

    Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ServiceError::internal(format!("Failed to set global subscriber: {}", e)))?;

    LOGGING_INITIALIZED.store(true, Ordering::SeqCst);

    tracing::info!(
        service = %config.service_name,
        level = %config.level,
        json = config.json_format,
        "Structured logging initialized"
    );

    Ok(())
}
