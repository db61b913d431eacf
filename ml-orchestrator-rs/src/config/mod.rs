//! Configuration management
//!
//! Configuration is loaded once, by the binary, from a `ConfigProvider` and
//! handed to the orchestrator as plain structs. Library code never reads the
//! process environment.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::{Result, ServiceError};
use crate::models::Action;
use crate::services::scoring::bundled_scoring_command;
use crate::util::parse_duration;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a value, treating an empty string the same as a missing key
    fn get_optional(&self, key: &str) -> Option<String> {
        self.get_string(key)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|e| ServiceError::configuration(format!("Invalid integer for key {}: {}", key, e)))
    }

    /// Get a duration such as `30s`, `45m` or `250ms`
    fn get_duration(&self, key: &str) -> Result<Duration> {
        let value = self.get_string(key)?;
        parse_duration(&value).ok_or_else(|| {
            ServiceError::configuration(format!("Invalid duration for key {}: {}", key, value))
        })
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Get an integer configuration value with a default.
    ///
    /// A present but malformed value is an error, not a silent default.
    fn get_int_or(&self, key: &str, default: i64) -> Result<i64> {
        match self.get_optional(key) {
            Some(_) => self.get_int(key),
            None => Ok(default),
        }
    }

    /// Get a duration configuration value with a default
    fn get_duration_or(&self, key: &str, default: Duration) -> Result<Duration> {
        match self.get_optional(key) {
            Some(_) => self.get_duration(key),
            None => Ok(default),
        }
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => {
                ServiceError::configuration(format!("Environment variable not set: {}", env_key))
            }
            env::VarError::NotUnicode(_) => ServiceError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// Trait for validated configuration sections
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Section name used in log and error messages
    fn service_name(&self) -> &str;
}

/// Poll loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between status queries
    pub interval: Duration,
    /// Hard wall-clock deadline measured from the start of the poll loop
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(45 * 60),
        }
    }
}

/// Where prediction artifacts live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Object store reachable over HTTP at `{endpoint}/{bucket}/{key}`
    Http { endpoint: String },
    /// Local directory, keys resolved below `{root}/{bucket}`
    Filesystem { root: PathBuf },
}

/// Configuration for the whole orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub bucket: String,
    pub region: String,
    pub job_queue: String,
    pub job_definition: String,
    pub job_name_prefix: String,
    /// Value of the `Environment` tag on submitted jobs
    pub deploy_environment: String,
    /// Completion queue; `None` disables notifications
    pub completion_queue_url: Option<String>,
    pub batch_endpoint: String,
    pub store: StoreBackend,
    pub api_token: Option<String>,
    pub scratch_root: PathBuf,
    /// Program and arguments of the scoring routine; defaults to the bundled script
    pub scoring_command: Vec<String>,
    pub poll: PollConfig,
    pub http_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-2".to_string(),
            job_queue: "trader-ml-training-queue".to_string(),
            job_definition: "trader-xgb-training-job".to_string(),
            job_name_prefix: "trader-xgb".to_string(),
            deploy_environment: "dev".to_string(),
            completion_queue_url: None,
            batch_endpoint: "http://localhost:4566".to_string(),
            store: StoreBackend::Http {
                endpoint: "http://localhost:4566".to_string(),
            },
            api_token: None,
            scratch_root: env::temp_dir(),
            scoring_command: bundled_scoring_command(),
            poll: PollConfig::default(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();

        let bucket = provider.get_string("data_collection_bucket_name")?;

        let store = match provider.get_optional("store_endpoint") {
            Some(endpoint) => StoreBackend::Http { endpoint },
            None => match provider.get_optional("store_root") {
                Some(root) => StoreBackend::Filesystem { root: PathBuf::from(root) },
                None => defaults.store.clone(),
            },
        };

        let scoring_command = provider
            .get_optional("scoring_command")
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect())
            .unwrap_or(defaults.scoring_command);

        let poll = PollConfig {
            interval: provider.get_duration_or("poll_interval", defaults.poll.interval)?,
            timeout: provider.get_duration_or("poll_timeout", defaults.poll.timeout)?,
        };

        let http_timeout_seconds =
            provider.get_int_or("http_timeout_seconds", defaults.http_timeout.as_secs() as i64)?;
        if http_timeout_seconds <= 0 {
            return Err(ServiceError::configuration(
                "HTTP timeout must be a positive number of seconds",
            ));
        }

        let config = Self {
            bucket,
            region: provider.get_string_or("region", &defaults.region),
            job_queue: provider.get_string_or("job_queue", &defaults.job_queue),
            job_definition: provider.get_string_or("job_definition", &defaults.job_definition),
            job_name_prefix: provider.get_string_or("job_name_prefix", &defaults.job_name_prefix),
            deploy_environment: provider
                .get_string_or("deploy_environment", &defaults.deploy_environment),
            completion_queue_url: provider.get_optional("deregister_task_queue_url"),
            batch_endpoint: provider.get_string_or("batch_endpoint", &defaults.batch_endpoint),
            store,
            api_token: provider.get_optional("api_token"),
            scratch_root: provider
                .get_optional("scratch_root")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_root),
            scoring_command,
            poll,
            http_timeout: Duration::from_secs(http_timeout_seconds as u64),
        };

        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig for OrchestratorConfig {
    fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(ServiceError::configuration("Artifact bucket name is required"));
        }

        if self.job_queue.is_empty() || self.job_definition.is_empty() {
            return Err(ServiceError::configuration(
                "Job queue and job definition are required",
            ));
        }

        validate_url("batch endpoint", &self.batch_endpoint)?;

        if let StoreBackend::Http { ref endpoint } = self.store {
            validate_url("store endpoint", endpoint)?;
        }

        if let Some(ref queue_url) = self.completion_queue_url {
            validate_url("completion queue URL", queue_url)?;
        }

        if self.scoring_command.is_empty() {
            return Err(ServiceError::configuration("Scoring command must not be empty"));
        }

        if self.poll.interval.is_zero() {
            return Err(ServiceError::configuration("Poll interval must be greater than zero"));
        }

        if self.poll.timeout < self.poll.interval {
            return Err(ServiceError::configuration(
                "Poll timeout must be at least one poll interval",
            ));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "orchestrator"
    }
}

fn validate_url(what: &str, value: &str) -> Result<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ServiceError::configuration(format!("Invalid {} {:?}: {}", what, value, e)))
}

/// Per-invocation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub action: Action,
    pub provider: String,
    pub product_id: String,
    pub correlation_id: String,
}

impl Invocation {
    /// Load invocation parameters; a missing correlation id gets a fresh UUID
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let action = provider.get_string("action")?;
        let action = Action::from_str(&action).map_err(ServiceError::configuration)?;

        let invocation = Self {
            action,
            provider: provider.get_optional("provider").unwrap_or_default(),
            product_id: provider.get_optional("product_id").unwrap_or_default(),
            correlation_id: provider
                .get_optional("correlation_id")
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        };

        invocation.validate()?;
        Ok(invocation)
    }
}

impl ServiceConfig for Invocation {
    fn validate(&self) -> Result<()> {
        if self.provider.is_empty() {
            return Err(ServiceError::configuration("Provider is required"));
        }

        if self.product_id.is_empty() {
            return Err(ServiceError::configuration("Product id is required"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "invocation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_config_provider() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("key1", "value1");
        provider.set("key2", "123");
        provider.set("blank", "   ");

        assert_eq!(provider.get_string("key1").unwrap(), "value1");
        assert_eq!(provider.get_int("key2").unwrap(), 123);
        assert!(provider.get_string("key3").is_err());
        assert_eq!(provider.get_optional("blank"), None);
    }

    #[test]
    fn test_env_config_provider_key_format() {
        let provider = EnvConfigProvider::new().with_prefix("TRADER");

        assert_eq!(provider.format_key("poll_interval"), "TRADER_POLL_INTERVAL");
        assert_eq!(provider.format_key("store-root"), "TRADER_STORE_ROOT");
        assert_eq!(
            EnvConfigProvider::new().format_key("deregister_task_queue_url"),
            "DEREGISTER_TASK_QUEUE_URL"
        );
    }
}
