//! Tests for configuration loading and validation

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use crate::config::{
        ConfigProviderExt, Invocation, MemoryConfigProvider, OrchestratorConfig, PollConfig,
        ServiceConfig, StoreBackend,
    };
    use crate::error::ServiceError;
    use crate::models::Action;

    fn provider(pairs: &[(&str, &str)]) -> MemoryConfigProvider {
        MemoryConfigProvider::with_values(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_defaults_with_only_bucket() {
        let config =
            OrchestratorConfig::from_provider(&provider(&[("data_collection_bucket_name", "trader-data")]))
                .unwrap();

        assert_eq!(config.bucket, "trader-data");
        assert_eq!(config.region, "us-east-2");
        assert_eq!(config.job_queue, "trader-ml-training-queue");
        assert_eq!(config.job_definition, "trader-xgb-training-job");
        assert_eq!(config.job_name_prefix, "trader-xgb");
        assert_eq!(config.completion_queue_url, None);
        assert_eq!(config.poll, PollConfig::default());
        assert_eq!(config.poll.interval, Duration::from_secs(30));
        assert_eq!(config.poll.timeout, Duration::from_secs(45 * 60));
        assert_eq!(config.scoring_command[..2], ["python3", "-c"]);
        assert_eq!(config.scoring_command[2], crate::services::scoring::BUNDLED_SCORING_SCRIPT);
        assert_eq!(config.service_name(), "orchestrator");
    }

    #[test]
    fn test_missing_bucket_is_rejected() {
        let err = OrchestratorConfig::from_provider(&provider(&[])).unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[test]
    fn test_overrides() {
        let config = OrchestratorConfig::from_provider(&provider(&[
            ("data_collection_bucket_name", "trader-data"),
            ("region", "eu-west-1"),
            ("deregister_task_queue_url", "http://localhost:4566/000000000000/deregister"),
            ("store_root", "/var/lib/trader/artifacts"),
            ("scoring_command", "python3 -m trader.score --quiet"),
            ("poll_interval", "5s"),
            ("poll_timeout", "10m"),
            ("http_timeout_seconds", "12"),
        ]))
        .unwrap();

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(
            config.completion_queue_url.as_deref(),
            Some("http://localhost:4566/000000000000/deregister")
        );
        assert_eq!(
            config.store,
            StoreBackend::Filesystem {
                root: PathBuf::from("/var/lib/trader/artifacts")
            }
        );
        assert_eq!(
            config.scoring_command,
            vec!["python3", "-m", "trader.score", "--quiet"]
        );
        assert_eq!(config.poll.interval, Duration::from_secs(5));
        assert_eq!(config.poll.timeout, Duration::from_secs(600));
        assert_eq!(config.http_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_store_endpoint_wins_over_root() {
        let config = OrchestratorConfig::from_provider(&provider(&[
            ("data_collection_bucket_name", "trader-data"),
            ("store_endpoint", "https://objects.internal:9000"),
            ("store_root", "/tmp/unused"),
        ]))
        .unwrap();

        assert_eq!(
            config.store,
            StoreBackend::Http {
                endpoint: "https://objects.internal:9000".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases: &[&[(&str, &str)]] = &[
            &[("data_collection_bucket_name", "b"), ("poll_interval", "soon")],
            &[("data_collection_bucket_name", "b"), ("poll_interval", "0s")],
            &[("data_collection_bucket_name", "b"), ("poll_interval", "10m"), ("poll_timeout", "1m")],
            &[("data_collection_bucket_name", "b"), ("batch_endpoint", "not a url")],
            &[("data_collection_bucket_name", "b"), ("deregister_task_queue_url", "queue")],
            &[("data_collection_bucket_name", "b"), ("http_timeout_seconds", "0")],
        ];

        for case in cases {
            assert!(
                OrchestratorConfig::from_provider(&provider(case)).is_err(),
                "expected {:?} to be rejected",
                case
            );
        }
    }

    #[test]
    fn test_duration_helpers() {
        let provider = provider(&[("a", "250ms"), ("b", "2h"), ("c", "90")]);

        assert_eq!(provider.get_duration("a").unwrap(), Duration::from_millis(250));
        assert_eq!(provider.get_duration("b").unwrap(), Duration::from_secs(7200));
        assert_eq!(provider.get_duration("c").unwrap(), Duration::from_secs(90));
        assert_eq!(
            provider.get_duration_or("missing", Duration::from_secs(3)).unwrap(),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn test_invocation_from_provider() {
        let invocation = Invocation::from_provider(&provider(&[
            ("action", "Train"),
            ("provider", "COINBASE"),
            ("product_id", "BTC-USD"),
            ("correlation_id", "test-123"),
        ]))
        .unwrap();

        assert_eq!(
            invocation,
            Invocation {
                action: Action::Train,
                provider: "COINBASE".to_string(),
                product_id: "BTC-USD".to_string(),
                correlation_id: "test-123".to_string(),
            }
        );
    }

    #[test]
    fn test_invocation_generates_correlation_id() {
        let invocation = Invocation::from_provider(&provider(&[
            ("action", "predict"),
            ("provider", "COINBASE"),
            ("product_id", "BTC-USD"),
        ]))
        .unwrap();

        assert_eq!(invocation.action, Action::Predict);
        assert!(uuid::Uuid::parse_str(&invocation.correlation_id).is_ok());
    }

    #[test]
    fn test_invocation_requires_identifiers() {
        assert!(Invocation::from_provider(&provider(&[("action", "train"), ("provider", "COINBASE")])).is_err());
        assert!(Invocation::from_provider(&provider(&[("action", "train"), ("product_id", "BTC-USD")])).is_err());
        assert!(Invocation::from_provider(&provider(&[
            ("action", "deploy"),
            ("provider", "COINBASE"),
            ("product_id", "BTC-USD"),
        ]))
        .is_err());
        assert!(Invocation::from_provider(&provider(&[("provider", "COINBASE"), ("product_id", "BTC-USD")])).is_err());
    }
}
