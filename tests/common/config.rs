//! Test configuration helpers for building orchestrators against a mock service

use std::time::Duration;
use tempfile::TempDir;
use tirepress_gen::config::{GatewayConfig, PersistenceConfig, RetryConfig};
use tirepress_gen::{BatchOrchestrator, Config, Database, Tier, TierConfig};

/// Path each tier posts to on the mock server
pub fn tier_path(tier: Tier) -> String {
    format!("/v1/{}", tier.as_str())
}

/// Config pointing every tier at its own path on `server_uri`
///
/// Pacing is off unless `min_interval` is given; retries are off and chunk
/// pauses are zero so tests run fast.
pub fn test_config(server_uri: &str, temp_dir: &TempDir, min_interval: Duration) -> Config {
    let tiers = [
        (Tier::Standard, "small-model", 1.0),
        (Tier::Intermediate, "medium-model", 3.0),
        (Tier::Premium, "large-model", 10.0),
    ]
    .into_iter()
    .map(|(tier, model, cost_weight)| TierConfig {
        tier,
        model: model.to_string(),
        endpoint: Some(format!("{}{}", server_uri, tier_path(tier))),
        cost_weight,
    })
    .collect();

    let mut config = Config {
        gateway: GatewayConfig {
            endpoint: format!("{}/v1/standard", server_uri),
            api_key: Some("test-key".to_string()),
            min_interval,
            request_timeout: Duration::from_secs(5),
            retry: RetryConfig {
                max_retries: 0,
                delay: Duration::from_millis(10),
            },
            ..Default::default()
        },
        tiers,
        persistence: PersistenceConfig {
            database_path: temp_dir.path().join("articles.db"),
        },
        ..Default::default()
    };
    config.batch.chunk_pause = Duration::ZERO;
    config
}

/// Create an orchestrator backed by a database in a fresh temp directory
///
/// Returns the orchestrator and the TempDir (which must be kept alive).
pub async fn create_test_orchestrator(
    server_uri: &str,
    min_interval: Duration,
) -> (BatchOrchestrator, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(server_uri, &temp_dir, min_interval);
    let orchestrator = BatchOrchestrator::from_config(config).await.unwrap();
    (orchestrator, temp_dir)
}

/// Open a second handle on the test database for assertions
pub async fn open_database(temp_dir: &TempDir) -> Database {
    Database::new(&temp_dir.path().join("articles.db")).await.unwrap()
}
