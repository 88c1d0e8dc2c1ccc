//! End-to-end batch runs against a mock generation service
//!
//! Each test starts a wiremock server standing in for the service, builds an
//! orchestrator through `BatchOrchestrator::from_config` (real HTTP
//! transport, real pacer, SQLite in a temp directory) and checks the
//! reported counts together with what ended up in the database.

mod common;

use common::*;
use std::time::Duration;
use tempfile::TempDir;
use tirepress_gen::{
    ArticleStatus, BatchOptions, Event, NaturalKey, RateLimitPolicy, Tier, VehicleRecord,
};
use wiremock::matchers::{bearer_token, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_success(server: &MockServer, tier: Tier, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(tier_path(tier)))
        .and(bearer_token("test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(&article_json())))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_valid_motorcycle_and_invalid_pickup_end_to_end() {
    let server = MockServer::start().await;
    mount_success(&server, Tier::Standard, 1).await;

    let (orchestrator, temp_dir) = create_test_orchestrator(&server.uri(), Duration::ZERO).await;
    let csv = write_csv(&temp_dir, MIXED_CSV);

    let result = orchestrator
        .run_source(&csv, &BatchOptions::default())
        .await
        .unwrap();

    assert_counts(&result, 2, 1, 0, 1);
    let error = &result.errors[0];
    assert_eq!(error.category, "out_of_range");
    assert_eq!(error.row, Some(2));
    assert!(error.message.contains("loaded_front=0"), "{}", error.message);

    let db = open_database(&temp_dir).await;
    let article = db
        .get_article(&NaturalKey::from_slug("yamaha-mt-07-2022"))
        .await
        .unwrap()
        .expect("motorcycle article stored");
    assert_eq!(article.status, ArticleStatus::Generated);
    assert_eq!(article.tier_used, Tier::Standard);
    assert_eq!(article.quality_score, 100);
    assert!(
        db.get_article(&NaturalKey::from_slug("toyota-hilux-2021"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let server = MockServer::start().await;
    // Three articles across both runs, all from the first
    mount_success(&server, Tier::Standard, 3).await;

    let (orchestrator, temp_dir) = create_test_orchestrator(&server.uri(), Duration::ZERO).await;
    let csv = write_csv(&temp_dir, VALID_CSV);

    let first = orchestrator
        .run_source(&csv, &BatchOptions::default())
        .await
        .unwrap();
    assert_counts(&first, 3, 3, 0, 0);

    let second = orchestrator
        .run_source(&csv, &BatchOptions::default())
        .await
        .unwrap();
    assert_counts(&second, 3, 0, first.generated, 0);
    assert_eq!(second.summary.success_rate, 100.0);

    let db = open_database(&temp_dir).await;
    let counts = db.count_articles_by_status().await.unwrap();
    assert_eq!(counts, vec![(ArticleStatus::Generated, 3)]);
}

#[tokio::test]
async fn test_request_carries_tier_model_and_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(tier_path(Tier::Premium)))
        .and(body_partial_json(serde_json::json!({ "model": "large-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(&article_json())))
        .expect(1)
        .mount(&server)
        .await;

    let (orchestrator, temp_dir) = create_test_orchestrator(&server.uri(), Duration::ZERO).await;
    let csv = write_csv(&temp_dir, MIXED_CSV);

    let options = BatchOptions {
        forced_tier: Some(Tier::Premium),
        ..Default::default()
    };
    let result = orchestrator.run_source(&csv, &options).await.unwrap();
    assert_eq!(result.generated, 1);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["messages"][0]["role"], "user");
    let prompt = body["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("Yamaha MT-07 2022"), "{prompt}");
    assert!(prompt.contains("/tyre-pressure/yamaha-mt-07-2022"), "{prompt}");
}

#[tokio::test]
async fn test_malformed_standard_response_escalates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(tier_path(Tier::Standard)))
        .respond_with(ResponseTemplate::new(200).set_body_json(prose_only_completion()))
        .expect(1)
        .mount(&server)
        .await;
    mount_success(&server, Tier::Intermediate, 1).await;
    mount_success(&server, Tier::Premium, 0).await;

    let (orchestrator, temp_dir) = create_test_orchestrator(&server.uri(), Duration::ZERO).await;
    let csv = write_csv(&temp_dir, MIXED_CSV);

    let result = orchestrator
        .run_source(&csv, &BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(result.generated, 1);
    assert_eq!(result.escalation.escalations, 1);

    let key = NaturalKey::from_slug("yamaha-mt-07-2022");
    let db = open_database(&temp_dir).await;
    let article = db.get_article(&key).await.unwrap().unwrap();
    assert_eq!(article.tier_used, Tier::Intermediate);
    assert_eq!(article.generation_attempts, 2);

    let history = db.get_attempts(&key, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].tier, Tier::Standard);
    assert!(history[0].is_failure());
    assert_eq!(history[1].tier, Tier::Intermediate);
}

#[tokio::test]
async fn test_pacing_allows_one_call_per_interval() {
    let server = MockServer::start().await;
    mount_success(&server, Tier::Standard, 1).await;

    let (orchestrator, temp_dir) =
        create_test_orchestrator(&server.uri(), Duration::from_secs(60)).await;
    let csv = write_csv(&temp_dir, VALID_CSV);

    let result = orchestrator
        .run_source(&csv, &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.generated, 1);
    assert_eq!(result.deferred, 2);
    assert_eq!(result.failed, 0);
    assert_eq!(result.deferred_keys.len(), 2);
    assert!(result.summary.recommendations.iter().any(|r| r.contains("deferred")));
}

#[tokio::test]
async fn test_upstream_throttle_defers_and_pushes_pacer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(tier_path(Tier::Standard)))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "120"))
        .expect(1)
        .mount(&server)
        .await;

    let (orchestrator, temp_dir) = create_test_orchestrator(&server.uri(), Duration::ZERO).await;
    let csv = write_csv(&temp_dir, VALID_CSV);

    let result = orchestrator
        .run_source(&csv, &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.deferred, 3);
    assert_eq!(result.generated, 0);

    // Throttling is not a generation failure
    let db = open_database(&temp_dir).await;
    let history = db
        .get_attempts(&NaturalKey::from_slug("yamaha-mt-07-2022"), 10)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_wait_policy_defers_when_interval_exceeds_budget() {
    let server = MockServer::start().await;
    mount_success(&server, Tier::Standard, 1).await;

    let (orchestrator, temp_dir) =
        create_test_orchestrator(&server.uri(), Duration::from_secs(60)).await;
    let csv = write_csv(&temp_dir, VALID_CSV);

    let options = BatchOptions {
        rate_limit_policy: RateLimitPolicy::Wait {
            max_wait: Duration::from_millis(50),
        },
        limit: Some(2),
        ..Default::default()
    };
    let result = orchestrator.run_source(&csv, &options).await.unwrap();

    assert_eq!(result.generated, 1);
    assert_eq!(result.deferred, 1);
}

#[tokio::test]
async fn test_server_error_fails_item_and_batch_continues() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(tier_path(Tier::Standard)))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_success(&server, Tier::Standard, 2).await;

    let (orchestrator, temp_dir) = create_test_orchestrator(&server.uri(), Duration::ZERO).await;
    let csv = write_csv(&temp_dir, VALID_CSV);

    let result = orchestrator
        .run_source(&csv, &BatchOptions::default())
        .await
        .unwrap();

    assert_counts(&result, 3, 2, 0, 1);
    assert_eq!(result.errors[0].category, "transport");
    assert!(result.errors[0].message.contains("503"), "{}", result.errors[0].message);
}

#[tokio::test]
async fn test_dry_run_never_contacts_service() {
    let server = MockServer::start().await;
    mount_success(&server, Tier::Standard, 0).await;

    let (orchestrator, temp_dir) = create_test_orchestrator(&server.uri(), Duration::ZERO).await;
    let csv = write_csv(&temp_dir, VALID_CSV);

    let options = BatchOptions {
        dry_run: true,
        ..Default::default()
    };
    let result = orchestrator.run_source(&csv, &options).await.unwrap();
    assert_counts(&result, 3, 3, 0, 0);
    assert!(result.dry_run);

    let db = open_database(&temp_dir).await;
    assert!(db.count_articles_by_status().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_events_follow_run_lifecycle() {
    let server = MockServer::start().await;
    mount_success(&server, Tier::Standard, 1).await;

    let (orchestrator, temp_dir) = create_test_orchestrator(&server.uri(), Duration::ZERO).await;
    let csv = write_csv(&temp_dir, MIXED_CSV);
    let mut events = orchestrator.subscribe();

    let result = orchestrator
        .run_source(&csv, &BatchOptions::default())
        .await
        .unwrap();
    let received = drain_events(&mut events);

    match received.first() {
        Some(Event::BatchStarted { run_id, total }) => {
            assert_eq!(*run_id, result.run_id);
            assert_eq!(*total, 2);
        }
        other => panic!("expected BatchStarted, got {:?}", other),
    }
    assert!(received.iter().any(|e| matches!(
        e,
        Event::ItemGenerated { tier: Tier::Standard, score: 100, .. }
    )));
    assert!(received.iter().any(|e| matches!(
        e,
        Event::ItemRejected { row: Some(2), category } if category == "out_of_range"
    )));
    assert!(matches!(received.last(), Some(Event::BatchCompleted { .. })));
}

#[tokio::test]
async fn test_stored_article_moves_through_lifecycle() {
    let server = MockServer::start().await;
    mount_success(&server, Tier::Standard, 1).await;

    let (orchestrator, temp_dir) = create_test_orchestrator(&server.uri(), Duration::ZERO).await;
    let record = VehicleRecord {
        make: Some("Yamaha".to_string()),
        model: Some("MT-07".to_string()),
        year: Some(2022),
        tire_size: Some("120/70 ZR17".to_string()),
        category: Some("naked".to_string()),
        vehicle_type: Some("motorcycle".to_string()),
        empty_front: Some(28.0),
        empty_rear: Some(32.0),
        ..Default::default()
    };
    orchestrator
        .run(vec![record], &BatchOptions::default())
        .await
        .unwrap();

    let db = open_database(&temp_dir).await;
    let key = NaturalKey::from_slug("yamaha-mt-07-2022");
    let enhanced = db
        .update_article_status(&key, ArticleStatus::Enhanced)
        .await
        .unwrap();
    assert_eq!(enhanced.status, ArticleStatus::Enhanced);
    assert!(
        db.update_article_status(&key, ArticleStatus::Generated)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_opening_anything() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config("http://127.0.0.1:9", &temp_dir, Duration::ZERO);
    config.tiers.clear();

    let result = tirepress_gen::BatchOrchestrator::from_config(config).await;
    assert!(matches!(result, Err(tirepress_gen::Error::Config { .. })));
    assert!(!temp_dir.path().join("articles.db").exists());
}
