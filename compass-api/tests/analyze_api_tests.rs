//! End-to-end tests for the analysis routes
//!
//! Requests go through the full router (CORS, observability, rate limiting)
//! into the fallback orchestrator, with a scripted real provider where the
//! test needs to control upstream behavior.

use std::time::Duration;

use compass_test_utils::{errors, fixtures, ScriptedOutcome, ScriptedProvider};
use serde_json::{json, Value};

#[path = "support/app.rs"]
mod app_support;
use app_support::{test_config, TestApp};

fn tag_confidence(body: &Value, name: &str) -> Option<f64> {
    body["tags"]
        .as_array()?
        .iter()
        .find(|t| t["name"] == name)
        .and_then(|t| t["confidence"].as_f64())
}

#[tokio::test]
async fn test_positive_review_is_positive() -> Result<(), String> {
    let app = TestApp::simulator_only()?;
    let (status, body) = app
        .post("/analyze/text", json!({ "text": fixtures::POSITIVE_REVIEW }))
        .await?;

    assert_eq!(status, 200, "body: {}", body);
    assert_eq!(body["sentiment"]["overall"], "positive");
    let positive = body["sentiment"]["confidenceScores"]["positive"]
        .as_f64()
        .ok_or("missing positive score")?;
    assert!(positive > 0.6, "positive score {}", positive);
    assert_eq!(body["sourceProvider"], "simulator");
    assert!(body["key_phrases"].is_array());
    assert!(body["entities"].is_array());
    assert!(body.get("language").is_none());
    Ok(())
}

#[tokio::test]
async fn test_empty_text_is_rejected_without_any_provider_call() -> Result<(), String> {
    let app = TestApp::with_real(ScriptedProvider::real())?;
    let (status, body) = app.post("/analyze/text", json!({ "text": "" })).await?;

    assert_eq!(status, 400);
    assert_eq!(body["code"], "INVALID_INPUT");
    assert_eq!(app.real_calls(), 0);

    let fallbacks = app
        .state
        .metrics
        .count("text", compass_core::metric_names::FALLBACK_TRIGGERED);
    assert_eq!(fallbacks, 0);
    Ok(())
}

#[tokio::test]
async fn test_jewelry_url_yields_jewelry_tag() -> Result<(), String> {
    let app = TestApp::simulator_only()?;
    let (status, body) = app
        .post(
            "/analyze/image",
            json!({ "image_url": "https://cdn.shop.example/products/jewelry-necklace-123.jpg" }),
        )
        .await?;

    assert_eq!(status, 200, "body: {}", body);
    let confidence = tag_confidence(&body, "jewelry").ok_or("jewelry tag missing")?;
    assert!(confidence >= 0.6);
    assert!(body["captions"].is_array());
    assert!(body["colors"]["dominantColors"].is_array());
    assert!(body["colors"]["accentColor"].is_string());
    assert!(body["processingTimeMs"].is_number());
    assert!(body.get("faces").is_none());
    Ok(())
}

#[tokio::test]
async fn test_identical_urls_give_identical_analysis() -> Result<(), String> {
    let app = TestApp::simulator_only()?;
    let request = json!({
        "image_url": fixtures::JEWELRY_IMAGE_URL,
        "features": ["tags", "captions", "colors", "categories", "objects"],
    });
    let (_, first) = app.post("/analyze/image", request.clone()).await?;
    let (_, second) = app.post("/analyze/image", request).await?;

    for field in ["tags", "captions", "colors", "categories", "objects"] {
        assert_eq!(first[field], second[field], "field {} differs", field);
    }
    assert_ne!(first["requestId"], second["requestId"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_real_timeout_falls_back_within_bound() -> Result<(), String> {
    let mut config = test_config();
    config.orchestrator.real_timeout = Duration::from_millis(300);
    config.orchestrator.simulator_timeout = Duration::from_millis(200);
    let bound = config.orchestrator.total_bound();

    let real = std::sync::Arc::new(
        ScriptedProvider::real().always(ScriptedOutcome::Hang(Duration::from_secs(30))),
    );
    let app = TestApp::build(Some(real), config)?;

    let started = tokio::time::Instant::now();
    let (status, body) = app
        .post("/analyze/text", json!({ "text": fixtures::NEGATIVE_REVIEW }))
        .await?;

    assert_eq!(status, 200, "body: {}", body);
    assert_eq!(body["sourceProvider"], "simulator");
    assert_eq!(body["sentiment"]["overall"], "negative");
    assert!(started.elapsed() <= bound);
    assert_eq!(app.real_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_upstream_failures_never_reach_the_caller() -> Result<(), String> {
    for error in errors::all_upstream() {
        let app = TestApp::with_real(ScriptedProvider::real().failing(error.clone()))?;
        let (status, body) = app
            .post("/analyze/text", json!({ "text": fixtures::POSITIVE_REVIEW }))
            .await?;

        assert_eq!(status, 200, "{} leaked: {}", error, body);
        assert_eq!(body["sourceProvider"], "simulator");
        assert!(!body.to_string().contains(errors::PROVIDER));
    }
    Ok(())
}

#[tokio::test]
async fn test_healthy_real_provider_serves_the_request() -> Result<(), String> {
    let app = TestApp::with_real(ScriptedProvider::real())?;
    let (status, body) = app
        .post("/analyze/image", json!({ "image_url": fixtures::JEWELRY_IMAGE_URL }))
        .await?;

    assert_eq!(status, 200);
    assert_eq!(body["sourceProvider"], "real");
    assert_eq!(app.real_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_image_input_validation() -> Result<(), String> {
    let app = TestApp::with_real(ScriptedProvider::real())?;

    let (status, body) = app.post("/analyze/image", json!({})).await?;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let (status, body) = app
        .post("/analyze/image", json!({ "image_url": "ftp://files.example/a.png" }))
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = app
        .post(
            "/analyze/image",
            json!({ "image_url": fixtures::JEWELRY_IMAGE_URL, "features": ["tags", "xray"] }),
        )
        .await?;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "INVALID_INPUT");

    assert_eq!(app.real_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_requested_faces_are_flagged_as_simulated() -> Result<(), String> {
    let app = TestApp::simulator_only()?;
    let (status, body) = app
        .post(
            "/analyze/image",
            json!({ "image_url": fixtures::JEWELRY_IMAGE_URL, "features": ["faces"] }),
        )
        .await?;

    assert_eq!(status, 200);
    assert_eq!(body["features"], json!(["faces"]));
    assert_eq!(body["faces"], json!([]));
    assert!(body["errorMessage"].is_string());
    assert!(body.get("tags").is_none());
    Ok(())
}

#[tokio::test]
async fn test_single_feature_shortcuts() -> Result<(), String> {
    let app = TestApp::simulator_only()?;

    let (status, body) = app
        .post("/analyze/text/sentiment", json!({ "text": fixtures::POSITIVE_REVIEW }))
        .await?;
    assert_eq!(status, 200);
    assert_eq!(body["features"], json!(["sentiment"]));
    assert!(body.get("key_phrases").is_none());

    let (status, body) = app
        .post(
            "/analyze/text/language",
            json!({ "text": "The necklace arrived quickly and it is very pretty" }),
        )
        .await?;
    assert_eq!(status, 200);
    assert_eq!(body["language"]["iso6391Name"], "en");

    let (status, body) = app
        .post("/analyze/text/key-phrases", json!({ "text": "   " }))
        .await?;
    assert_eq!(status, 400, "body: {}", body);
    Ok(())
}

#[tokio::test]
async fn test_feature_listing() -> Result<(), String> {
    let app = TestApp::simulator_only()?;

    let (status, body) = app.get("/analyze/image/features").await?;
    assert_eq!(status, 200);
    assert_eq!(body["capability"], "vision");
    assert_eq!(body["defaults"], json!(["tags", "captions", "colors"]));

    let (status, body) = app.get("/analyze/text/features").await?;
    assert_eq!(status, 200);
    assert_eq!(body["capability"], "text");
    assert_eq!(
        body["supported"],
        json!(["sentiment", "key_phrases", "entities", "language"])
    );
    Ok(())
}
