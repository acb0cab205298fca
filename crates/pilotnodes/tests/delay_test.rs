// crates/pilotnodes/tests/delay_test.rs

use pilotcore::{payload, NodeContext, NodeError, NodeStrategy};
use pilotnodes::DelayNode;
use serde_json::json;
use tokio::time::{Duration, Instant};

#[tokio::test(start_paused = true)]
async fn test_delay_waits_for_configured_minutes() {
    let ctx = NodeContext::new("d", "exec-delay", "user-1")
        .with_config(payload([("duration", json!(2)), ("unit", json!("minutes"))]));

    let started = Instant::now();
    let out = DelayNode.execute(ctx).await.expect("delay should succeed");

    assert!(started.elapsed() >= Duration::from_secs(120));
    assert_eq!(out["delayed"], json!(true));
    assert_eq!(out["duration"], json!(2));
    assert_eq!(out["unit"], json!("minutes"));
    assert_eq!(out["delayMs"], json!(120_000));
    assert!(out["delayedUntil"].is_string());
}

#[tokio::test(start_paused = true)]
async fn test_delay_defaults_to_sixty_seconds() {
    let ctx = NodeContext::new("d", "exec-delay", "user-1");

    let started = Instant::now();
    let out = DelayNode.execute(ctx).await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(60));
    assert_eq!(out["duration"], json!(60));
    assert_eq!(out["unit"], json!("seconds"));
    assert_eq!(out["delayMs"], json!(60_000));
}

#[tokio::test(start_paused = true)]
async fn test_delay_rejects_unknown_unit_without_waiting() {
    let ctx = NodeContext::new("d", "exec-delay", "user-1")
        .with_config(payload([("duration", json!(1)), ("unit", json!("fortnights"))]));

    let started = Instant::now();
    let err = DelayNode.execute(ctx).await.unwrap_err();

    assert!(matches!(err, NodeError::InvalidConfig(_)));
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_delay_beyond_the_calendar_is_invalid_config() {
    let ctx = NodeContext::new("d", "exec-delay", "user-1")
        .with_config(payload([("duration", json!(1e12)), ("unit", json!("hours"))]));

    let started = Instant::now();
    let err = DelayNode.execute(ctx).await.unwrap_err();

    assert!(matches!(err, NodeError::InvalidConfig(_)));
    assert_eq!(started.elapsed(), Duration::ZERO);
}
