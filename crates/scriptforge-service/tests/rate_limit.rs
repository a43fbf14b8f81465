//! Rate limiting integration tests.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, RETRY_AFTER};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use common::{test_config, TestHarness};
use scriptforge_service::{create_router, AppState, RateDecision, RateLimiter};
use scriptforge_store::MemoryStore;
use serde_json::Value;

fn limited_harness() -> TestHarness {
    TestHarness::with_config(|config| {
        config.rate_limit_max_requests = 2;
        config.rate_limit_window_seconds = 60;
    })
}

fn limited_harness_behind_proxy() -> TestHarness {
    TestHarness::with_config(|config| {
        config.rate_limit_max_requests = 2;
        config.rate_limit_window_seconds = 60;
        config.trust_proxy_headers = true;
    })
}

/// Denies every request after the first `allowed`, counting what it saw.
struct CountingLimiter {
    allowed: usize,
    seen: AtomicUsize,
}

impl RateLimiter for CountingLimiter {
    fn check(&self, _key: &str) -> RateDecision {
        if self.seen.fetch_add(1, Ordering::SeqCst) < self.allowed {
            RateDecision::Allow
        } else {
            RateDecision::Deny {
                retry_after: Duration::from_millis(1500),
            }
        }
    }

    fn sweep(&self) -> usize {
        0
    }
}

#[tokio::test]
async fn api_requests_over_the_limit_are_rejected() {
    let harness = limited_harness();

    harness.get("/api/me").await.assert_status_ok();
    harness.get("/api/me/usage").await.assert_status_ok();

    let response = harness.get("/api/me").await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["code"], "rate_limited");
    let retry_after: u64 = response
        .header(RETRY_AFTER)
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
}

#[tokio::test]
async fn limit_applies_before_authentication() {
    let harness = limited_harness();

    for _ in 0..2 {
        harness
            .server
            .get("/api/me")
            .await
            .assert_status_unauthorized();
    }

    harness
        .server
        .get("/api/me")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn clients_are_limited_separately_behind_a_proxy() {
    let harness = limited_harness_behind_proxy();
    let forwarded = HeaderName::from_static("x-forwarded-for");

    for _ in 0..2 {
        harness
            .server
            .get("/api/me")
            .add_header(AUTHORIZATION, harness.user_auth_header())
            .add_header(forwarded.clone(), HeaderValue::from_static("10.0.0.1"))
            .await
            .assert_status_ok();
    }

    harness
        .server
        .get("/api/me")
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .add_header(forwarded.clone(), HeaderValue::from_static("10.0.0.2, 10.0.0.1"))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn spoofed_forwarded_for_does_not_reset_the_limit() {
    let harness = limited_harness();
    let forwarded = HeaderName::from_static("x-forwarded-for");

    for (i, status) in [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]
        .into_iter()
        .enumerate()
    {
        let spoofed = HeaderValue::from_str(&format!("10.0.0.{i}")).unwrap();
        harness
            .server
            .get("/api/me")
            .add_header(AUTHORIZATION, harness.user_auth_header())
            .add_header(forwarded.clone(), spoofed)
            .await
            .assert_status(status);
    }
}

#[tokio::test]
async fn injected_limiter_is_consulted() {
    let limiter = Arc::new(CountingLimiter {
        allowed: 1,
        seen: AtomicUsize::new(0),
    });
    let state = AppState::new(Arc::new(MemoryStore::new()), test_config())
        .with_rate_limiter(limiter.clone());
    let server = TestServer::new(create_router(state)).expect("Failed to create test server");

    server.get("/api/me").await.assert_status_unauthorized();
    let response = server.get("/api/me").await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.header(RETRY_AFTER).to_str().unwrap(), "2");

    server.get("/health").await.assert_status_ok();
    assert_eq!(limiter.seen.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn health_is_not_rate_limited() {
    let harness = limited_harness();

    for _ in 0..5 {
        harness.server.get("/health").await.assert_status_ok();
    }
}
