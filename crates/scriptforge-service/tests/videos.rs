//! Video listing and deletion integration tests.

mod common;

use axum::http::header::AUTHORIZATION;
use common::{TestHarness, VIDEO};
use scriptforge_core::VideoId;
use scriptforge_store::Store;
use serde_json::Value;

#[tokio::test]
async fn list_videos_starts_empty() {
    let harness = TestHarness::new();

    let response = harness.get("/api/videos").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"], serde_json::json!([]));
}

#[tokio::test]
async fn get_video_includes_transcript() {
    let harness = TestHarness::new();
    let video_id = harness.fetch_video(VIDEO).await;

    let response = harness.get(&format!("/api/videos/{video_id}")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["video"]["id"], video_id);
    assert_eq!(
        body["data"]["transcript"]["segments"][0]["text"],
        "We're no strangers to love"
    );
}

#[tokio::test]
async fn other_users_video_is_not_found() {
    let harness = TestHarness::new();
    let video_id = harness.fetch_video(VIDEO).await;

    let response = harness
        .server
        .get(&format!("/api/videos/{video_id}"))
        .add_header(AUTHORIZATION, TestHarness::other_user_auth_header())
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn malformed_video_id_is_not_found() {
    let harness = TestHarness::new();

    let response = harness.get("/api/videos/not-a-uuid").await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn delete_video_removes_transcript_and_scripts() {
    let harness = TestHarness::new();
    let video_id = harness.fetch_video(VIDEO).await;
    harness.generate(&video_id, "CASUAL").await.assert_status_ok();

    let response = harness
        .server
        .delete(&format!("/api/videos/{video_id}"))
        .add_header(AUTHORIZATION, harness.user_auth_header())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["deleted"], true);

    harness
        .get(&format!("/api/videos/{video_id}"))
        .await
        .assert_status_not_found();

    let id: VideoId = video_id.parse().unwrap();
    assert!(harness.store.get_transcript(&id).unwrap().is_none());

    let scripts: Value = harness.get("/api/scripts").await.json();
    assert_eq!(scripts["data"], serde_json::json!([]));
}

#[tokio::test]
async fn other_user_cannot_delete_video() {
    let harness = TestHarness::new();
    let video_id = harness.fetch_video(VIDEO).await;

    let response = harness
        .server
        .delete(&format!("/api/videos/{video_id}"))
        .add_header(AUTHORIZATION, TestHarness::other_user_auth_header())
        .await;

    response.assert_status_not_found();
    harness
        .get(&format!("/api/videos/{video_id}"))
        .await
        .assert_status_ok();
}
