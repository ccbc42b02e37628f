// ABOUTME: Integration tests for the analysis route handlers
// ABOUTME: Covers blocking responses, NDJSON streaming, and gate error envelopes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;
mod helpers;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{
    add_test_line, create_test_contact, create_test_resources, ScriptedBehavior, ScriptedProvider,
    SCENARIO_ANALYSIS_JSON,
};
use helpers::axum_test::AxumTestRequest;
use rapport_server::server::{build_router, ServerResources};

async fn setup_with(
    provider: Arc<ScriptedProvider>,
) -> (axum::Router, Arc<ServerResources>) {
    let resources = create_test_resources(provider).await.unwrap();
    (build_router(Arc::clone(&resources)), resources)
}

async fn seed_contact_with_history(resources: &ServerResources) -> i64 {
    let contact_id = create_test_contact(&resources.database, "测试联系人")
        .await
        .unwrap();
    add_test_line(&resources.database, contact_id, "我", "你好", "2024-01-01")
        .await
        .unwrap();
    add_test_line(&resources.database, contact_id, "对方", "你好呀", "2024-01-02")
        .await
        .unwrap();
    add_test_line(&resources.database, contact_id, "我", "最近怎么样", "2024-01-03")
        .await
        .unwrap();
    contact_id
}

// ============================================================================
// Streaming Routes
// ============================================================================

#[tokio::test]
async fn test_stream_route_emits_ndjson_events_then_complete() {
    let (first, second) = SCENARIO_ANALYSIS_JSON.split_at(20);
    let provider = Arc::new(ScriptedProvider::with_deltas(&[first, second]));
    let (router, resources) = setup_with(Arc::clone(&provider)).await;
    let contact_id = seed_contact_with_history(&resources).await;

    let response = AxumTestRequest::post(&format!("/api/contacts/{contact_id}/analyze/stream"))
        .json(&json!({}))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.header("content-type").as_deref(),
        Some("application/x-ndjson")
    );

    let events = response.ndjson();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0]["type"], "content_update");
    assert_eq!(events[1]["type"], "content_update");
    assert!(
        events[0]["content_length"].as_u64() < events[1]["content_length"].as_u64(),
        "cumulative length must strictly increase"
    );
    assert_eq!(events[2]["type"], "complete");
    assert_eq!(events[2]["analysis"]["summary"], "友好");
    assert_eq!(events[2]["message_count"], 3);

    // The persisted record is readable afterwards
    let stored = resources
        .database
        .analysis()
        .get(contact_id)
        .await
        .unwrap()
        .expect("analysis stored");
    assert_eq!(stored.summary, "友好");
}

#[tokio::test]
async fn test_stream_route_failure_is_single_error_event() {
    let provider = Arc::new(ScriptedProvider::new(ScriptedBehavior::Fail(
        "bad gateway".to_owned(),
    )));
    let (router, resources) = setup_with(Arc::clone(&provider)).await;
    let contact_id = seed_contact_with_history(&resources).await;

    let response = AxumTestRequest::post(&format!("/api/contacts/{contact_id}/analyze/stream"))
        .json(&json!({}))
        .send(router)
        .await;

    // Stream responses always start OK; failures arrive as events
    assert_eq!(response.status_code(), StatusCode::OK);

    let events = response.ndjson();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "error");
    assert!(events[0]["message"].as_str().unwrap().contains("bad gateway"));
}

#[tokio::test]
async fn test_selected_stream_empty_selection_is_error_event_before_upstream() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&["{}"]));
    let (router, resources) = setup_with(Arc::clone(&provider)).await;
    let contact_id = seed_contact_with_history(&resources).await;

    let response = AxumTestRequest::post(&format!(
        "/api/contacts/{contact_id}/analyze-selected/stream"
    ))
    .json(&json!({"message_ids": []}))
    .send(router)
    .await;

    let events = response.ndjson();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "error");
    assert_eq!(provider.call_count(), 0);
}

// ============================================================================
// Blocking Routes
// ============================================================================

#[tokio::test]
async fn test_blocking_analyze_returns_persisted_analysis() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&[SCENARIO_ANALYSIS_JSON]));
    let (router, resources) = setup_with(provider).await;
    let contact_id = seed_contact_with_history(&resources).await;

    let response = AxumTestRequest::post(&format!("/api/contacts/{contact_id}/analyze"))
        .json(&json!({}))
        .send(router.clone())
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["analysis"]["summary"], "友好");

    // And the GET endpoint serves the stored record
    let response = AxumTestRequest::get(&format!("/api/contacts/{contact_id}/analysis"))
        .send(router)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["analysis"]["summary"], "友好");
}

#[tokio::test]
async fn test_blocking_analyze_upstream_failure_maps_to_bad_gateway() {
    let provider = Arc::new(ScriptedProvider::new(ScriptedBehavior::Fail(
        "overloaded".to_owned(),
    )));
    let (router, resources) = setup_with(provider).await;
    let contact_id = seed_contact_with_history(&resources).await;

    let response = AxumTestRequest::post(&format!("/api/contacts/{contact_id}/analyze"))
        .json(&json!({}))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "UPSTREAM_CALL_FAILED");
}

#[tokio::test]
async fn test_blocking_selected_too_short_is_rejected() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&["{}"]));
    let (router, resources) = setup_with(Arc::clone(&provider)).await;
    let contact_id = create_test_contact(&resources.database, "短")
        .await
        .unwrap();
    let line_id = add_test_line(&resources.database, contact_id, "对方", "嗯", "2024-01-01")
        .await
        .unwrap();

    let response = AxumTestRequest::post(&format!("/api/contacts/{contact_id}/analyze-selected"))
        .json(&json!({"message_ids": [line_id]}))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "TRANSCRIPT_TOO_SHORT");
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_blocking_selected_reports_message_count() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&[SCENARIO_ANALYSIS_JSON]));
    let (router, resources) = setup_with(provider).await;
    let contact_id = create_test_contact(&resources.database, "选择")
        .await
        .unwrap();

    let mut ids = Vec::new();
    for i in 0..3 {
        let id = add_test_line(
            &resources.database,
            contact_id,
            "对方",
            &format!("这是一条足够长的测试消息，编号第{i}号，用来凑齐最小分析长度要求"),
            "2024-02-01",
        )
        .await
        .unwrap();
        ids.push(id);
    }

    let response = AxumTestRequest::post(&format!("/api/contacts/{contact_id}/analyze-selected"))
        .json(&json!({"message_ids": [ids[0], ids[1]]}))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["message_count"], 2);
}

#[tokio::test]
async fn test_get_analysis_before_any_run_returns_not_found() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&["{}"]));
    let (router, resources) = setup_with(provider).await;
    let contact_id = seed_contact_with_history(&resources).await;

    let response = AxumTestRequest::get(&format!("/api/contacts/{contact_id}/analysis"))
        .send(router)
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
