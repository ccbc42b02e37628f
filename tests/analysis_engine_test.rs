// ABOUTME: Integration tests for the analysis pipeline orchestrator
// ABOUTME: Covers gates, streaming event ordering, and the end-to-end persist cycle
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use tokio_stream::StreamExt;

use common::{
    add_test_line, create_test_contact, create_test_resources, ScriptedBehavior, ScriptedProvider,
    SCENARIO_ANALYSIS_JSON,
};
use rapport_server::analysis::{AnalysisScope, ProgressEvent};
use rapport_server::errors::ErrorCode;
use rapport_server::llm::UsageTotals;

async fn seed_scenario_contact(
    resources: &rapport_server::server::ServerResources,
) -> anyhow::Result<i64> {
    let contact_id = create_test_contact(&resources.database, "测试联系人").await?;
    add_test_line(&resources.database, contact_id, "我", "你好", "2024-01-01").await?;
    add_test_line(&resources.database, contact_id, "对方", "你好呀", "2024-01-02").await?;
    add_test_line(&resources.database, contact_id, "我", "最近怎么样", "2024-01-03").await?;
    Ok(contact_id)
}

// ============================================================================
// Pre-Network Gates
// ============================================================================

#[tokio::test]
async fn test_empty_history_fails_before_any_upstream_call() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&["{}"]));
    let resources = create_test_resources(Arc::clone(&provider)).await.unwrap();
    let contact_id = create_test_contact(&resources.database, "空白").await.unwrap();

    let error = resources
        .engine()
        .analyze(contact_id, AnalysisScope::FullHistory, None)
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::EmptyTranscript);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_empty_selection_fails_before_any_upstream_call() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&["{}"]));
    let resources = create_test_resources(Arc::clone(&provider)).await.unwrap();
    let contact_id = seed_scenario_contact(&resources).await.unwrap();

    let error = resources
        .engine()
        .analyze(contact_id, AnalysisScope::Selected(Vec::new()), None)
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::InvalidInput);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_short_selection_fails_before_any_upstream_call() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&["{}"]));
    let resources = create_test_resources(Arc::clone(&provider)).await.unwrap();
    let contact_id = create_test_contact(&resources.database, "短消息").await.unwrap();
    let line_id =
        add_test_line(&resources.database, contact_id, "对方", "嗯", "2024-01-01")
            .await
            .unwrap();

    let error = resources
        .engine()
        .analyze(contact_id, AnalysisScope::Selected(vec![line_id]), None)
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::TranscriptTooShort);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_minimum_length_gate_only_applies_to_selected_mode() {
    // Full-history mode analyzes even a trivially short transcript
    let provider = Arc::new(ScriptedProvider::with_deltas(&["{}"]));
    let resources = create_test_resources(Arc::clone(&provider)).await.unwrap();
    let contact_id = create_test_contact(&resources.database, "短消息").await.unwrap();
    add_test_line(&resources.database, contact_id, "对方", "嗯", "2024-01-01")
        .await
        .unwrap();

    let outcome = resources
        .engine()
        .analyze(contact_id, AnalysisScope::FullHistory, None)
        .await
        .unwrap();

    assert_eq!(outcome.message_count, 1);
    assert_eq!(provider.call_count(), 1);
}

#[tokio::test]
async fn test_unknown_contact_fails_with_not_found() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&["{}"]));
    let resources = create_test_resources(Arc::clone(&provider)).await.unwrap();

    let error = resources
        .engine()
        .analyze(9999, AnalysisScope::FullHistory, None)
        .await
        .unwrap_err();

    assert_eq!(error.code, ErrorCode::ResourceNotFound);
    assert_eq!(provider.call_count(), 0);
}

// ============================================================================
// Streaming Event Ordering
// ============================================================================

#[tokio::test]
async fn test_streaming_emits_deltas_in_order_then_complete() {
    let provider = Arc::new(ScriptedProvider::new(ScriptedBehavior::Stream {
        deltas: vec!["D1".to_owned(), "D2".to_owned(), "D3".to_owned()],
        usage: Some(UsageTotals {
            total_tokens: 30,
            completion_tokens: 12,
        }),
    }));
    let resources = create_test_resources(Arc::clone(&provider)).await.unwrap();
    let contact_id = seed_scenario_contact(&resources).await.unwrap();

    let events: Vec<ProgressEvent> = resources
        .engine()
        .analyze_stream(contact_id, AnalysisScope::FullHistory, None)
        .collect()
        .await;

    // Three content updates with strictly increasing lengths, then the
    // trailing usage frame, then exactly one complete
    let mut lengths = Vec::new();
    let mut complete_seen = false;
    for event in &events {
        match event {
            ProgressEvent::ContentUpdate { content_length, .. } => {
                assert!(!complete_seen, "content update after complete");
                lengths.push(*content_length);
            }
            ProgressEvent::TokenUpdate { total_tokens, .. } => {
                assert!(!complete_seen);
                assert_eq!(*total_tokens, 30);
            }
            ProgressEvent::Complete {
                message_count,
                total_tokens,
                ..
            } => {
                complete_seen = true;
                assert_eq!(*message_count, 3);
                assert_eq!(*total_tokens, 30);
            }
            ProgressEvent::Error { message } => panic!("unexpected error event: {message}"),
        }
    }

    assert_eq!(lengths, vec![2, 4, 6]);
    assert!(complete_seen);
    assert!(matches!(events.last(), Some(ProgressEvent::Complete { .. })));
}

#[tokio::test]
async fn test_streaming_failure_ends_with_single_error_event() {
    let provider = Arc::new(ScriptedProvider::new(ScriptedBehavior::Fail(
        "service exploded".to_owned(),
    )));
    let resources = create_test_resources(Arc::clone(&provider)).await.unwrap();
    let contact_id = seed_scenario_contact(&resources).await.unwrap();

    let events: Vec<ProgressEvent> = resources
        .engine()
        .analyze_stream(contact_id, AnalysisScope::FullHistory, None)
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        ProgressEvent::Error { message } => assert!(message.contains("service exploded")),
        other => panic!("expected error event, got {other:?}"),
    }

    // Nothing was persisted
    let stored = resources.database.analysis().get(contact_id).await.unwrap();
    assert!(stored.is_none());
}

// ============================================================================
// End-to-End Scenario
// ============================================================================

#[tokio::test]
async fn test_streaming_scenario_persists_summary() {
    // Two deltas that concatenate into the full analysis document
    let (first, second) = SCENARIO_ANALYSIS_JSON.split_at(20);
    let provider = Arc::new(ScriptedProvider::with_deltas(&[first, second]));
    let resources = create_test_resources(Arc::clone(&provider)).await.unwrap();
    let contact_id = seed_scenario_contact(&resources).await.unwrap();

    let events: Vec<ProgressEvent> = resources
        .engine()
        .analyze_stream(contact_id, AnalysisScope::FullHistory, None)
        .collect()
        .await;

    assert_eq!(events.len(), 3, "two content updates and one complete");
    assert!(matches!(events[0], ProgressEvent::ContentUpdate { .. }));
    assert!(matches!(events[1], ProgressEvent::ContentUpdate { .. }));
    match &events[2] {
        ProgressEvent::Complete {
            analysis,
            message_count,
            ..
        } => {
            assert_eq!(analysis.summary, "友好");
            assert_eq!(*message_count, 3);
        }
        other => panic!("expected complete event, got {other:?}"),
    }

    let stored = resources
        .database
        .analysis()
        .get(contact_id)
        .await
        .unwrap()
        .expect("analysis persisted");
    assert_eq!(stored.summary, "友好");
}

#[tokio::test]
async fn test_repeated_analysis_overwrites_single_row() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&[SCENARIO_ANALYSIS_JSON]));
    let resources = create_test_resources(Arc::clone(&provider)).await.unwrap();
    let contact_id = seed_scenario_contact(&resources).await.unwrap();
    let engine = resources.engine();

    let first = engine
        .analyze(contact_id, AnalysisScope::FullHistory, None)
        .await
        .unwrap();
    let second = engine
        .analyze(contact_id, AnalysisScope::FullHistory, None)
        .await
        .unwrap();

    // Same row updated in place, not a second row
    assert_eq!(first.record.id, second.record.id);
    assert_eq!(first.record.created_at, second.record.created_at);

    // Every structured field stays valid JSON
    let record = &second.record;
    for field in [
        &record.core_traits,
        &record.behavior_preferences,
        &record.social_interaction,
        &record.cognitive_thinking,
        &record.interests,
        &record.dos_and_donts,
        &record.topic_suggestions,
        &record.gift_suggestions,
    ] {
        serde_json::from_str::<serde_json::Value>(field).expect("stored field is valid JSON");
    }
}

#[tokio::test]
async fn test_malformed_output_persists_defaults_with_raw_payload() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&[
        "抱歉，我无法输出JSON格式",
    ]));
    let resources = create_test_resources(Arc::clone(&provider)).await.unwrap();
    let contact_id = seed_scenario_contact(&resources).await.unwrap();

    let outcome = resources
        .engine()
        .analyze(contact_id, AnalysisScope::FullHistory, None)
        .await
        .unwrap();

    assert_eq!(outcome.record.summary, "");
    assert_eq!(outcome.record.core_traits, "{}");
    assert_eq!(outcome.record.interests, "[]");
    assert_eq!(outcome.record.raw_response, "抱歉，我无法输出JSON格式");
}

#[tokio::test]
async fn test_selected_subset_analyzes_only_chosen_lines() {
    let provider = Arc::new(ScriptedProvider::with_deltas(&[SCENARIO_ANALYSIS_JSON]));
    let resources = create_test_resources(Arc::clone(&provider)).await.unwrap();
    let contact_id = create_test_contact(&resources.database, "选择").await.unwrap();

    let mut ids = Vec::new();
    for i in 0..5 {
        let id = add_test_line(
            &resources.database,
            contact_id,
            "对方",
            &format!("这是一条足够长的测试消息，编号是第{i}号，用来凑齐分析所需的长度"),
            "2024-02-01",
        )
        .await
        .unwrap();
        ids.push(id);
    }

    let outcome = resources
        .engine()
        .analyze(
            contact_id,
            AnalysisScope::Selected(ids[..2].to_vec()),
            None,
        )
        .await
        .unwrap();

    assert_eq!(outcome.message_count, 2);
    assert_eq!(provider.call_count(), 1);
}
