// ABOUTME: Tolerant normalization of model output into the fixed analysis schema
// ABOUTME: Substitutes safe defaults so persistence never branches on absence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rapport Project

//! # Response Normalizer
//!
//! The model is instructed to return a strict JSON document, but its output
//! is not contractually guaranteed to comply. This module coerces whatever
//! came back into an [`AnalysisDocument`] that always carries every field:
//!
//! - `Parsed` outcomes are consumed directly.
//! - `Unparsed` outcomes get a brace-window extraction pass (first `{` to
//!   last `}`) that tolerates commentary around the JSON block; if that also
//!   fails, every field defaults.
//! - Absent, null, and empty fields are replaced by type-appropriate empty
//!   defaults. All nine structured fields get the same treatment,
//!   `topic_suggestions` and `gift_suggestions` included.
//!
//! Transport and upstream errors never reach this module; they short-circuit
//! as `Err` before an outcome exists.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ModelOutcome, UsageTotals};

/// The normalized analysis schema
///
/// Field values are kept as loosely-typed JSON: the model's descriptive
/// sub-structures vary, and the only guarantee persistence needs is that
/// each field serializes to valid JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDocument {
    /// Personality tendencies (object of labeled descriptions)
    pub core_traits: Value,
    /// Interests, likes/dislikes, lifestyle habits (object)
    pub behavior_preferences: Value,
    /// Communication and interaction patterns (object)
    pub social_interaction: Value,
    /// Knowledge and values (object)
    pub cognitive_thinking: Value,
    /// One-line characterization
    pub summary: String,
    /// Interest keywords (array)
    pub interests: Value,
    /// Relationship guidance (`dos`/`donts` arrays)
    pub dos_and_donts: Value,
    /// Suggested conversation topics (array)
    pub topic_suggestions: Value,
    /// Gift ideas (array)
    pub gift_suggestions: Value,
}

impl Default for AnalysisDocument {
    fn default() -> Self {
        Self {
            core_traits: json!({}),
            behavior_preferences: json!({}),
            social_interaction: json!({}),
            cognitive_thinking: json!({}),
            summary: String::new(),
            interests: json!([]),
            dos_and_donts: json!({}),
            topic_suggestions: json!([]),
            gift_suggestions: json!([]),
        }
    }
}

impl AnalysisDocument {
    /// Build a document from a parsed model response, defaulting empty fields
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();

        Self {
            core_traits: field_or(value, "core_traits", defaults.core_traits),
            behavior_preferences: field_or(
                value,
                "behavior_preferences",
                defaults.behavior_preferences,
            ),
            social_interaction: field_or(value, "social_interaction", defaults.social_interaction),
            cognitive_thinking: field_or(value, "cognitive_thinking", defaults.cognitive_thinking),
            summary: match value.get("summary") {
                Some(Value::String(s)) if !s.is_empty() => s.clone(),
                _ => defaults.summary,
            },
            interests: field_or(value, "interests", defaults.interests),
            dos_and_donts: field_or(value, "dos_and_donts", defaults.dos_and_donts),
            topic_suggestions: field_or(value, "topic_suggestions", defaults.topic_suggestions),
            gift_suggestions: field_or(value, "gift_suggestions", defaults.gift_suggestions),
        }
    }
}

/// A fully normalized analysis, ready for persistence
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAnalysis {
    /// The normalized document (every field populated)
    pub document: AnalysisDocument,
    /// The unmodified upstream payload, preserved for auditing
    pub raw_response: String,
    /// Final token totals from the call
    pub usage: UsageTotals,
}

/// Normalize a model outcome into the fixed analysis schema
#[must_use]
pub fn normalize(outcome: ModelOutcome) -> NormalizedAnalysis {
    match outcome {
        ModelOutcome::Parsed { value, raw, usage } => NormalizedAnalysis {
            document: AnalysisDocument::from_value(&value),
            raw_response: raw,
            usage,
        },
        ModelOutcome::Unparsed { raw, usage } => {
            let document = extract_json_object(&raw)
                .map_or_else(AnalysisDocument::default, |value| {
                    AnalysisDocument::from_value(&value)
                });
            NormalizedAnalysis {
                document,
                raw_response: raw,
                usage,
            }
        }
    }
}

/// Extract a JSON object out of surrounding commentary
///
/// Takes the window from the first `{` to the last `}` and parses it.
/// Returns `None` when no such window exists or it is not valid JSON.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Pull a field out of a parsed response, substituting `default` when the
/// field is absent or empty
fn field_or(value: &Value, field: &str, default: Value) -> Value {
    match value.get(field) {
        Some(v) if !is_empty_value(v) => v.clone(),
        _ => default,
    }
}

/// Whether a JSON value counts as "empty" for the defaulting pass
///
/// Covers absence-equivalent values: null, false, zero, empty string, empty
/// collection.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unparsed(raw: &str) -> ModelOutcome {
        ModelOutcome::Unparsed {
            raw: raw.to_owned(),
            usage: UsageTotals::default(),
        }
    }

    #[test]
    fn test_defaulting_law_on_unparseable_payload() {
        let normalized = normalize(unparsed("模型没有返回任何有效内容"));
        let doc = &normalized.document;

        assert_eq!(doc.core_traits, json!({}));
        assert_eq!(doc.behavior_preferences, json!({}));
        assert_eq!(doc.social_interaction, json!({}));
        assert_eq!(doc.cognitive_thinking, json!({}));
        assert_eq!(doc.dos_and_donts, json!({}));
        assert_eq!(doc.interests, json!([]));
        assert_eq!(doc.topic_suggestions, json!([]));
        assert_eq!(doc.gift_suggestions, json!([]));
        assert_eq!(doc.summary, "");
        assert_eq!(normalized.raw_response, "模型没有返回任何有效内容");
    }

    #[test]
    fn test_extracts_json_from_surrounding_commentary() {
        let normalized = normalize(unparsed(
            "以下是分析结果：\n{\"summary\":\"理性的技术宅\",\"interests\":[\"编程\"]}\n希望对你有帮助。",
        ));
        assert_eq!(normalized.document.summary, "理性的技术宅");
        assert_eq!(normalized.document.interests, json!(["编程"]));
        // Untouched fields still default
        assert_eq!(normalized.document.core_traits, json!({}));
    }

    #[test]
    fn test_parsed_outcome_used_as_is() {
        let value = json!({
            "core_traits": {"rationality": "偏理性"},
            "summary": "友好",
            "interests": ["美食"],
            "dos_and_donts": {"dos": ["多倾听"], "donts": []},
        });
        let normalized = normalize(ModelOutcome::Parsed {
            value: value.clone(),
            raw: value.to_string(),
            usage: UsageTotals {
                total_tokens: 100,
                completion_tokens: 40,
            },
        });

        assert_eq!(
            normalized.document.core_traits,
            json!({"rationality": "偏理性"})
        );
        assert_eq!(normalized.document.summary, "友好");
        assert_eq!(normalized.usage.total_tokens, 100);
    }

    #[test]
    fn test_empty_fields_are_replaced() {
        let value = json!({
            "core_traits": {},
            "behavior_preferences": null,
            "summary": "",
            "interests": [],
            "topic_suggestions": [],
            "gift_suggestions": null,
        });
        let doc = AnalysisDocument::from_value(&value);

        assert_eq!(doc.core_traits, json!({}));
        assert_eq!(doc.behavior_preferences, json!({}));
        assert_eq!(doc.summary, "");
        assert_eq!(doc.interests, json!([]));
        // Same defaulting policy as the seven required fields
        assert_eq!(doc.topic_suggestions, json!([]));
        assert_eq!(doc.gift_suggestions, json!([]));
    }

    #[test]
    fn test_nested_braces_survive_extraction() {
        let extracted = extract_json_object("x {\"a\":{\"b\":1}} y").unwrap();
        assert_eq!(extracted, json!({"a":{"b":1}}));
    }

    #[test]
    fn test_extraction_without_object_window() {
        assert!(extract_json_object("no braces here").is_none());
        assert!(extract_json_object("} reversed {").is_none());
    }
}
