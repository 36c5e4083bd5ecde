//! Turns raw comparison results into per-model response records
//!
//! Every function here is pure except [`reconcile`], which performs
//! one round trip through a [`CompareService`]. Callers hold the
//! current records and replace them wholesale with whatever these
//! functions return.

use log::{debug, trace, warn};
use serde_json::Value;

use crate::error::Error;
use crate::resolve::{self, FieldPath};
use crate::service::CompareService;
use crate::{Metadata, ModelDescriptor, RateLimit, ResponseRecord};

pub const DEFAULT_MODEL_ID: &str = "default";
pub const DEFAULT_MODEL_NAME: &str = "Default Model";
pub const NO_RESPONSE_TEXT: &str = "No response received from server";
pub const UNKNOWN_MODEL_ID: &str = "unknown";
pub const UNKNOWN_MODEL_NAME: &str = "Unknown Model";
pub const TRACKED_FAILURE_TEXT: &str = "Failed to get response from LLM";
pub const UNTRACKED_FAILURE_TEXT: &str = "Failed to get response";

// ===== Field chains =====

const DISPLAY_NAME: &[FieldPath<'static>] = &[&["llmName"], &["llm"]];
const MODEL_ID: &[FieldPath<'static>] = &[&["llm"], &["llmName"]];
const ANSWER: &[FieldPath<'static>] = &[&["response"], &["text"]];
const ERROR: &[FieldPath<'static>] = &[&["error"], &["error", "message"]];

const PROMPT_TOKENS: &[FieldPath<'static>]
  = &[&["metadata", "promptTokens"], &["promptTokens"]];
const GENERATION_TOKENS: &[FieldPath<'static>]
  = &[ &["metadata", "generationTokens"]
     , &["generationTokens"]
     , &["completionTokens"]
     ];
const TOTAL_TOKENS: &[FieldPath<'static>]
  = &[&["metadata", "totalTokens"], &["totalTokens"]];
const RESPONSE_TIME: &[FieldPath<'static>]
  = &[&["metadata", "responseTime"], &["responseTime"]];
const MODEL_VERSION: &[FieldPath<'static>]
  = &[&["metadata", "model"], &["model"]];
const FINISH_REASON: &[FieldPath<'static>]
  = &[&["metadata", "finishReason"], &["finishReason"]];
const TIMESTAMP: &[FieldPath<'static>]
  = &[&["metadata", "timestamp"], &["timestamp"]];
const RATE_LIMIT: &[FieldPath<'static>]
  = &[&["metadata", "rateLimit"], &["rateLimit"]];

const REQUESTS_LIMIT: &[FieldPath<'static>] = &[&["requestsLimit"]];
const REQUESTS_REMAINING: &[FieldPath<'static>] = &[&["requestsRemaining"]];
const TOKENS_LIMIT: &[FieldPath<'static>] = &[&["tokensLimit"]];
const TOKENS_REMAINING: &[FieldPath<'static>] = &[&["tokensRemaining"]];
const RESET_AFTER: &[FieldPath<'static>] = &[&["resetAfter"]];

/// Current time in the format used for defaulted timestamps
pub fn capture_time() -> String
{   chrono::Utc::now()
      .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ===== Submission =====

/// Only non-blank prompts are sent
pub fn check_prompt(prompt: &str) -> Result<(), Error>
{   if prompt.trim().is_empty()
    {   warn!("Rejecting empty prompt");
        return Err(Error::EmptyPrompt);
    }
    Ok(())
}

/// Every record pending, with answers, errors and metadata cleared
pub fn mark_pending(records: &[ResponseRecord]) -> Vec<ResponseRecord>
{   records.iter()
      .map(|r| ResponseRecord
        {   is_pending: true
          , answer_text: None
          , error_message: None
          , metadata: None
          , ..r.clone()
        })
      .collect()
}

/// Identifiers to send for `selected`.
/// An empty selection falls back to the first available model.
pub fn query_model_ids(
  selected: &[ModelDescriptor]
, available: &[ModelDescriptor]
) -> Vec<String>
{   if selected.is_empty()
    {   debug!("Empty selection, falling back to first model");
        return available.first()
          .map(|d| vec![d.id.clone()])
          .unwrap_or_default();
    }
    selected.iter().map(|d| d.id.clone()).collect()
}

// ===== Success path =====

/// Records for a successful round trip, in `responses` order.
///
/// A payload without a non-empty `responses` array yields the single
/// placeholder record rather than an error.
pub fn records_from_payload(payload: &Value, captured_at: &str)
  -> Vec<ResponseRecord>
{   match payload.get("responses").and_then(Value::as_array)
    {   Some(entries) if !entries.is_empty() => {
          debug!("Reconciling {} responses", entries.len());
          entries.iter()
            .map(|entry| record_from_entry(entry, captured_at))
            .collect()
        }
      , _ => {
          warn!("Payload carried no responses");
          vec![no_response_record()]
        }
    }
}

/// Normalize one provider-shaped element of `responses`
pub fn record_from_entry(entry: &Value, captured_at: &str)
  -> ResponseRecord
{   trace!("Reconciling entry: {}", entry);
    ResponseRecord
    {   model_id: resolve::first_string(entry, MODEL_ID)
          .unwrap_or_else(|| UNKNOWN_MODEL_ID.to_string())
      , model_display_name: resolve::first_string(entry, DISPLAY_NAME)
          .unwrap_or_else(|| UNKNOWN_MODEL_NAME.to_string())
      , answer_text: resolve::first_string(entry, ANSWER)
      , error_message: resolve::first_string(entry, ERROR)
      , is_pending: false
      , metadata: Some(metadata_from_entry(entry, captured_at))
    }
}

fn metadata_from_entry(entry: &Value, captured_at: &str) -> Metadata
{   Metadata
    {   prompt_tokens: resolve::first_u64(entry, PROMPT_TOKENS)
      , generation_tokens: resolve::first_u64(entry, GENERATION_TOKENS)
      , total_tokens: resolve::first_u64(entry, TOTAL_TOKENS)
      , response_time_ms: resolve::first_u64(entry, RESPONSE_TIME)
      , model_version: resolve::first_string(entry, MODEL_VERSION)
      , finish_reason: resolve::first_string(entry, FINISH_REASON)
      , timestamp: resolve::first_string(entry, TIMESTAMP)
          .unwrap_or_else(|| captured_at.to_string())
      , rate_limit: rate_limit_from_entry(entry)
    }
}

fn rate_limit_from_entry(entry: &Value) -> Option<RateLimit>
{   let container = resolve::first_object(entry, RATE_LIMIT)?;
    Some(RateLimit
    {   limit: resolve::first_u64(container, REQUESTS_LIMIT)
      , remaining: resolve::first_u64(container, REQUESTS_REMAINING)
      , tokens_limit: resolve::first_u64(container, TOKENS_LIMIT)
      , tokens_remaining: resolve::first_u64(container, TOKENS_REMAINING)
      , reset_after_seconds: resolve::first_f64(container, RESET_AFTER)
    })
}

fn no_response_record() -> ResponseRecord
{   ResponseRecord
    {   answer_text: Some(NO_RESPONSE_TEXT.to_string())
      , ..ResponseRecord::blank(&ModelDescriptor::fallback())
    }
}

// ===== Failure path =====

/// Records after a failed round trip.
///
/// Tracked records keep their identity and carry the failure; with
/// nothing tracked a single failed placeholder is produced.
pub fn records_from_failure(tracked: &[ResponseRecord], error: &Error)
  -> Vec<ResponseRecord>
{   if tracked.is_empty()
    {   return vec![ResponseRecord
        {   error_message: Some(
              error.failure_description(UNTRACKED_FAILURE_TEXT)
            )
          , ..ResponseRecord::blank(&ModelDescriptor::fallback())
        }];
    }

    let message = error.failure_description(TRACKED_FAILURE_TEXT);
    tracked.iter()
      .map(|r| ResponseRecord
        {   is_pending: false
          , answer_text: None
          , error_message: Some(message.clone())
          , metadata: None
          , ..r.clone()
        })
      .collect()
}

// ===== Selection =====

/// Descriptors whose id is in `selected_ids`, in `available` order.
/// Never empty while any model is available.
pub fn select_descriptors(
  selected_ids: &[String]
, available: &[ModelDescriptor]
) -> Vec<ModelDescriptor>
{   let mut selected: Vec<ModelDescriptor> = available.iter()
      .filter(|d| selected_ids.iter().any(|id| *id == d.id))
      .cloned()
      .collect();

    if selected.is_empty()
    {   if let Some(first) = available.first()
        {   debug!("Selection empty, keeping {}", first.id);
            selected.push(first.clone());
        }
    }
    selected
}

/// Fresh blank records for a changed selection
pub fn reselect(selected_ids: &[String], available: &[ModelDescriptor])
  -> Vec<ResponseRecord>
{   select_descriptors(selected_ids, available)
      .iter()
      .map(ResponseRecord::blank)
      .collect()
}

/// Models selected right after the list loads
pub fn initial_selection(available: &[ModelDescriptor], count: usize)
  -> Vec<ModelDescriptor>
{   available.iter().take(count.max(1)).cloned().collect()
}

// ===== Model listing =====

/// Descriptors from a model-list payload: a bare array, or an object
/// carrying an `llms` or `models` array. Later duplicates of an id
/// are dropped.
pub fn descriptors_from_listing(payload: &Value) -> Vec<ModelDescriptor>
{   let entries = payload.as_array()
      .or_else(|| payload.get("llms").and_then(Value::as_array))
      .or_else(|| payload.get("models").and_then(Value::as_array));

    let mut descriptors: Vec<ModelDescriptor> = vec![];
    for entry in entries.into_iter().flatten()
    {   match ModelDescriptor::from_listing(entry)
        {   Some(d) if descriptors.iter().all(|k| k.id != d.id) => {
              descriptors.push(d);
            }
          , Some(d) => {
              warn!("Dropping duplicate model id: {}", d.id);
            }
          , None => {
              warn!("Skipping unusable model entry: {}", entry);
            }
        }
    }
    descriptors
}

/// Listed models, or the single default model when the list
/// is empty or could not be fetched
pub fn available_or_fallback(
  listed: Result<Vec<ModelDescriptor>, Error>
) -> Vec<ModelDescriptor>
{   match listed
    {   Ok(models) if !models.is_empty() => models
      , Ok(_) => {
          warn!("Server listed no models, using default");
          vec![ModelDescriptor::fallback()]
        }
      , Err(e) => {
          warn!("Model listing failed ({}), using default", e);
          vec![ModelDescriptor::fallback()]
        }
    }
}

// ===== Round trip =====

/// Outcome of one reconcile call
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation
{   pub records: Vec<ResponseRecord>
  , /// True after a successful round trip, false after a failed one
    pub healthy: bool
}

/// Apply a finished round trip to the records tracked at that time
pub fn settle(
  tracked: &[ResponseRecord]
, outcome: &Result<Value, Error>
, captured_at: &str
) -> Reconciliation
{   match outcome
    {   Ok(payload) => Reconciliation
        {   records: records_from_payload(payload, captured_at)
          , healthy: true
        }
      , Err(e) => {
          warn!("Query failed: {}", e);
          Reconciliation
          {   records: records_from_failure(tracked, e)
            , healthy: false
          }
        }
    }
}

/// Send `prompt` to `model_ids` and reconcile the answer against
/// the records currently tracked.
///
/// Only a blank prompt is an error; transport and server failures
/// come back as failed records.
pub async fn reconcile(
  service: &dyn CompareService
, prompt: &str
, model_ids: &[String]
, tracked: &[ResponseRecord]
) -> Result<Reconciliation, Error>
{   check_prompt(prompt)?;

    let pending = mark_pending(tracked);
    debug!("Reconciling prompt across {} models", model_ids.len());
    let outcome = service.query(prompt, model_ids).await;
    Ok(settle(&pending, &outcome, &capture_time()))
}

#[cfg(test)]
mod tests
{   use super::*;
    use serde_json::json;

    const AT: &str = "2026-01-01T00:00:00+00:00";

    fn descriptors() -> Vec<ModelDescriptor>
    {   vec![
          ModelDescriptor::new("a", "Model A")
        , ModelDescriptor::new("b", "Model B")
        , ModelDescriptor::new("c", "Model C")
        , ModelDescriptor::new("d", "Model D")
        ]
    }

    #[test]
    fn entries_map_in_order()
    {   let payload = json!({ "responses": [
          { "llm": "b", "llmName": "Model B", "response": "two" },
          { "llm": "a", "llmName": "Model A", "text": "one" },
          { "llm": "a", "llmName": "Model A", "response": "again" }
        ]});
        let records = records_from_payload(&payload, AT);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].model_id, "b");
        assert_eq!(records[1].answer_text.as_deref(), Some("one"));
        assert_eq!(records[2].answer_text.as_deref(), Some("again"));
        assert!(records.iter().all(|r| !r.is_pending));
    }

    #[test]
    fn missing_or_empty_responses_degrade()
    {   for payload in [
          json!({}),
          json!({ "responses": [] }),
          json!({ "responses": "nope" }),
          json!(null),
        ]
        {   let records = records_from_payload(&payload, AT);
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].model_id, "default");
            assert_eq!(
              records[0].answer_text.as_deref(),
              Some(NO_RESPONSE_TEXT)
            );
            assert!(records[0].error_message.is_none());
        }
    }

    #[test]
    fn identity_fallbacks()
    {   let only_name = record_from_entry(
          &json!({ "llmName": "claude" }), AT
        );
        assert_eq!(only_name.model_id, "claude");
        assert_eq!(only_name.model_display_name, "claude");

        let nothing = record_from_entry(&json!({}), AT);
        assert_eq!(nothing.model_id, "unknown");
        assert_eq!(nothing.model_display_name, "Unknown Model");
        assert!(nothing.answer_text.is_none());
    }

    #[test]
    fn completion_tokens_feed_generation_tokens()
    {   let record = record_from_entry(
          &json!({ "llm": "x", "completionTokens": 42 }), AT
        );
        let meta = record.metadata.unwrap();
        assert_eq!(meta.generation_tokens, Some(42));
        assert_eq!(meta.timestamp, AT);
        assert!(meta.rate_limit.is_none());
    }

    #[test]
    fn metadata_wrapper_wins_and_rate_limit_kept()
    {   let record = record_from_entry(&json!({
          "llm": "x",
          "totalTokens": 1,
          "error": "partial",
          "metadata": {
            "totalTokens": 30,
            "promptTokens": 10,
            "generationTokens": 20,
            "responseTime": 812,
            "model": "x-2024-05",
            "finishReason": "stop",
            "timestamp": "2025-06-01T10:00:00Z",
            "rateLimit": { "requestsRemaining": 4, "resetAfter": "1.5" }
          }
        }), AT);
        assert_eq!(record.error_message.as_deref(), Some("partial"));
        let meta = record.metadata.unwrap();
        assert_eq!(meta.total_tokens, Some(30));
        assert_eq!(meta.response_time_ms, Some(812));
        assert_eq!(meta.model_version.as_deref(), Some("x-2024-05"));
        assert_eq!(meta.timestamp, "2025-06-01T10:00:00Z");
        let limits = meta.rate_limit.unwrap();
        assert_eq!(limits.remaining, Some(4));
        assert_eq!(limits.reset_after_seconds, Some(1.5));
        assert_eq!(limits.limit, None);
        assert_eq!(limits.tokens_limit, None);
    }

    #[test]
    fn flat_fields_and_top_level_rate_limit()
    {   let record = record_from_entry(&json!({
          "llm": "x",
          "promptTokens": 8,
          "model": "x-mini",
          "rateLimit": { "requestsLimit": 10 },
          "finishReason": "length",
          "responseTime": 5
        }), AT);
        let meta = record.metadata.unwrap();
        assert_eq!(meta.prompt_tokens, Some(8));
        assert_eq!(meta.model_version.as_deref(), Some("x-mini"));
        assert_eq!(meta.finish_reason.as_deref(), Some("length"));
        assert_eq!(meta.response_time_ms, Some(5));
        assert_eq!(meta.rate_limit, Some(RateLimit
        {   limit: Some(10)
          , remaining: None
          , tokens_limit: None
          , tokens_remaining: None
          , reset_after_seconds: None
        }));
    }

    #[test]
    fn non_object_rate_limit_falls_through()
    {   let record = record_from_entry(&json!({
          "llm": "x",
          "metadata": { "rateLimit": "n/a" },
          "rateLimit": { "requestsRemaining": 2 }
        }), AT);
        let limits = record.metadata.unwrap().rate_limit.unwrap();
        assert_eq!(limits.remaining, Some(2));
        assert_eq!(limits.limit, None);
    }

    #[test]
    fn capture_time_uses_millisecond_utc()
    {   let stamp = capture_time();
        assert!(stamp.ends_with('Z'), "{}", stamp);
        let fraction = stamp.rsplit('.').next().unwrap();
        assert_eq!(fraction.len(), "123Z".len());
    }

    #[test]
    fn blank_prompt_rejected()
    {   assert_eq!(check_prompt(" \n"), Err(Error::EmptyPrompt));
        assert_eq!(check_prompt("hi"), Ok(()));
    }

    #[test]
    fn reconciling_twice_is_stable()
    {   let payload = json!({ "responses": [
          { "llm": "a", "response": "hi", "promptTokens": 3 }
        ]});
        assert_eq!(
          records_from_payload(&payload, AT),
          records_from_payload(&payload, AT)
        );
    }

    #[test]
    fn failure_marks_tracked_records()
    {   let tracked = mark_pending(&reselect(
          &["a".to_string(), "c".to_string()], &descriptors()
        ));
        let err = Error::HttpError("connection refused".to_string());
        let records = records_from_failure(&tracked, &err);
        assert_eq!(records.len(), 2);
        for r in &records
        {   assert!(!r.is_pending);
            assert!(r.answer_text.is_none());
            assert!(r.metadata.is_none());
            assert_eq!(
              r.error_message.as_deref(), Some("connection refused")
            );
        }
        assert_eq!(records[1].model_id, "c");
    }

    #[test]
    fn failure_with_nothing_tracked_synthesizes_one()
    {   let records = records_from_failure(&[], &Error::Timeout);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].model_id, "default");
        assert_eq!(
          records[0].error_message.as_deref(), Some("Request timed out")
        );
    }

    #[test]
    fn mark_pending_clears_previous_results()
    {   let done = records_from_payload(
          &json!({ "responses": [{ "llm": "a", "response": "x" }] }), AT
        );
        let pending = mark_pending(&done);
        assert!(pending[0].is_pending);
        assert!(pending[0].answer_text.is_none());
        assert!(pending[0].metadata.is_none());
        assert_eq!(pending[0].model_id, "a");
    }

    #[test]
    fn reselect_keeps_available_order()
    {   let records = reselect(
          &["d".to_string(), "b".to_string()], &descriptors()
        );
        let ids: Vec<&str>
          = records.iter().map(|r| r.model_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d"]);
        assert!(records.iter().all(|r| !r.is_pending));
    }

    #[test]
    fn empty_reselect_forces_first()
    {   let records = reselect(&[], &descriptors());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].model_id, "a");
        assert_eq!(records[0].model_display_name, "Model A");
        assert!(reselect(&[], &[]).is_empty());
    }

    #[test]
    fn initial_selection_takes_three()
    {   let chosen = initial_selection(&descriptors(), 3);
        assert_eq!(chosen.len(), 3);
        assert_eq!(initial_selection(&descriptors()[..1], 3).len(), 1);
    }

    #[test]
    fn empty_selection_queries_first_available()
    {   assert_eq!(query_model_ids(&[], &descriptors()), vec!["a"]);
        assert_eq!(
          query_model_ids(&descriptors()[1..3], &descriptors()),
          vec!["b", "c"]
        );
    }

    #[test]
    fn listing_shapes_and_duplicates()
    {   let listed = descriptors_from_listing(&json!({ "llms": [
          "mistral",
          { "id": "gpt", "displayName": "GPT" },
          { "name": "mistral" },
          7
        ]}));
        assert_eq!(listed, vec![
          ModelDescriptor::new("mistral", "mistral")
        , ModelDescriptor::new("gpt", "GPT")
        ]);
        assert!(descriptors_from_listing(&json!({})).is_empty());
    }

    #[test]
    fn listing_failure_falls_back()
    {   let fallback = vec![ModelDescriptor::new("default", "Default Model")];
        assert_eq!(available_or_fallback(Ok(vec![])), fallback);
        assert_eq!(
          available_or_fallback(Err(Error::Timeout)), fallback
        );
    }
}
