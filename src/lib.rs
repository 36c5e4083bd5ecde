pub mod error;
pub mod config;
pub mod resolve;
pub mod reconcile;
pub mod service;
pub mod health;
pub mod client;
pub mod render;
use serde::{Deserialize, Serialize};

/*

llm-compare: send one prompt to a comparison server and line the
answers of several models up side by side.

llm-compare/
├── Cargo.toml
├── src/
│   ├── lib.rs          # Public API and core structures
│   ├── error.rs        # Error type shared by every layer
│   ├── config.rs       # Client configuration
│   ├── resolve.rs      # Ordered fallback lookup over JSON
│   ├── reconcile.rs    # Payload -> response records
│   ├── service/        # Comparison server access
│   │   ├── mod.rs      # CompareService trait
│   │   └── http.rs     # reqwest implementation
│   ├── health.rs       # Periodic health probe
│   ├── client.rs       # Backend actor owning the state
│   ├── render.rs       # Text cards
│   └── main.rs         # Command line front end
└── tests/

*/

/// LLM-COMPARE API INTERFACE:

// ===== LoadModels =====

pub type LoadModelsReply
  = Result<Vec<ModelDescriptor>, crate::error::Error>;
pub type LoadModelsReplySender
  = tokio::sync::mpsc::UnboundedSender<LoadModelsReply>;

pub struct LoadModelsArgs
{   pub reply: LoadModelsReplySender
}

// ===== Reselect =====

pub type ReselectReply
  = Result<Vec<ResponseRecord>, crate::error::Error>;
pub type ReselectReplySender
  = tokio::sync::mpsc::UnboundedSender<ReselectReply>;

pub struct ReselectArgs
{   pub selected_ids: Vec<String>
  , pub reply: ReselectReplySender
}

// ===== Submit =====

pub type SubmitReply
  = Result<Vec<ResponseRecord>, crate::error::Error>;
pub type SubmitReplySender
  = tokio::sync::mpsc::UnboundedSender<SubmitReply>;

pub struct SubmitArgs
{   pub prompt: String
  , pub reply: SubmitReplySender
}

// ===== GetSnapshot =====

pub type GetSnapshotReply = Result<Snapshot, crate::error::Error>;
pub type GetSnapshotReplySender
  = tokio::sync::mpsc::UnboundedSender<GetSnapshotReply>;

pub struct GetSnapshotArgs
{   pub reply: GetSnapshotReplySender
}

// ===== KillProcess =====

pub type KillProcessReply = Result<(), crate::error::Error>;
pub type KillProcessReplySender
  = tokio::sync::mpsc::UnboundedSender<KillProcessReply>;

pub struct KillProcessArgs
{   pub reply: KillProcessReplySender
}

// ===== CompareHand (sender side) =====

pub struct CompareHand
{   pub load_models_tx
      : tokio::sync::mpsc::UnboundedSender<LoadModelsArgs>
  , pub reselect_tx
      : tokio::sync::mpsc::UnboundedSender<ReselectArgs>
  , pub submit_tx
      : tokio::sync::mpsc::UnboundedSender<SubmitArgs>
  , pub get_snapshot_tx
      : tokio::sync::mpsc::UnboundedSender<GetSnapshotArgs>
  , pub kill_process_tx
      : tokio::sync::mpsc::UnboundedSender<KillProcessArgs>
}

// ===== CompareFoot (receiver side) =====

pub struct CompareFoot
{   pub load_models_rx
      : tokio::sync::mpsc::UnboundedReceiver<LoadModelsArgs>
  , pub reselect_rx
      : tokio::sync::mpsc::UnboundedReceiver<ReselectArgs>
  , pub submit_rx
      : tokio::sync::mpsc::UnboundedReceiver<SubmitArgs>
  , pub get_snapshot_rx
      : tokio::sync::mpsc::UnboundedReceiver<GetSnapshotArgs>
  , pub kill_process_rx
      : tokio::sync::mpsc::UnboundedReceiver<KillProcessArgs>
}

/// LLM-COMPARE STRUCTURES:

/// Identifier and display name of one queryable model.
/// `id` is the stable key; `display_name` is presentation only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor
{   pub id: String
  , pub display_name: String
}

impl ModelDescriptor
{   pub fn new(id: impl Into<String>, display_name: impl Into<String>)
      -> Self
    {   ModelDescriptor
        {   id: id.into()
          , display_name: display_name.into()
        }
    }

    /// Stand-in used when the server lists no models
    pub fn fallback() -> Self
    {   ModelDescriptor::new(
          reconcile::DEFAULT_MODEL_ID,
          reconcile::DEFAULT_MODEL_NAME
        )
    }

    /// Convert one model-list entry into a descriptor.
    ///
    /// Objects use `id`, else `name`, for the key and
    /// `displayName`, else `name`, else the key, for the label.
    /// A bare string is both key and label. Anything else is
    /// rejected.
    pub fn from_listing(entry: &serde_json::Value) -> Option<Self>
    {   match entry
        {   serde_json::Value::String(s) if !s.is_empty() => {
              Some(ModelDescriptor::new(s.as_str(), s.as_str()))
            }
          , serde_json::Value::Object(_) => {
              let id = resolve::first_string(
                entry, &[&["id"], &["name"]]
              )?;
              let display_name = resolve::first_string(
                  entry, &[&["displayName"], &["name"]]
                )
                .unwrap_or_else(|| id.clone());
              Some(ModelDescriptor { id, display_name })
            }
          , _ => None
        }
    }
}

/// Per-model outcome of one query round trip
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRecord
{   pub model_id: String
  , pub model_display_name: String
  , pub answer_text: Option<String>
  , pub error_message: Option<String>
  , pub is_pending: bool
  , pub metadata: Option<Metadata>
}

impl ResponseRecord
{   /// Fresh record with no answer, not pending
    pub fn blank(descriptor: &ModelDescriptor) -> Self
    {   ResponseRecord
        {   model_id: descriptor.id.clone()
          , model_display_name: descriptor.display_name.clone()
          , answer_text: None
          , error_message: None
          , is_pending: false
          , metadata: None
        }
    }
}

/// Usage and telemetry attached to one answer
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata
{   pub prompt_tokens: Option<u64>
  , pub generation_tokens: Option<u64>
  , pub total_tokens: Option<u64>
  , pub response_time_ms: Option<u64>
  , pub model_version: Option<String>
  , pub finish_reason: Option<String>
  , /// RFC 3339; capture time when upstream sends none
    pub timestamp: String
  , pub rate_limit: Option<RateLimit>
}

/// Provider rate-limit counters, only when upstream reports them
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit
{   pub limit: Option<u64>
  , pub remaining: Option<u64>
  , pub tokens_limit: Option<u64>
  , pub tokens_remaining: Option<u64>
  , pub reset_after_seconds: Option<f64>
}

/// Copy of the backend state at one instant
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot
{   pub available: Vec<ModelDescriptor>
  , pub selected: Vec<ModelDescriptor>
  , pub records: Vec<ResponseRecord>
  , /// `None` until the first probe or round trip finishes
    pub healthy: Option<bool>
  , pub current_prompt: Option<String>
  , pub is_loading: bool
}

pub use client::CompareBackend;
pub use config::CompareConfig;
pub use error::Error;
pub use service::{CompareService, HttpService};

#[cfg(test)]
mod tests
{   use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_from_bare_string()
    {   let d = ModelDescriptor::from_listing(&json!("mistral"))
          .unwrap();
        assert_eq!(d, ModelDescriptor::new("mistral", "mistral"));
    }

    #[test]
    fn descriptor_from_object_variants()
    {   let full = ModelDescriptor::from_listing(
          &json!({ "id": "gpt-4o", "displayName": "GPT-4o" })
        ).unwrap();
        assert_eq!(full, ModelDescriptor::new("gpt-4o", "GPT-4o"));

        let named = ModelDescriptor::from_listing(
          &json!({ "name": "gemini" })
        ).unwrap();
        assert_eq!(named, ModelDescriptor::new("gemini", "gemini"));

        let id_only = ModelDescriptor::from_listing(
          &json!({ "id": "llama3" })
        ).unwrap();
        assert_eq!(id_only.display_name, "llama3");
    }

    #[test]
    fn descriptor_rejects_unusable_entries()
    {   assert!(ModelDescriptor::from_listing(&json!(42)).is_none());
        assert!(ModelDescriptor::from_listing(&json!("")).is_none());
        assert!(
          ModelDescriptor::from_listing(&json!({ "displayName": "x" }))
            .is_none()
        );
    }

    #[test]
    fn record_serializes_camel_case()
    {   let record = ResponseRecord::blank(
          &ModelDescriptor::new("a", "A")
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["modelId"], "a");
        assert_eq!(value["isPending"], false);
    }
}
