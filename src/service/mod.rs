//! Access to the comparison server

pub mod http;

// Re-export for convenience
pub use http::HttpService;

use async_trait::async_trait;

/// The three endpoints the comparison client consumes
#[async_trait]
pub trait CompareService: Send + Sync
{   /// Models the server can query, already normalized
    async fn list_models(&self)
      -> Result<Vec<crate::ModelDescriptor>, crate::error::Error>;

    /// One aggregate request; the raw payload is returned for
    /// the reconciler to normalize
    async fn query(
      &self
    , prompt: &str
    , model_ids: &[String]
    ) -> Result<serde_json::Value, crate::error::Error>;

    /// Whether the server reports itself reachable and well
    async fn check_health(&self) -> Result<bool, crate::error::Error>;
}
