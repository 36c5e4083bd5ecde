use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use log::{debug, trace, error};

// ===== Wire Types =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest
{   pub prompt: String
  , pub llms: Vec<String>
}

/// Error body the server sends with a non-success status
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody
{   #[serde(default)]
    pub message: Option<String>
  , #[serde(default)]
    pub error: Option<String>
}

// ===== HTTP Service =====

/// reqwest-backed comparison server client
#[derive(Debug, Clone)]
pub struct HttpService
{   api_base: String
  , http_client: reqwest::Client
}

impl HttpService
{   pub fn new(config: &crate::config::CompareConfig)
      -> Result<Self, crate::error::Error>
    {   config.validate()?;
        debug!("Creating HttpService for {}", config.api_base());

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs
        {   builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build()
          .map_err(|e| {
            error!("Failed to build HTTP client: {}", e);
            crate::error::Error::InvalidConfiguration(e.to_string())
          })?;

        Ok(HttpService
        {   api_base: config.api_base().to_string()
          , http_client
        })
    }

    fn url(&self, endpoint: &str) -> String
    {   format!("{}/{}", self.api_base, endpoint)
    }

    /// Turn a non-success response into a server error,
    /// keeping the server's own message when it sent one
    async fn server_error(response: reqwest::Response)
      -> crate::error::Error
    {   let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        trace!("Error body ({}): {}", status, text);

        let body: ErrorBody = serde_json::from_str(&text)
          .unwrap_or_default();
        let message = body.message
          .or(body.error)
          .filter(|m| !m.trim().is_empty());

        error!("Server returned {}: {:?}", status, message);
        crate::error::Error::ServerError { status, message }
    }

    async fn get_json(&self, endpoint: &str)
      -> Result<serde_json::Value, crate::error::Error>
    {   let response = self.http_client
          .get(self.url(endpoint))
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error on {}: {}", endpoint, e);
            crate::error::Error::from(e)
          })?;

        let status = response.status();
        trace!("{} response status: {}", endpoint, status);
        if !status.is_success()
        {   return Err(Self::server_error(response).await);
        }

        response.json().await.map_err(|e| {
          error!("Parse error on {}: {}", endpoint, e);
          crate::error::Error::ParseError(e.to_string())
        })
    }
}

#[async_trait]
impl super::CompareService for HttpService
{   async fn list_models(&self)
      -> Result<Vec<crate::ModelDescriptor>, crate::error::Error>
    {   debug!("Fetching model list");
        let payload = self.get_json("llms").await?;
        let models = crate::reconcile::descriptors_from_listing(&payload);
        debug!("Retrieved {} models", models.len());
        Ok(models)
    }

    async fn query(
      &self
    , prompt: &str
    , model_ids: &[String]
    ) -> Result<serde_json::Value, crate::error::Error>
    {   let request = QueryRequest
        {   prompt: prompt.to_string()
          , llms: model_ids.to_vec()
        };
        trace!("Compare request: {:?}", request);

        let response = self.http_client
          .post(self.url("compare"))
          .header("Content-Type", "application/json")
          .json(&request)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            crate::error::Error::from(e)
          })?;

        let status = response.status();
        trace!("Compare response status: {}", status);
        if !status.is_success()
        {   return Err(Self::server_error(response).await);
        }

        response.json().await.map_err(|e| {
          error!("Parse error: {}", e);
          crate::error::Error::ParseError(e.to_string())
        })
    }

    async fn check_health(&self) -> Result<bool, crate::error::Error>
    {   let response = self.http_client
          .get(self.url("health"))
          .send()
          .await
          .map_err(|e| {
            debug!("Health probe failed: {}", e);
            crate::error::Error::from(e)
          })?;

        let healthy = response.status().is_success();
        trace!("Health status: {}", response.status());
        Ok(healthy)
    }
}
