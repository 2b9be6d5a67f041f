//! Typed HTTP client for the PersonaIQ gateway

use std::time::Duration;

use async_trait::async_trait;
use personaiq_common::api::{
    ChatRequest, ChatResponse, CreatePersonaRequest, IngestRequest, IngestResponse, PersonaList,
    PersonaSummary,
};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClientError {
    /// The gateway answered with an error body
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
        }
    }
}

/// The calls the views need, so controllers can run against a fake.
#[async_trait]
pub trait PersonaApi: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError>;

    async fn ingest(&self, request: &IngestRequest) -> Result<IngestResponse, ClientError>;

    async fn get_persona(&self, id: &str) -> Result<PersonaSummary, ClientError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Gateway client
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, Duration::from_secs(120))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Decode a success body, or turn an error body into `ClientError::Api`
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        Err(Self::api_error(status, response).await)
    }

    async fn api_error(status: StatusCode, response: Response) -> ClientError {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.detail)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body
                }
            });
        debug!(status = status.as_u16(), %message, "Gateway returned an error");
        ClientError::Api {
            status: status.as_u16(),
            message,
        }
    }

    pub async fn list_personas(&self) -> Result<PersonaList, ClientError> {
        let response = self.client.get(self.url("/api/personas")).send().await?;
        Self::decode(response).await
    }

    pub async fn create_persona(&self, request: &CreatePersonaRequest) -> Result<PersonaSummary, ClientError> {
        let response = self.client.post(self.url("/api/personas")).json(request).send().await?;
        Self::decode(response).await
    }

    pub async fn delete_persona(&self, id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/personas/{}", id)))
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Self::api_error(status, response).await)
    }
}

#[async_trait]
impl PersonaApi for ApiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let response = self.client.post(self.url("/api/chat")).json(request).send().await?;
        Self::decode(response).await
    }

    async fn ingest(&self, request: &IngestRequest) -> Result<IngestResponse, ClientError> {
        let response = self.client.post(self.url("/api/ingest")).json(request).send().await?;
        Self::decode(response).await
    }

    async fn get_persona(&self, id: &str) -> Result<PersonaSummary, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("/api/personas/{}", id)))
            .send()
            .await?;
        Self::decode(response).await
    }
}
