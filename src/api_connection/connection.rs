use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use super::endpoints::{
    ChatCompletionRequest, ChatCompletionResponse, FoodSearchResponse, SearchFood,
    USDA_DATA_TYPES,
};

#[derive(Debug, Error)]
pub enum ApiConnectionError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("API error {status}: {error_body}")]
    ApiError {
        status: reqwest::StatusCode,
        error_body: String,
    },
    #[error("completion contained no message content")]
    EmptyCompletion,
}

/// Anything that can answer a chat-completion request.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError>;
}

/// Text search against a nutrient database, returning the single best record.
#[async_trait]
pub trait FoodDatabase: Send + Sync {
    async fn search_best_match(&self, query: &str) -> Result<Option<SearchFood>, ApiConnectionError>;
}

fn http_client(timeout: Duration) -> Result<Client, ApiConnectionError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

async fn error_from_response(response: reqwest::Response) -> ApiConnectionError {
    let status = response.status();
    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    ApiConnectionError::ApiError { status, error_body }
}

/// OpenAI-compatible chat-completion endpoint.
#[derive(Clone)]
pub struct VisionProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for VisionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl VisionProvider {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ApiConnectionError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChatCompletion for VisionProvider {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn call_chat_completion(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ApiConnectionError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if response.status().is_success() {
            let chat_response = response.json::<ChatCompletionResponse>().await?;
            debug!(choices = chat_response.choices.len(), "chat completion received");
            Ok(chat_response)
        } else {
            Err(error_from_response(response).await)
        }
    }
}

/// USDA FoodData Central search client.
#[derive(Clone)]
pub struct UsdaClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl std::fmt::Debug for UsdaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsdaClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UsdaClient {
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ApiConnectionError> {
        Ok(Self {
            client: http_client(timeout)?,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FoodDatabase for UsdaClient {
    #[instrument(skip(self))]
    async fn search_best_match(&self, query: &str) -> Result<Option<SearchFood>, ApiConnectionError> {
        let url = format!("{}/foods/search", self.base_url);

        let mut params: Vec<(&str, &str)> = vec![
            ("api_key", self.api_key.as_str()),
            ("query", query),
            ("pageSize", "1"),
        ];
        params.extend(USDA_DATA_TYPES.iter().map(|data_type| ("dataType", *data_type)));

        let response = self.client.get(&url).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        // Read as text first so a malformed body surfaces as a serde error.
        let body = response.text().await?;
        let search: FoodSearchResponse = serde_json::from_str(&body)?;
        Ok(search.foods.into_iter().next())
    }
}
