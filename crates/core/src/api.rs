use crate::error::ApiError;
use crate::models::{
    AnswerResult, AskRequest, CorpusListing, ModelInventory, Query, SearchResponse, StatusInfo,
    TrainRequest, TrainSummary,
};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub const STATUS_PATH: &str = "/api/status";
pub const MODELS_PATH: &str = "/api/ollama";
pub const CORPUS_PATH: &str = "/api/corpus";
pub const TRAIN_PATH: &str = "/api/train";
pub const SEARCH_PATH: &str = "/api/search";
pub const ASK_PATH: &str = "/api/ask";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

/// Transport seam between the session and the lab backend.
///
/// `call` resolves to the decoded JSON body or to one of the three
/// [`ApiError`] kinds. The typed endpoint helpers are provided on top of it
/// so fakes only need to answer raw JSON.
#[async_trait]
pub trait RagApi: Send + Sync {
    async fn call(&self, path: &str, method: Method, body: Option<Value>)
        -> Result<Value, ApiError>;

    async fn status(&self, collection: &str) -> Result<StatusInfo, ApiError> {
        let value = self.call(&status_path(collection), Method::Get, None).await?;
        decode(value)
    }

    async fn models(&self) -> Result<ModelInventory, ApiError> {
        let value = self.call(MODELS_PATH, Method::Get, None).await?;
        decode(value)
    }

    async fn corpus(&self) -> Result<CorpusListing, ApiError> {
        let value = self.call(CORPUS_PATH, Method::Get, None).await?;
        decode(value)
    }

    async fn train(&self, request: &TrainRequest) -> Result<TrainSummary, ApiError> {
        let body = encode(request)?;
        let value = self.call(TRAIN_PATH, Method::Post, Some(body)).await?;
        Ok(TrainSummary(value))
    }

    async fn search(&self, query: &Query) -> Result<SearchResponse, ApiError> {
        let body = encode(query)?;
        let value = self.call(SEARCH_PATH, Method::Post, Some(body)).await?;
        decode(value)
    }

    async fn ask(&self, request: &AskRequest) -> Result<AnswerResult, ApiError> {
        let body = encode(request)?;
        let value = self.call(ASK_PATH, Method::Post, Some(body)).await?;
        decode(value)
    }
}

pub fn status_path(collection: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(collection.as_bytes()).collect();
    format!("{STATUS_PATH}?collection={encoded}")
}

fn encode<T: serde::Serialize>(payload: &T) -> Result<Value, ApiError> {
    serde_json::to_value(payload)
        .map_err(|error| ApiError::Network(format!("could not encode request: {error}")))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|error| ApiError::Network(format!("unexpected response shape: {error}")))
}

fn backend_message(body: &Value) -> Option<String> {
    body.get("error")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .map(str::to_string)
}

/// HTTP+JSON client for the lab backend. No retries, no caching.
pub struct ApiClient {
    client: Arc<Client>,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            client: Arc::new(Client::new()),
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl RagApi for ApiClient {
    async fn call(
        &self,
        path: &str,
        method: Method,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let url = self.base_url.join(path)?;
        debug!(method = ?method, url = %url, "api request");

        let request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        let request = match body {
            Some(body) => request.json(&body),
            None => request.header(CONTENT_TYPE, "application/json"),
        };

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let parsed = serde_json::from_slice::<Value>(&bytes).ok();

        if !status.is_success() {
            debug!(status = status.as_u16(), path, "api request rejected");
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: parsed.as_ref().and_then(backend_message),
            });
        }

        let value = parsed.ok_or_else(|| {
            ApiError::Network(format!("response from {path} is not valid JSON"))
        })?;

        if value.get("ok") == Some(&Value::Bool(false)) {
            debug!(path, "api request reported logical failure");
            return Err(ApiError::Logical {
                message: backend_message(&value),
            });
        }

        Ok(value)
    }
}
