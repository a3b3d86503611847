//! HTTP client for the collection/request/environment CRUD API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, error};

use super::CollectionSource;
use crate::config::ApiConfig;
use crate::errors::{OpenRequestError, Result};
use crate::models::{
    Collection, CollectionFull, CollectionUpdate, Environment, EnvironmentInput, HttpRequest,
    NewCollection, NewRequest, RequestUpdate,
};
use crate::request::USER_AGENT_STRING;

/// Client for the remote CRUD API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT_STRING)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(client, &config.base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(method = %method, path = %path, "API request");
        self.client.request(method, self.endpoint(path))
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = check(builder.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.fetch(self.request(method, path).json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        check(self.request(Method::DELETE, path).send().await?).await?;
        Ok(())
    }

    // Collections

    pub async fn get_collections(&self) -> Result<Vec<Collection>> {
        self.fetch(self.request(Method::GET, "/api/collection")).await
    }

    pub async fn get_collection_by_id(&self, collection_id: &str) -> Result<CollectionFull> {
        let path = format!("/api/collection/{}", collection_id);
        self.fetch(self.request(Method::GET, &path)).await
    }

    pub async fn create_collection(&self, collection: &NewCollection) -> Result<Collection> {
        self.send_json(Method::POST, "/api/collection", collection).await
    }

    pub async fn update_collection(
        &self,
        collection_id: &str,
        updates: &CollectionUpdate,
    ) -> Result<Collection> {
        let path = format!("/api/collection/{}", collection_id);
        self.send_json(Method::PATCH, &path, updates).await
    }

    pub async fn delete_collection(&self, collection_id: &str) -> Result<()> {
        self.delete(&format!("/api/collection/{}", collection_id)).await
    }

    pub async fn search_collections(&self, query: &str) -> Result<Vec<Collection>> {
        let path = format!("/api/collection/search?q={}", urlencoding::encode(query));
        self.fetch(self.request(Method::GET, &path)).await
    }

    // Requests

    pub async fn create_request(
        &self,
        collection_id: &str,
        request: &NewRequest,
    ) -> Result<HttpRequest> {
        let path = format!("/api/collection/{}/request", collection_id);
        self.send_json(Method::POST, &path, request).await
    }

    pub async fn update_request(
        &self,
        collection_id: &str,
        request_id: &str,
        updates: &RequestUpdate,
    ) -> Result<HttpRequest> {
        let path = format!("/api/collection/{}/request/{}", collection_id, request_id);
        self.send_json(Method::PATCH, &path, updates).await
    }

    pub async fn delete_request(&self, collection_id: &str, request_id: &str) -> Result<()> {
        self.delete(&format!("/api/collection/{}/request/{}", collection_id, request_id))
            .await
    }

    // Environments

    pub async fn get_environments(&self) -> Result<Vec<Environment>> {
        self.fetch(self.request(Method::GET, "/api/environment")).await
    }

    pub async fn search_environments(&self, query: &str) -> Result<Vec<Environment>> {
        let path = format!("/api/environment/search?q={}", urlencoding::encode(query));
        self.fetch(self.request(Method::GET, &path)).await
    }

    pub async fn create_environment(&self, environment: &EnvironmentInput) -> Result<Environment> {
        self.send_json(Method::POST, "/api/environment", environment).await
    }

    pub async fn update_environment(
        &self,
        environment_id: &str,
        updates: &EnvironmentInput,
    ) -> Result<Environment> {
        let path = format!("/api/environment/{}", environment_id);
        self.send_json(Method::PATCH, &path, updates).await
    }

    pub async fn delete_environment(&self, environment_id: &str) -> Result<()> {
        self.delete(&format!("/api/environment/{}", environment_id)).await
    }
}

#[async_trait]
impl CollectionSource for ApiClient {
    async fn get_collection(&self, collection_id: &str) -> Result<CollectionFull> {
        self.get_collection_by_id(collection_id).await
    }
}

/// Turn a non-2xx response into `OpenRequestError::Api`
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = error_message(&text).unwrap_or_else(|| {
        if text.is_empty() {
            status.canonical_reason().unwrap_or("Request failed").to_string()
        } else {
            text
        }
    });
    error!(status = status.as_u16(), message = %message, "API error");

    Err(OpenRequestError::Api {
        status: status.as_u16(),
        message,
    })
}

/// `message` field of a JSON error body
fn error_message(body: &str) -> Option<String> {
    let json: JsonValue = serde_json::from_str(body).ok()?;
    match json.get("message")? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}
