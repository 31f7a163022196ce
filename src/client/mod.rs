//! HTTP adapters for the DIDHub API
//!
//! Implement the collaborator traits over reqwest. Both adapters share the
//! same [`StoreConfig`] and response handling.

mod search;
mod store;

pub use search::HttpSearch;
pub use store::HttpRelationshipStore;

use crate::config::StoreConfig;
use crate::error::{Result, SyncError};
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

fn build_client(config: &StoreConfig) -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    if let Some(ref api_key) = config.api_key {
        let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| SyncError::Config("api_key is not a valid header value".into()))?;
        headers.insert(header::AUTHORIZATION, value);
    }

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))
}

/// `{base}/{path}` with any trailing slash on the base removed
fn endpoint(config: &StoreConfig, path: &str) -> String {
    format!("{}/{}", config.base_url.trim_end_matches('/'), path)
}

/// Map 404 and non-success statuses to errors
async fn check_status(operation: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status() == StatusCode::NOT_FOUND {
        return Err(SyncError::NotFound(response.url().path().to_string()));
    }

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(SyncError::store(operation, format!("HTTP {status} - {body}")));
    }

    Ok(response)
}

async fn handle_response(operation: &str, response: reqwest::Response) -> Result<Value> {
    let response = check_status(operation, response).await?;
    let body = response.json().await?;
    Ok(body)
}

/// List endpoints answer with a bare array or `{ "items": [...] }`
fn list_items(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(SyncError::Serialization(
                "expected an array or an object with an items array".into(),
            )),
        },
        _ => Err(SyncError::Serialization("expected a list response".into())),
    }
}
