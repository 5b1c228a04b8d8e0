use super::{BulkItem, BulkItemError, BulkResponse, DocumentStore, StoreError};
use crate::config::types::StoreConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

/// Bulk client for an Elasticsearch/OpenSearch compatible HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    client: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
}

impl HttpStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let url = format!("{}/", self.base_url);
        let response = self.request(reqwest::Method::GET, &url).send().await?;

        if !response.status().is_success() {
            return Err(StoreError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        Ok(())
    }

    async fn bulk_send(&self, body: String) -> Result<BulkResponse, StoreError> {
        let url = format!("{}/_bulk", self.base_url);
        let response = self
            .request(reqwest::Method::POST, &url)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let text = response.text().await?;
        parse_bulk_response(&text)
    }
}

#[derive(Debug, Deserialize)]
struct WireBulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, WireItemStatus>>,
}

#[derive(Debug, Deserialize)]
struct WireItemStatus {
    #[serde(default)]
    error: Option<WireItemError>,
}

#[derive(Debug, Deserialize)]
struct WireItemError {
    #[serde(rename = "type")]
    error_type: String,
    #[serde(default)]
    reason: String,
}

/// Decode a `_bulk` response body.
///
/// Each item is an object keyed by the action name (`index`, `create`, ...);
/// only its `error` member matters here.
pub fn parse_bulk_response(body: &str) -> Result<BulkResponse, StoreError> {
    let wire: WireBulkResponse =
        serde_json::from_str(body).map_err(|e| StoreError::InvalidResponse(e.to_string()))?;

    let mut items = Vec::with_capacity(wire.items.len());
    for (position, item) in wire.items.into_iter().enumerate() {
        let status = item.into_values().next().ok_or_else(|| {
            StoreError::InvalidResponse(format!("item {} has no action", position))
        })?;
        items.push(BulkItem {
            error: status.error.map(|e| BulkItemError {
                error_type: e.error_type,
                reason: e.reason,
            }),
        });
    }

    Ok(BulkResponse {
        errors: wire.errors,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_bulk_response_with_item_error() {
        let body = r#"{
            "took": 3,
            "errors": true,
            "items": [
                {"index": {"_index": "events", "_id": "1", "status": 201}},
                {"index": {"_index": "events", "_id": "2", "status": 400,
                    "error": {"type": "mapper_parsing_exception", "reason": "failed to parse field [level]"}}}
            ]
        }"#;

        let response = parse_bulk_response(body).unwrap();
        assert!(response.errors);
        assert_eq!(response.items.len(), 2);
        assert!(response.items[0].error.is_none());
        let error = response.items[1].error.as_ref().unwrap();
        assert_eq!(error.error_type, "mapper_parsing_exception");
        assert_eq!(error.reason, "failed to parse field [level]");
        assert_eq!(response.failed_items(), 1);
    }

    #[test]
    fn test_parse_bulk_response_rejects_garbage() {
        assert!(matches!(
            parse_bulk_response("not json"),
            Err(StoreError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_bulk_response(r#"{"errors": false, "items": [{}]}"#),
            Err(StoreError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_store_trims_base_url() {
        let config = StoreConfig {
            url: "http://localhost:9200/".to_string(),
            index: "events".to_string(),
            timeout: Duration::from_secs(5),
            username: None,
            password: None,
        };
        let store = HttpStore::new(&config).unwrap();
        assert_eq!(store.base_url(), "http://localhost:9200");
    }
}
